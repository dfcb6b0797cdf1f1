//! The B+-tree engine: descent, recursive insert with split propagation,
//! and the range-scan cursor.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use common::{BpmError, BufferPoolManager, PageId, INVALID_PAGE_ID};
use heap::HeapFileScanner;

use crate::error::IndexError;
use crate::key::decode_key;
use crate::metadata::IndexMetadata;
use crate::node::{node_kind, InternalNode, LeafNode, NodeKind};

/// The metadata page is always the first page a fresh index file allocates.
const METADATA_PAGE_ID: PageId = INVALID_PAGE_ID + 1;

/// A scan range bound comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Lte,
    Gt,
    Gte,
}

/// The result of a recursive insert: either the child absorbed the entry
/// without growing, or it split and a separator must be threaded into the
/// parent (or promoted into a new root).
enum SplitOutcome {
    NoSplit,
    Split { promoted_key: i32, new_right_page: PageId },
}

#[derive(Debug, Clone, Copy)]
struct RunningScan {
    current_page_id: PageId,
    next_entry: usize,
    high_val: i32,
    high_op: Operator,
}

enum ScanState {
    Idle,
    Running(RunningScan),
}

/// A process-lifetime handle bound to a single index file.
pub struct BPlusTree {
    bpm: Arc<dyn BufferPoolManager>,
    metadata_page_id: PageId,
    relation_name: String,
    attr_byte_offset: u32,
    root_page_id: Cell<PageId>,
    leaf_max_size: u16,
    internal_max_size: u16,
    scan_state: RefCell<ScanState>,
}

impl BPlusTree {
    /// Creates a fresh index file, bulk-inserting every record `scanner`
    /// yields. Returns the handle and its derived name.
    pub fn open(
        bpm: Arc<dyn BufferPoolManager>,
        relation_name: &str,
        attr_byte_offset: u32,
        scanner: &mut dyn HeapFileScanner,
    ) -> Result<(Self, String), IndexError> {
        Self::open_with_capacity(bpm, relation_name, attr_byte_offset, None, scanner)
    }

    /// Same as [`Self::open`] but accepts an explicit `(leaf_max, internal_max)`
    /// override so tests can exercise split cascades without thousands of
    /// insertions.
    pub fn open_with_capacity(
        bpm: Arc<dyn BufferPoolManager>,
        relation_name: &str,
        attr_byte_offset: u32,
        capacity_override: Option<(u16, u16)>,
        scanner: &mut dyn HeapFileScanner,
    ) -> Result<(Self, String), IndexError> {
        let metadata = IndexMetadata::new(relation_name, attr_byte_offset, capacity_override);

        let mut metadata_page = bpm.new_page()?;
        let metadata_page_id = metadata_page.page_id();
        let bytes = metadata.serialize();
        metadata_page[..bytes.len()].copy_from_slice(&bytes);
        drop(metadata_page);

        let tree = Self {
            bpm,
            metadata_page_id,
            relation_name: relation_name.to_string(),
            attr_byte_offset,
            root_page_id: Cell::new(metadata.root_page_id),
            leaf_max_size: metadata.leaf_max_size,
            internal_max_size: metadata.internal_max_size,
            scan_state: RefCell::new(ScanState::Idle),
        };

        loop {
            let rid = match scanner.scan_next() {
                Ok(rid) => rid,
                Err(heap::HeapError::EndOfFile) => break,
                Err(other) => {
                    tracing::debug!(error = %other, "heap scanner error during bulk load");
                    break;
                }
            };
            let record = scanner.current_record();
            let offset = attr_byte_offset as usize;
            let key = decode_key(&record[offset..offset + 4]);
            tree.insert_entry(key, rid)?;
        }

        let name = format!("{relation_name}.{attr_byte_offset}");
        Ok((tree, name))
    }

    /// Attaches to an existing index file, validating its metadata page
    /// against the supplied relation/attribute.
    pub fn attach(
        bpm: Arc<dyn BufferPoolManager>,
        relation_name: &str,
        attr_byte_offset: u32,
    ) -> Result<Self, IndexError> {
        let metadata_page = bpm.fetch_page(METADATA_PAGE_ID)?;
        let metadata = IndexMetadata::deserialize(&metadata_page[..])?;
        drop(metadata_page);

        if metadata.relation_name != relation_name || metadata.attr_byte_offset != attr_byte_offset
        {
            return Err(IndexError::BadIndexInfo);
        }

        Ok(Self {
            bpm,
            metadata_page_id: METADATA_PAGE_ID,
            relation_name: metadata.relation_name,
            attr_byte_offset: metadata.attr_byte_offset,
            root_page_id: Cell::new(metadata.root_page_id),
            leaf_max_size: metadata.leaf_max_size,
            internal_max_size: metadata.internal_max_size,
            scan_state: RefCell::new(ScanState::Idle),
        })
    }

    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    pub fn attr_byte_offset(&self) -> u32 {
        self.attr_byte_offset
    }

    fn persist_root(&self, new_root: PageId) -> Result<(), BpmError> {
        self.root_page_id.set(new_root);
        let mut metadata_page = self.bpm.fetch_page(self.metadata_page_id)?;
        let mut metadata = IndexMetadata::deserialize(&metadata_page[..])
            .expect("metadata page was written by this handle");
        metadata.root_page_id = new_root;
        let bytes = metadata.serialize();
        metadata_page[..bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    // ===== descent & routing =====

    /// Finds the leaf page `key` would live in. The root must already exist.
    pub fn find_leaf(&self, key: i32) -> Result<PageId, BpmError> {
        let mut current = self.root_page_id.get();
        loop {
            let mut guard = self.bpm.fetch_page(current)?;
            match node_kind(&guard[..]) {
                NodeKind::Leaf => return Ok(current),
                NodeKind::Internal => {
                    let node = InternalNode::new(&mut guard[..], self.internal_max_size + 1);
                    let child_index = node.find_child_index(key);
                    let child = node.child(child_index);
                    let is_leaf = node.children_are_leaves();
                    drop(node);
                    drop(guard);
                    if is_leaf {
                        return Ok(child);
                    }
                    current = child;
                }
            }
        }
    }

    // ===== insert =====

    pub fn insert_entry(&self, key: i32, rid: common::RowId) -> Result<(), BpmError> {
        if self.root_page_id.get() == INVALID_PAGE_ID {
            let mut root_page = self.bpm.new_page()?;
            let root_page_id = root_page.page_id();
            let mut leaf = LeafNode::new(&mut root_page[..]);
            leaf.initialize();
            drop(leaf);
            drop(root_page);
            self.persist_root(root_page_id)?;
        }

        let root = self.root_page_id.get();
        if let SplitOutcome::Split { promoted_key, new_right_page } =
            self.insert_recursive(root, key, rid)?
        {
            let was_leaf = {
                let guard = self.bpm.fetch_page(root)?;
                node_kind(&guard[..]) == NodeKind::Leaf
            };

            let mut new_root_page = self.bpm.new_page()?;
            let new_root_page_id = new_root_page.page_id();
            let mut new_root = InternalNode::new(&mut new_root_page[..], self.internal_max_size + 1);
            new_root.initialize(was_leaf);
            new_root.set_child(0, root);
            new_root.insert_key_child(0, promoted_key, new_right_page);
            drop(new_root);
            drop(new_root_page);

            tracing::info!(new_root = new_root_page_id, "root grew by one level");
            self.persist_root(new_root_page_id)?;
        }
        Ok(())
    }

    fn insert_recursive(
        &self,
        page_id: PageId,
        key: i32,
        rid: common::RowId,
    ) -> Result<SplitOutcome, BpmError> {
        let mut guard = self.bpm.fetch_page(page_id)?;
        match node_kind(&guard[..]) {
            NodeKind::Leaf => {
                let mut leaf = LeafNode::new(&mut guard[..]);
                let index = leaf.find_insert_index(key);
                leaf.insert_at(index, key, rid);
                let count = leaf.key_count();

                if count as usize <= self.leaf_max_size as usize {
                    return Ok(SplitOutcome::NoSplit);
                }

                let median_index = (self.leaf_max_size as usize + 1) / 2;
                let median = leaf.key(median_index);
                drop(leaf);
                drop(guard);

                let mut right_page = self.bpm.new_page()?;
                let right_page_id = right_page.page_id();
                let mut right = LeafNode::new(&mut right_page[..]);
                right.initialize();

                let mut guard = self.bpm.fetch_page(page_id)?;
                let mut left = LeafNode::new(&mut guard[..]);
                let old_sibling = left.right_sibling();
                left.split_off(median_index, &mut right);
                left.set_right_sibling(right_page_id);
                right.set_right_sibling(old_sibling);

                tracing::debug!(page_id, right_page_id, median, "leaf split");

                Ok(SplitOutcome::Split { promoted_key: median, new_right_page: right_page_id })
            }
            NodeKind::Internal => {
                let node = InternalNode::new(&mut guard[..], self.internal_max_size + 1);
                let child_index = node.find_child_index(key);
                let child = node.child(child_index);
                drop(node);
                drop(guard);

                match self.insert_recursive(child, key, rid)? {
                    SplitOutcome::NoSplit => Ok(SplitOutcome::NoSplit),
                    SplitOutcome::Split { promoted_key, new_right_page } => {
                        let mut guard = self.bpm.fetch_page(page_id)?;
                        let mut node = InternalNode::new(&mut guard[..], self.internal_max_size + 1);
                        let insert_index = node.find_child_index(promoted_key);
                        node.insert_key_child(insert_index, promoted_key, new_right_page);
                        let count = node.key_count();

                        if count as usize <= self.internal_max_size as usize {
                            return Ok(SplitOutcome::NoSplit);
                        }

                        let split_index = (self.internal_max_size as usize + 1) / 2;
                        let children_are_leaves = node.children_are_leaves();
                        drop(node);
                        drop(guard);

                        let mut right_page = self.bpm.new_page()?;
                        let right_page_id = right_page.page_id();
                        let mut right = InternalNode::new(&mut right_page[..], self.internal_max_size + 1);
                        right.initialize(children_are_leaves);

                        let mut guard = self.bpm.fetch_page(page_id)?;
                        let mut left = InternalNode::new(&mut guard[..], self.internal_max_size + 1);
                        let median = left.split_off(split_index, &mut right);

                        tracing::debug!(page_id, right_page_id, median, "internal split");

                        Ok(SplitOutcome::Split { promoted_key: median, new_right_page: right_page_id })
                    }
                }
            }
        }
    }

    // ===== range scan =====

    pub fn start_scan(
        &self,
        low_val: i32,
        low_op: Operator,
        high_val: i32,
        high_op: Operator,
    ) -> Result<(), IndexError> {
        if !matches!(low_op, Operator::Gt | Operator::Gte)
            || !matches!(high_op, Operator::Lt | Operator::Lte)
        {
            return Err(IndexError::BadOpcodes);
        }
        if low_val > high_val {
            return Err(IndexError::BadScanRange);
        }
        if self.root_page_id.get() == INVALID_PAGE_ID {
            return Err(IndexError::NoSuchKeyFound);
        }

        let mut current_page_id = self.find_leaf(low_val)?;
        loop {
            let mut guard = self.bpm.fetch_page(current_page_id)?;
            let leaf = LeafNode::new(&mut guard[..]);
            let mut found = None;
            for i in 0..leaf.key_count() as usize {
                let k = leaf.key(i);
                let matches_low = match low_op {
                    Operator::Gte => k >= low_val,
                    Operator::Gt => k > low_val,
                    _ => unreachable!(),
                };
                if matches_low {
                    found = Some(i);
                    break;
                }
            }

            if let Some(next_entry) = found {
                *self.scan_state.borrow_mut() = ScanState::Running(RunningScan {
                    current_page_id,
                    next_entry,
                    high_val,
                    high_op,
                });
                return Ok(());
            }

            let sibling = leaf.right_sibling();
            drop(leaf);
            drop(guard);
            if sibling == INVALID_PAGE_ID {
                return Err(IndexError::NoSuchKeyFound);
            }
            tracing::trace!(from = current_page_id, to = sibling, "start_scan sibling hop");
            current_page_id = sibling;
        }
    }

    pub fn scan_next(&self) -> Result<common::RowId, IndexError> {
        let mut state = self.scan_state.borrow_mut();
        let scan = match &mut *state {
            ScanState::Idle => return Err(IndexError::ScanNotInitialized),
            ScanState::Running(scan) => scan,
        };

        loop {
            let mut guard = self.bpm.fetch_page(scan.current_page_id)?;
            let leaf = LeafNode::new(&mut guard[..]);
            let count = leaf.key_count() as usize;

            if scan.next_entry >= count {
                let sibling = leaf.right_sibling();
                drop(leaf);
                drop(guard);
                if sibling == INVALID_PAGE_ID {
                    return Err(IndexError::IndexScanCompleted);
                }
                tracing::trace!(from = scan.current_page_id, to = sibling, "scan_next sibling hop");
                scan.current_page_id = sibling;
                scan.next_entry = 0;
                continue;
            }

            let k = leaf.key(scan.next_entry);
            let passes = match scan.high_op {
                Operator::Lte => k <= scan.high_val,
                Operator::Lt => k < scan.high_val,
                _ => unreachable!(),
            };
            if !passes {
                return Err(IndexError::IndexScanCompleted);
            }

            let rid = leaf.rid(scan.next_entry);
            scan.next_entry += 1;
            return Ok(rid);
        }
    }

    pub fn end_scan(&self) -> Result<(), IndexError> {
        let mut state = self.scan_state.borrow_mut();
        match *state {
            ScanState::Idle => Err(IndexError::ScanNotInitialized),
            ScanState::Running(_) => {
                *state = ScanState::Idle;
                Ok(())
            }
        }
    }
}

impl Drop for BPlusTree {
    fn drop(&mut self) {
        *self.scan_state.borrow_mut() = ScanState::Idle;
        if let Err(err) = self.bpm.flush_all_pages() {
            tracing::debug!(error = %err, "failed to flush on drop");
        }
    }
}
