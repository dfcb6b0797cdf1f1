//! A heap file: an unordered, append-only collection of fixed-width tuples
//! spread across table pages linked by `next_page_id`.

use std::sync::Arc;

use common::{BufferPoolManager, PageId, RowId, INVALID_PAGE_ID};
use tracing::debug;

use crate::error::HeapError;
use crate::page::SlottedPage;
use crate::tuple::{Schema, Tuple};

/// Consumed once at index construction to bulk-insert every existing record.
pub trait HeapFileScanner {
    /// Advances to the next record, returning its locator.
    /// Returns `HeapError::EndOfFile` once every record has been yielded.
    fn scan_next(&mut self) -> Result<RowId, HeapError>;

    /// The raw bytes of the record the cursor currently sits on.
    fn current_record(&self) -> &[u8];
}

/// An unordered collection of fixed-width tuples.
pub struct TableHeap {
    bpm: Arc<dyn BufferPoolManager>,
    schema: Schema,
    first_page_id: PageId,
}

impl TableHeap {
    /// Creates a brand-new, empty heap file.
    pub fn new(bpm: Arc<dyn BufferPoolManager>, schema: Schema) -> Result<Self, HeapError> {
        let mut guard = bpm.new_page()?;
        let first_page_id = guard.page_id();
        SlottedPage::new(&mut guard[..]).initialize(first_page_id);
        drop(guard);
        debug!(first_page_id, "created table heap");
        Ok(Self {
            bpm,
            schema,
            first_page_id,
        })
    }

    /// Attaches to an existing heap file whose first page is `first_page_id`.
    pub fn attach(bpm: Arc<dyn BufferPoolManager>, schema: Schema, first_page_id: PageId) -> Self {
        Self {
            bpm,
            schema,
            first_page_id,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Inserts a tuple, appending a new page to the chain if every existing
    /// page is full.
    pub fn insert_tuple(&self, tuple: &Tuple) -> Result<RowId, HeapError> {
        let record = tuple.serialize(&self.schema);
        if record.len() > common::PAGE_SIZE {
            return Err(HeapError::RecordTooLarge(record.len()));
        }

        let mut page_id = self.first_page_id;
        loop {
            let mut guard = self.bpm.fetch_page(page_id)?;
            let mut page = SlottedPage::new(&mut guard[..]);
            if let Some(slot_index) = page.insert_record(&record) {
                return Ok(RowId { page_id, slot_index });
            }
            let next_page_id = page.header().next_page_id;
            if next_page_id != INVALID_PAGE_ID {
                drop(page);
                drop(guard);
                page_id = next_page_id;
                continue;
            }

            drop(page);
            drop(guard);

            let mut new_guard = self.bpm.new_page()?;
            let new_page_id = new_guard.page_id();
            SlottedPage::new(&mut new_guard[..]).initialize(new_page_id);
            drop(new_guard);

            let mut guard = self.bpm.fetch_page(page_id)?;
            SlottedPage::new(&mut guard[..]).header_mut().next_page_id = new_page_id;
            drop(guard);

            debug!(page_id, new_page_id, "extended table heap");
            page_id = new_page_id;
        }
    }

    /// Reads back the tuple located at `row_id`.
    pub fn get_tuple(&self, row_id: RowId) -> Result<Tuple, HeapError> {
        let mut guard = self.bpm.fetch_page(row_id.page_id)?;
        let page = SlottedPage::new(&mut guard[..]);
        let record = page.get_record(row_id.slot_index).to_vec();
        Ok(Tuple::deserialize(&record, &self.schema))
    }

    /// A scanner that yields every record in this heap file in page/slot order.
    pub fn scanner(&self) -> TableHeapScanner<'_> {
        TableHeapScanner {
            heap: self,
            current_page_id: self.first_page_id,
            current_slot: 0,
            current_record: Vec::new(),
        }
    }
}

/// Sequential scan over every record in a [`TableHeap`], in page/slot order.
pub struct TableHeapScanner<'a> {
    heap: &'a TableHeap,
    current_page_id: PageId,
    current_slot: u16,
    current_record: Vec<u8>,
}

impl HeapFileScanner for TableHeapScanner<'_> {
    fn scan_next(&mut self) -> Result<RowId, HeapError> {
        loop {
            if self.current_page_id == INVALID_PAGE_ID {
                return Err(HeapError::EndOfFile);
            }

            let mut guard = self.heap.bpm.fetch_page(self.current_page_id)?;
            let page = SlottedPage::new(&mut guard[..]);

            if self.current_slot >= page.slot_count() {
                self.current_page_id = page.header().next_page_id;
                self.current_slot = 0;
                continue;
            }

            let row_id = RowId {
                page_id: self.current_page_id,
                slot_index: self.current_slot,
            };
            self.current_record = page.get_record(self.current_slot).to_vec();
            self.current_slot += 1;
            return Ok(row_id);
        }
    }

    fn current_record(&self) -> &[u8] {
        &self.current_record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Column, Type, Value};
    use buffer_pool_manager::ClockBufferPoolManager;
    use common::BlobFile;
    use tempfile::NamedTempFile;

    fn schema() -> Schema {
        Schema {
            columns: vec![
                Column {
                    name: "id".to_string(),
                    column_type: Type::Integer,
                    length: 4,
                },
                Column {
                    name: "name".to_string(),
                    column_type: Type::Varchar,
                    length: 20,
                },
            ],
        }
    }

    fn bpm() -> Arc<dyn BufferPoolManager> {
        let file = NamedTempFile::new().unwrap();
        let blob = Arc::new(BlobFile::open(file.path()).unwrap());
        std::mem::forget(file);
        Arc::new(ClockBufferPoolManager::new(8, blob))
    }

    #[test]
    fn insert_and_get_round_trip() {
        let heap = TableHeap::new(bpm(), schema()).unwrap();

        let tuple1 = Tuple {
            values: vec![Value::Integer(1), Value::Varchar("hello".to_string())],
        };
        let tuple2 = Tuple {
            values: vec![Value::Integer(2), Value::Varchar("world".to_string())],
        };

        let row_id1 = heap.insert_tuple(&tuple1).unwrap();
        let row_id2 = heap.insert_tuple(&tuple2).unwrap();

        assert_eq!(heap.get_tuple(row_id1).unwrap(), tuple1);
        assert_eq!(heap.get_tuple(row_id2).unwrap(), tuple2);
    }

    #[test]
    fn scanner_yields_every_inserted_row_in_order() {
        let heap = TableHeap::new(bpm(), schema()).unwrap();
        let mut expected = Vec::new();
        for i in 0..50 {
            let tuple = Tuple {
                values: vec![Value::Integer(i), Value::Varchar(format!("row{i}"))],
            };
            heap.insert_tuple(&tuple).unwrap();
            expected.push(tuple);
        }

        let mut scanner = heap.scanner();
        let mut seen = Vec::new();
        loop {
            match scanner.scan_next() {
                Ok(_row_id) => {
                    seen.push(Tuple::deserialize(scanner.current_record(), heap.schema()));
                }
                Err(HeapError::EndOfFile) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(seen, expected);
    }
}
