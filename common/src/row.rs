//! The record locator stored as a B+-tree leaf value.

use crate::page::PageId;

/// A row id is a combination of a page id and a slot index, locating one
/// record inside a heap-file page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    pub page_id: PageId,
    pub slot_index: u16,
}

impl RowId {
    pub const SERIALIZED_LEN: usize = 10;

    pub fn serialize(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.page_id.to_le_bytes());
        out[8..10].copy_from_slice(&self.slot_index.to_le_bytes());
    }

    pub fn deserialize(bytes: &[u8]) -> Self {
        let page_id = usize::from_le_bytes(bytes[0..8].try_into().unwrap());
        let slot_index = u16::from_le_bytes(bytes[8..10].try_into().unwrap());
        RowId { page_id, slot_index }
    }
}
