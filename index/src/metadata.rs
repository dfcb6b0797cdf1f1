//! The index's metadata page: relation identity, key offset, fanout, root.

use common::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

use crate::error::IndexError;
use crate::key::KeyType;
use crate::node::{max_internal_capacity, max_leaf_capacity};

/// Relation names are stored NUL-padded in a fixed-size field.
const RELATION_NAME_LEN: usize = 20;

const HEADER_SIZE: usize = RELATION_NAME_LEN + 4 + 1 + 8 + 2 + 2;

/// Index identity and fanout, persisted on page 1 of the index file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    pub relation_name: String,
    pub attr_byte_offset: u32,
    pub key_type: KeyType,
    pub root_page_id: PageId,
    pub leaf_max_size: u16,
    pub internal_max_size: u16,
}

impl IndexMetadata {
    /// Builds fresh metadata for a new index, computing fanout from
    /// `PAGE_SIZE` unless `capacity_override` is given (tests only).
    pub fn new(
        relation_name: &str,
        attr_byte_offset: u32,
        capacity_override: Option<(u16, u16)>,
    ) -> Self {
        let (leaf_max_size, internal_max_size) =
            capacity_override.unwrap_or_else(Self::compute_fanout);
        Self {
            relation_name: relation_name.to_string(),
            attr_byte_offset,
            key_type: KeyType::Integer,
            root_page_id: INVALID_PAGE_ID,
            leaf_max_size,
            internal_max_size,
        }
    }

    /// The largest leaf/internal occupancy that fits in one page.
    fn compute_fanout() -> (u16, u16) {
        (max_leaf_capacity(PAGE_SIZE), max_internal_capacity(PAGE_SIZE))
    }

    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let name_bytes = self.relation_name.as_bytes();
        let n = name_bytes.len().min(RELATION_NAME_LEN);
        bytes[0..n].copy_from_slice(&name_bytes[..n]);

        let mut offset = RELATION_NAME_LEN;
        bytes[offset..offset + 4].copy_from_slice(&self.attr_byte_offset.to_le_bytes());
        offset += 4;
        bytes[offset] = self.key_type.discriminant();
        offset += 1;
        bytes[offset..offset + 8].copy_from_slice(&self.root_page_id.to_le_bytes());
        offset += 8;
        bytes[offset..offset + 2].copy_from_slice(&self.leaf_max_size.to_le_bytes());
        offset += 2;
        bytes[offset..offset + 2].copy_from_slice(&self.internal_max_size.to_le_bytes());

        bytes
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, IndexError> {
        let name_end = bytes[..RELATION_NAME_LEN]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(RELATION_NAME_LEN);
        let relation_name = String::from_utf8_lossy(&bytes[..name_end]).into_owned();

        let mut offset = RELATION_NAME_LEN;
        let attr_byte_offset = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let key_type = KeyType::from_discriminant(bytes[offset])?;
        offset += 1;
        let root_page_id = usize::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
        offset += 8;
        let leaf_max_size = u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap());
        offset += 2;
        let internal_max_size = u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap());

        Ok(Self {
            relation_name,
            attr_byte_offset,
            key_type,
            root_page_id,
            leaf_max_size,
            internal_max_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_metadata() {
        let metadata = IndexMetadata::new("students", 4, Some((3, 3)));
        let bytes = metadata.serialize();
        let decoded = IndexMetadata::deserialize(&bytes).unwrap();
        assert_eq!(metadata, decoded);
    }

    #[test]
    fn computed_fanout_is_deterministic() {
        let metadata = IndexMetadata::new("students", 4, None);
        assert!(metadata.leaf_max_size > 0);
        assert!(metadata.internal_max_size > 0);
    }

    #[test]
    fn truncates_relation_names_past_the_fixed_field() {
        let long_name = "a".repeat(RELATION_NAME_LEN + 10);
        let metadata = IndexMetadata::new(&long_name, 0, Some((3, 3)));
        let bytes = metadata.serialize();
        let decoded = IndexMetadata::deserialize(&bytes).unwrap();
        assert_eq!(decoded.relation_name.len(), RELATION_NAME_LEN);
    }
}
