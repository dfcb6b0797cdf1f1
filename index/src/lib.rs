//! An on-disk B+-tree index over a fixed-width integer attribute of a heap
//! file, built on the workspace's buffer pool manager and blob file.

pub mod bptree;
pub mod error;
pub mod key;
pub mod metadata;
pub mod node;

pub use bptree::{BPlusTree, Operator};
pub use error::IndexError;
pub use key::KeyType;
pub use metadata::IndexMetadata;
