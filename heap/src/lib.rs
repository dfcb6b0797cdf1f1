//! A slotted-page heap file for fixed-width tuples, consumed by the index
//! crate's bulk-load path through [`HeapFileScanner`].

pub mod error;
pub mod page;
pub mod table_heap;
pub mod tuple;

pub use error::HeapError;
pub use table_heap::{HeapFileScanner, TableHeap, TableHeapScanner};
pub use tuple::{Column, Schema, Tuple, Type, Value};
