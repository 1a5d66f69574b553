//! Storage engine for DynaRest.
//!
//! The adapter talks to storage through the [`Table`] trait: single-item
//! get/put/delete, partition queries (optionally through a local secondary
//! index), filtered scans and batch gets. [`MemoryStore`] and [`MemoryTable`]
//! provide an in-memory engine with partition-level concurrency.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod condition;
pub mod error;
pub mod key;
pub mod memory;
pub mod store;
pub mod table;

pub use condition::Condition;
pub use error::StorageError;
pub use key::{PrimaryKey, SortableAttributeValue};
pub use memory::MemoryTable;
pub use store::MemoryStore;
pub use table::{Page, QueryRequest, ScanRequest, Table};
