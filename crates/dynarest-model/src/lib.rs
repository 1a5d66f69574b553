//! Model types for DynaRest.
//!
//! This crate holds the types shared by the storage engine, the adapter core
//! and the HTTP layer: scalar attribute values, table definitions as the
//! storage engine describes them, the resolved key schema the adapter plans
//! against, and the REST error value returned at the HTTP boundary.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod schema;
pub mod types;

pub use attribute_value::{AttributeValue, Item};
pub use error::{RestError, RestErrorCode};
pub use schema::{IndexProjection, KeyAttribute, SecondaryIndex, TableKeySchema};
pub use types::{
    AttributeDefinition, KeySchemaElement, KeyType, LocalSecondaryIndex, Projection,
    ProjectionType, ScalarType, TableDefinition,
};
