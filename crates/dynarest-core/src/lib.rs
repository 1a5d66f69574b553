//! Adapter core for DynaRest.
//!
//! Translates REST list and detail requests into storage operations:
//!
//! - [`schema`] resolves a table's key structure and secondary indexes
//! - [`filter`] turns query and path parameters into a [`FilterDescriptor`]
//! - [`planner`] picks a direct query, a scan or a hybrid query-then-filter
//! - [`reconciler`] executes the plan, hydrating keys-only index rows
//! - [`cursor`] renders the `next` link that resumes the same plan
//!
//! On top of that, [`resource`] implements the CRUD surface of one table,
//! [`registry`] holds every registered resource and [`handler`] bridges the
//! HTTP layer to them.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod config;
pub mod cursor;
pub mod error;
pub mod fields;
pub mod filter;
pub mod handler;
pub mod planner;
pub mod reconciler;
pub mod registry;
pub mod resource;
pub mod schema;

pub use config::{AdapterConfig, ResourceConfig};
pub use error::AdapterError;
pub use filter::{FilterDescriptor, Predicate};
pub use handler::DynaRestHandler;
pub use planner::QueryPlan;
pub use registry::ResourceRegistry;
pub use resource::DynamoResource;
