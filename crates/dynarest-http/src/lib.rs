//! REST HTTP service layer for DynaRest.
//!
//! This crate provides:
//!
//! - **Router**: maps request paths onto list and detail routes of a resource
//! - **Handler trait**: defines the boundary between HTTP and the adapter core
//! - **Service**: hyper `Service` implementation
//! - **Response helpers**: JSON success/error response formatting
//! - **Server**: accept loop with graceful shutdown
#![allow(missing_docs)]

pub mod body;
pub mod dispatch;
pub mod response;
pub mod router;
pub mod server;
pub mod service;

pub use body::RestResponseBody;
pub use dispatch::{RestHandler, RestRequest};
pub use router::RestRoute;
pub use service::{RestHttpConfig, RestHttpService};
