//! # ml-api
//!
//! HTTP handlers for MediaLib RS.
//!
//! Every mutating endpoint answers with the uniform operation envelope; the
//! asset endpoint answers with raw bytes or a bare status code.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;

pub use extractors::AppState;
pub use routes::router;
