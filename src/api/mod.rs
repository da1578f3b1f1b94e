//! HTTP API for the intake service.
//!
//! Routes are nested under `/api/`. Each handler checks the session for the
//! capability it needs; an audit layer logs every request.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerError, ServerInfo};
pub use types::ApiContext;
