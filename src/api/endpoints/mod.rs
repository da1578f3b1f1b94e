//! API endpoint handlers, one module per resource.

pub mod analysis;
pub mod assessment;
pub mod cases;
pub mod health;
pub mod medications;
pub mod session;
