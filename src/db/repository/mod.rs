//! Repository layer: key-scoped operations over the local store.
//!
//! Everything lives in one key-value table; the sub-modules own the
//! key naming and the JSON shape of each kind of entry.

mod assessment;
mod case;
mod kv;

pub use assessment::*;
pub use case::*;
pub use kv::*;
