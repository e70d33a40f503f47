//! Repository layer: table-scoped database operations.

mod kv;
mod submission;

pub use kv::*;
pub use submission::*;
