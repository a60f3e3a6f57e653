//! Ephemeral, expiring job status storage.
//!
//! The status store is the only channel between request handlers and
//! background workers: the dispatcher seeds records, the status writer applies
//! worker updates, and status queries read them back.

mod memory;
mod report;
mod store;

pub use memory::MemoryStatusStore;
pub use report::{query_status, StatusReport, StatusSelector, StatusStats};
pub use store::{StatusKey, StatusStore, StatusStoreError, StatusStoreExt, StatusValue};
