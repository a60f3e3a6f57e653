//! Lock registry serializing automation runs per resource key.

mod registry;

pub use registry::{LockRegistry, LockTicket, ResourceLock};
