//! Hosts-file synchronization.

pub mod sync;

pub use sync::{HostsChange, HostsFile};
