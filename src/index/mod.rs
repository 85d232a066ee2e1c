//! Record codec, index persistence, and session snapshots.

pub mod record;
pub mod session;
pub mod store;

pub use record::{decode, encode, primary_domain, ConfigurationRecord, RecordStatus};
pub use session::Session;
pub use store::IndexStore;
