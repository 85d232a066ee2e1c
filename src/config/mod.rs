//! Settings loading and validation.

pub mod loader;
pub mod model;

pub use model::{HostsSettings, NginxSettings, Settings, SiteDefaults};
