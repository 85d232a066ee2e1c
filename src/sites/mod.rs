//! On-disk projection of records: config files and enable links.

pub mod projector;

pub use projector::{link_exists, link_target, FileChange, LinkChange, RemoveOutcome, RenameOutcome, SiteProjector};
