//! Wire types shared between the publisher and its clients.
//!
//! Everything a client can observe lives here: the progress messages
//! streamed while a build is published, the cache manifest a client
//! sends for an incremental update, and the object naming scheme that
//! browsers rely on to fetch published artifacts.

pub mod messages;
pub mod naming;

pub use messages::{
    Archive, ArchiveIndex, ArchiveIndexItem, Building, CacheManifest, ProgressMessage, Storing,
};

/// Import path of the fixed prelude asset that every loader fetches first.
pub const PRELUDE_PATH: &str = "prelude";

/// Import path of the runtime package every program depends on.
pub const RUNTIME_PATH: &str = "runtime";
