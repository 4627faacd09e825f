use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Client-held cache manifest: import path to the last hash the client saw.
///
/// The prelude is listed under [`PRELUDE_PATH`](crate::PRELUDE_PATH).
pub type CacheManifest = BTreeMap<String, String>;

/// A progress message emitted while publishing.
///
/// Serialized as `{"type": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ProgressMessage {
    Building(Building),
    Storing(Storing),
    ArchiveIndex(ArchiveIndex),
    Archive(Archive),
}

impl From<Building> for ProgressMessage {
    fn from(m: Building) -> Self {
        Self::Building(m)
    }
}

impl From<Storing> for ProgressMessage {
    fn from(m: Storing) -> Self {
        Self::Storing(m)
    }
}

impl From<ArchiveIndex> for ProgressMessage {
    fn from(m: ArchiveIndex) -> Self {
        Self::ArchiveIndex(m)
    }
}

impl From<Archive> for ProgressMessage {
    fn from(m: Archive) -> Self {
        Self::Archive(m)
    }
}

// ---------------------------------------------------------------------------
// Build / store status
// ---------------------------------------------------------------------------

/// Compilation status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    #[serde(default, skip_serializing_if = "is_false")]
    pub starting: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub done: bool,
}

impl Building {
    pub fn starting() -> Self {
        Self {
            starting: true,
            ..Self::default()
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

/// Upload status.
///
/// Snapshots carry `finished`/`unchanged`/`remain`; the bracketing
/// messages of a publish set only `starting` or `done`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storing {
    #[serde(default, skip_serializing_if = "is_false")]
    pub starting: bool,
    #[serde(default)]
    pub finished: usize,
    #[serde(default)]
    pub unchanged: usize,
    #[serde(default)]
    pub remain: usize,
    #[serde(default, skip_serializing_if = "is_false")]
    pub done: bool,
}

impl Storing {
    pub fn starting() -> Self {
        Self {
            starting: true,
            ..Self::default()
        }
    }

    pub fn snapshot(finished: usize, unchanged: usize, remain: usize) -> Self {
        Self {
            finished,
            unchanged,
            remain,
            ..Self::default()
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Incremental update results
// ---------------------------------------------------------------------------

/// Dependencies resolved by an incremental update, keyed by import path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveIndex(pub BTreeMap<String, ArchiveIndexItem>);

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, item: ArchiveIndexItem) {
        self.0.insert(path.into(), item);
    }

    pub fn get(&self, path: &str) -> Option<&ArchiveIndexItem> {
        self.0.get(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArchiveIndexItem)> {
        self.0.iter()
    }
}

/// One dependency in an [`ArchiveIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveIndexItem {
    /// Hex hash of the package script.
    pub hash: String,
    /// True when the client cache already holds this exact hash; such
    /// packages are never announced with an [`Archive`] message.
    pub unchanged: bool,
}

/// A package script and its stripped archive are available for download.
///
/// `standard` archives (the prelude and pre-hashed standard packages) are
/// served from a fixed location and announced without being uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    pub path: String,
    pub hash: String,
    pub standard: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}
