//! Data types for the publish flow.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use hashpub_protocol::CacheManifest;

use crate::compiler::CompileOutput;
use crate::hashchain::ContentHash;

/// Which compiled form of a program is being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Variant {
    /// Minified output.
    Optimized,
    /// Readable output, published under the `$max` document path.
    Unoptimized,
}

impl Variant {
    pub fn minified(self) -> bool {
        matches!(self, Variant::Optimized)
    }

    pub fn label(self) -> &'static str {
        match self {
            Variant::Optimized => "min",
            Variant::Unoptimized => "max",
        }
    }
}

/// The set of variants a deploy builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variants {
    pub optimized: bool,
    pub unoptimized: bool,
}

impl Variants {
    pub fn both() -> Self {
        Self {
            optimized: true,
            unoptimized: true,
        }
    }

    pub fn only(variant: Variant) -> Self {
        Self {
            optimized: variant == Variant::Optimized,
            unoptimized: variant == Variant::Unoptimized,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.optimized && !self.unoptimized
    }

    /// Requested variants, optimized first.
    pub fn iter(&self) -> impl Iterator<Item = Variant> + use<> {
        let optimized = self.optimized.then_some(Variant::Optimized);
        let unoptimized = self.unoptimized.then_some(Variant::Unoptimized);
        optimized.into_iter().chain(unoptimized)
    }
}

impl Default for Variants {
    fn default() -> Self {
        Self::both()
    }
}

/// How entry documents are named in the index bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressMode {
    /// Immutable `<hash>` and `<hash>/index.html`.
    #[default]
    Hash,
    /// Mutable documents named after the import path.
    Path,
}

/// Hashes of one asset in its optimized and unoptimized forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashPair {
    pub min: String,
    pub max: String,
}

impl HashPair {
    pub fn new(min: impl Into<String>, max: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    pub fn get(&self, minified: bool) -> &str {
        if minified { &self.min } else { &self.max }
    }
}

/// Precomputed hashes of standard packages, keyed by import path.
///
/// Standard packages are published out of band, so the publisher never
/// uploads them; it only needs their hashes to build manifests.
pub type StandardIndex = HashMap<String, HashPair>;

/// Result of publishing one variant.
#[derive(Debug, Clone)]
pub struct DeployOutput {
    pub output: CompileOutput,
    pub loader_hash: ContentHash,
    pub entry_hash: ContentHash,
}

/// A client's request to refresh its package cache.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    /// Packages the client is editing; these are never archived.
    pub source: BTreeSet<String>,
    /// What the client already holds, import path to hash.
    pub cache: CacheManifest,
    pub minified: bool,
}
