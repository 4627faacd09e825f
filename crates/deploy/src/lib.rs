//! Build publishing: full deploys and incremental cache updates.
//!
//! This crate implements the **business logic** of publishing compiled
//! programs to a blob store. It has no transport dependencies: callers
//! provide a [`Compiler`] and a [`BlobStore`](hashpub_storage::BlobStore)
//! and read progress from [`Deployer::take_events`].
//!
//! # Hash chain
//!
//! 1. **Packages** are stored under the hash of their script.
//! 2. The **loader** embeds the ordered package manifest and is stored
//!    under its own hash.
//! 3. The **entry document** references the loader by hash and is stored
//!    by hash or under its import path.

pub mod archive;
pub mod compiler;
pub mod config;
pub mod deploy;
pub mod error;
pub mod graph;
pub mod hashchain;
pub mod template;
pub mod types;
mod update;

#[cfg(test)]
mod testutil;

pub use archive::{DeclarationSummary, StrippedArchive};
pub use compiler::{
    CompileOptions, CompileOutput, CompiledPackage, Compiler, Declaration, PackageArtifact,
    PackageVisitor,
};
pub use config::DeployerConfig;
pub use deploy::Deployer;
pub use error::DeployError;
pub use graph::{GraphCompiler, GraphPackage};
pub use hashchain::{
    ContentHash, PackageRef, Rendered, ScriptHost, build_entry_document, build_loader_script,
};
pub use types::{
    AddressMode, DeployOutput, HashPair, StandardIndex, UpdateRequest, Variant, Variants,
};
