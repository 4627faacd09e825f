//! Interface to the compiler that turns import paths into JavaScript.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// One top-level declaration of a compiled package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub full_name: String,
    /// Declarations that must run before the package is usable.
    #[serde(default)]
    pub blocking: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

/// A compiled package as seen by a [`PackageVisitor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageArtifact {
    pub import_path: String,
    /// Package name; `main` marks an executable entry point.
    pub name: String,
    /// The package script.
    pub content: Vec<u8>,
    pub imports: Vec<String>,
    pub declarations: Vec<Declaration>,
    /// Opaque type information consumed by later compilations.
    pub export_data: Vec<u8>,
    pub minified: bool,
}

impl PackageArtifact {
    pub fn is_command(&self) -> bool {
        self.name == "main"
    }
}

/// A package in the dependency-ordered output of a compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPackage {
    pub path: String,
    pub contents: Vec<u8>,
    /// False for packages that are published out of band.
    pub store: bool,
}

/// Everything a compile of a root package produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub root: PackageArtifact,
    /// Root dependencies first, root last.
    pub packages: Vec<CompiledPackage>,
    /// Project-provided entry document template, if any.
    pub entry_template: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub minify: bool,
    /// Compile the root as a command rather than a library.
    pub command: bool,
}

/// Receives every package a compile produces, dependencies first.
pub trait PackageVisitor: Send {
    fn on_package<'a>(
        &'a mut self,
        package: &'a PackageArtifact,
    ) -> BoxFuture<'a, Result<(), DeployError>>;
}

/// Compiles an import path and its transitive dependencies.
///
/// A deploy polls the compiles of all requested variants from one task, so
/// `compile` must not block the executor. Implementations doing heavy CPU
/// work run it on `tokio::task::spawn_blocking` and await the handle.
pub trait Compiler: Send + Sync {
    fn compile<'a>(
        &'a self,
        import_path: &'a str,
        options: CompileOptions,
        visitor: Option<&'a mut dyn PackageVisitor>,
    ) -> BoxFuture<'a, Result<CompileOutput, DeployError>>;
}
