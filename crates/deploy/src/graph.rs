//! A compiler backed by a prebuilt package graph.
//!
//! The graph is a JSON object mapping import paths to already compiled
//! packages. Compiling a path walks its imports depth first and yields
//! packages in dependency order, which is all the publisher needs from a
//! real toolchain.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::compiler::{
    CompileOptions, CompileOutput, CompiledPackage, Compiler, Declaration, PackageArtifact,
    PackageVisitor,
};
use crate::error::DeployError;

/// One package in the graph file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphPackage {
    pub name: String,
    #[serde(default)]
    pub imports: Vec<String>,
    pub js: String,
    /// Minified script; `js` is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minified_js: Option<String>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    #[serde(default)]
    pub export_data: String,
    #[serde(default = "default_store")]
    pub store: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_template: Option<String>,
}

fn default_store() -> bool {
    true
}

impl GraphPackage {
    fn artifact(&self, import_path: &str, minify: bool) -> PackageArtifact {
        let js = match (&self.minified_js, minify) {
            (Some(min), true) => min,
            _ => &self.js,
        };
        PackageArtifact {
            import_path: import_path.to_string(),
            name: self.name.clone(),
            content: js.as_bytes().to_vec(),
            imports: self.imports.clone(),
            declarations: self.declarations.clone(),
            export_data: self.export_data.as_bytes().to_vec(),
            minified: minify,
        }
    }
}

/// Serves compiles from an in-memory package graph.
#[derive(Debug, Clone, Default)]
pub struct GraphCompiler {
    packages: BTreeMap<String, GraphPackage>,
}

impl GraphCompiler {
    pub fn new(packages: BTreeMap<String, GraphPackage>) -> Self {
        Self { packages }
    }

    pub fn from_json(json: &str) -> Result<Self, DeployError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Reads a graph file.
    pub async fn load(path: &Path) -> Result<Self, DeployError> {
        let json = tokio::fs::read_to_string(path).await?;
        let compiler = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), packages = compiler.packages.len(), "package graph loaded");
        Ok(compiler)
    }

    pub fn insert(&mut self, import_path: impl Into<String>, package: GraphPackage) {
        self.packages.insert(import_path.into(), package);
    }

    /// Import paths reachable from `root`, dependencies before dependents.
    fn order<'a>(&'a self, root: &'a str) -> Result<Vec<&'a str>, DeployError> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut active = Vec::new();
        self.visit(root, &mut active, &mut done, &mut order)?;
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        path: &'a str,
        active: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
        order: &mut Vec<&'a str>,
    ) -> Result<(), DeployError> {
        if done.contains(path) {
            return Ok(());
        }
        if active.contains(&path) {
            return Err(DeployError::Compile(format!(
                "import cycle: {} -> {path}",
                active.join(" -> ")
            )));
        }
        let package = self.packages.get(path).ok_or_else(|| {
            DeployError::Compile(match active.last() {
                Some(parent) => format!("package {path} not found (imported by {parent})"),
                None => format!("package {path} not found"),
            })
        })?;

        active.push(path);
        for import in &package.imports {
            self.visit(import, active, done, order)?;
        }
        active.pop();

        done.insert(path);
        order.push(path);
        Ok(())
    }
}

impl Compiler for GraphCompiler {
    fn compile<'a>(
        &'a self,
        import_path: &'a str,
        options: CompileOptions,
        mut visitor: Option<&'a mut dyn PackageVisitor>,
    ) -> BoxFuture<'a, Result<CompileOutput, DeployError>> {
        Box::pin(async move {
            let order = self.order(import_path)?;
            let mut packages = Vec::with_capacity(order.len());
            let mut root = None;
            let mut entry_template = None;

            for path in order {
                let Some(package) = self.packages.get(path) else {
                    continue;
                };
                let artifact = package.artifact(path, options.minify);
                if let Some(visitor) = visitor.as_mut() {
                    visitor.on_package(&artifact).await?;
                }
                packages.push(CompiledPackage {
                    path: path.to_string(),
                    contents: artifact.content.clone(),
                    store: package.store,
                });
                if path == import_path {
                    entry_template = package.entry_template.clone();
                    root = Some(artifact);
                }
            }

            let root = root.ok_or_else(|| {
                DeployError::Compile(format!("package {import_path} not found"))
            })?;
            Ok(CompileOutput {
                root,
                packages,
                entry_template,
            })
        })
    }
}
