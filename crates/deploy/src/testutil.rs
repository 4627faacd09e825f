//! Fixtures shared by the deploy and update tests.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::{Semaphore, mpsc};

use hashpub_protocol::ProgressMessage;
use hashpub_storage::{BlobStore, MemoryStore, StorageError, WriteOptions};

use crate::config::DeployerConfig;
use crate::deploy::Deployer;
use crate::graph::{GraphCompiler, GraphPackage};
use crate::types::HashPair;

/// Memory store that can fail or hold back selected writes.
#[derive(Default)]
pub(crate) struct TestStore {
    pub inner: MemoryStore,
    fail_suffix: Option<&'static str>,
    gate: Option<(&'static str, Arc<Semaphore>)>,
}

impl TestStore {
    /// Fails every write whose name ends with `suffix`.
    pub fn failing(suffix: &'static str) -> Self {
        Self {
            fail_suffix: Some(suffix),
            ..Self::default()
        }
    }

    /// Holds writes whose name ends with `suffix` until `gate` has a permit.
    pub fn gated(suffix: &'static str, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some((suffix, gate)),
            ..Self::default()
        }
    }
}

impl BlobStore for TestStore {
    fn exists<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<bool, StorageError>> {
        self.inner.exists(bucket, name)
    }

    fn write<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
        data: &'a [u8],
        options: WriteOptions<'a>,
    ) -> BoxFuture<'a, Result<bool, StorageError>> {
        Box::pin(async move {
            if self.fail_suffix.is_some_and(|s| name.ends_with(s)) {
                return Err(StorageError::Backend(format!("refusing {name}")));
            }
            if let Some((suffix, gate)) = &self.gate {
                if name.ends_with(suffix) {
                    gate.acquire()
                        .await
                        .map_err(|e| StorageError::Backend(e.to_string()))?
                        .forget();
                }
            }
            self.inner.write(bucket, name, data, options).await
        })
    }

    fn read<'a>(
        &'a self,
        bucket: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>, StorageError>> {
        self.inner.read(bucket, name)
    }
}

pub(crate) fn package(name: &str, imports: &[&str], js: &str) -> GraphPackage {
    GraphPackage {
        name: name.into(),
        imports: imports.iter().map(|s| s.to_string()).collect(),
        js: js.into(),
        minified_js: Some(format!("/*min*/{js}")),
        store: true,
        ..Default::default()
    }
}

/// `app` (a command) importing `utils`.
pub(crate) fn app_graph() -> GraphCompiler {
    let mut graph = GraphCompiler::default();
    graph.insert("utils", package("utils", &[], "var utils = 1;"));
    graph.insert("app", package("main", &["utils"], "var app = 2;"));
    graph
}

pub(crate) fn prelude() -> HashPair {
    HashPair::new("prelude-min", "prelude-max")
}

pub(crate) fn deployer(graph: GraphCompiler, backend: Arc<dyn BlobStore>) -> Deployer {
    Deployer::new(
        Arc::new(graph),
        backend,
        DeployerConfig::default(),
        prelude(),
    )
}

/// Everything currently buffered in `rx`.
pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressMessage>) -> Vec<ProgressMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}
