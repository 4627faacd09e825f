//! Incremental updates of a client's package cache.
//!
//! The client names the packages it is editing and the hashes it already
//! holds. Every other package reachable from the runtime and the edited
//! packages is compiled; changed ones are uploaded as a script plus a
//! stripped archive and announced with an [`Archive`] message once both
//! halves are stored.

use std::collections::HashSet;

use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

use hashpub_constor::{Artifact, CompletionBarrier, ContentStore, ProgressSink, UploadJob};
use hashpub_protocol::{
    Archive, ArchiveIndex, ArchiveIndexItem, Building, PRELUDE_PATH, RUNTIME_PATH, naming,
};
use hashpub_storage::{MIME_JS, MIME_JSON};

use crate::archive::StrippedArchive;
use crate::compiler::{CompileOptions, PackageArtifact, PackageVisitor};
use crate::deploy::Deployer;
use crate::error::DeployError;
use crate::hashchain::ContentHash;
use crate::types::{StandardIndex, UpdateRequest};

impl Deployer {
    /// Brings a client's package cache up to date.
    ///
    /// Returns the archive index that was also sent as the final
    /// `ArchiveIndex` progress message.
    pub async fn update(&self, request: &UpdateRequest) -> Result<ArchiveIndex, DeployError> {
        let sink = self.sink();
        let store = self.open_store(sink.clone());

        sink.send(Building::starting());

        let prelude = self.prelude.get(request.minified);
        if request.cache.get(PRELUDE_PATH).map(String::as_str) != Some(prelude) {
            sink.send(Archive {
                path: PRELUDE_PATH.into(),
                hash: prelude.into(),
                standard: true,
            });
        }

        let mut visitor = ArchiveVisitor {
            request,
            standard: &self.standard,
            pkg_bucket: &self.config.pkg_bucket,
            store: &store,
            sink: sink.clone(),
            seen: HashSet::new(),
            index: ArchiveIndex::new(),
        };
        let compiled = self.compile_all(request, &mut visitor).await;
        let index = visitor.index;

        store.close();
        if let Err(e) = compiled {
            if let Err(store_err) = store.wait().await {
                warn!(error = %store_err, "upload failed while draining");
            }
            return Err(e);
        }
        store.wait().await?;

        info!(
            packages = index.len(),
            changed = index.iter().filter(|(_, item)| !item.unchanged).count(),
            "update completed"
        );
        sink.send(index.clone());
        sink.send(Building::done());
        Ok(index)
    }

    async fn compile_all(
        &self,
        request: &UpdateRequest,
        visitor: &mut ArchiveVisitor<'_>,
    ) -> Result<(), DeployError> {
        let options = CompileOptions {
            minify: request.minified,
            command: false,
        };
        let roots = std::iter::once(RUNTIME_PATH).chain(request.source.iter().map(String::as_str));
        for root in roots {
            debug!(root, "compiling");
            let visitor: &mut dyn PackageVisitor = &mut *visitor;
            self.compiler.compile(root, options, Some(visitor)).await?;
        }
        Ok(())
    }
}

/// Archives every dependency a compile reports, once.
struct ArchiveVisitor<'a> {
    request: &'a UpdateRequest,
    standard: &'a StandardIndex,
    pkg_bucket: &'a str,
    store: &'a ContentStore,
    sink: ProgressSink,
    seen: HashSet<String>,
    index: ArchiveIndex,
}

impl ArchiveVisitor<'_> {
    async fn archive(&mut self, package: &PackageArtifact) -> Result<(), DeployError> {
        let path = package.import_path.as_str();
        if !self.seen.insert(path.to_string()) {
            return Ok(());
        }
        if package.is_command() || self.request.source.contains(path) {
            return Ok(());
        }

        let minified = self.request.minified;
        let (hash, standard) = match self.standard.get(path) {
            Some(pair) => (pair.get(minified).to_string(), true),
            None => (ContentHash::of(&package.content).to_hex(), false),
        };
        let unchanged = self.request.cache.get(path) == Some(&hash);
        self.index.insert(
            path,
            ArchiveIndexItem {
                hash: hash.clone(),
                unchanged,
            },
        );
        if unchanged {
            return Ok(());
        }
        if standard {
            self.sink.send(Archive {
                path: path.to_string(),
                hash,
                standard: true,
            });
            return Ok(());
        }

        let stripped = StrippedArchive::strip(package).encode()?;
        let sink = self.sink.clone();
        let notice = Archive {
            path: path.to_string(),
            hash: hash.clone(),
            standard: false,
        };
        let barrier = CompletionBarrier::new(2, move || sink.send(notice));

        let script = Artifact::immutable(
            self.pkg_bucket,
            naming::script_name(path, &hash),
            package.content.clone(),
            MIME_JS,
        );
        let archive = Artifact::immutable(
            self.pkg_bucket,
            naming::stripped_archive_name(path, &hash),
            stripped,
            MIME_JSON,
        );
        self.store
            .submit(UploadJob::counted(script).on_done(barrier.callback()))
            .await?;
        self.store
            .submit(UploadJob::counted(archive).on_done(barrier.callback()))
            .await?;
        Ok(())
    }
}

impl PackageVisitor for ArchiveVisitor<'_> {
    fn on_package<'a>(
        &'a mut self,
        package: &'a PackageArtifact,
    ) -> BoxFuture<'a, Result<(), DeployError>> {
        Box::pin(self.archive(package))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use hashpub_protocol::ProgressMessage;
    use hashpub_storage::{BlobStore, MemoryStore};

    use super::*;
    use crate::graph::{GraphCompiler, GraphPackage};
    use crate::testutil::{TestStore, deployer, drain, package};
    use crate::types::HashPair;

    const LIB: &str = "example.com/lib";

    fn out_of_band(name: &str, js: &str) -> GraphPackage {
        GraphPackage {
            store: false,
            ..package(name, &[], js)
        }
    }

    fn graph() -> GraphCompiler {
        let mut graph = GraphCompiler::default();
        graph.insert("runtime", out_of_band("runtime", "rt"));
        graph.insert("errors", out_of_band("errors", "err"));
        graph.insert(LIB, package("lib", &["errors", "runtime"], "var lib;"));
        graph.insert("example.com/edit", package("edit", &[LIB], "var edit;"));
        graph.insert("example.com/tool", package("main", &[LIB], "var tool;"));
        graph
    }

    fn standard() -> StandardIndex {
        [
            ("runtime".to_string(), HashPair::new("rt-min", "rt-max")),
            ("errors".to_string(), HashPair::new("err-min", "err-max")),
        ]
        .into_iter()
        .collect()
    }

    fn lib_hash() -> String {
        ContentHash::of(b"var lib;").to_hex()
    }

    fn request(cache: &[(&str, &str)]) -> UpdateRequest {
        UpdateRequest {
            source: BTreeSet::from(["example.com/edit".to_string(), "example.com/tool".to_string()]),
            cache: cache
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            minified: false,
        }
    }

    fn archives(events: &[ProgressMessage]) -> Vec<&Archive> {
        events
            .iter()
            .filter_map(|m| match m {
                ProgressMessage::Archive(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn fresh_cache_archives_every_dependency_once() {
        let backend = Arc::new(MemoryStore::new());
        let mut deployer = deployer(graph(), backend.clone()).with_standard(standard());
        let mut rx = deployer.take_events().unwrap();

        let index = deployer.update(&request(&[])).await.unwrap();

        let paths: Vec<&str> = index.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["errors", LIB, "runtime"]);
        assert!(index.iter().all(|(_, item)| !item.unchanged));
        assert_eq!(index.get(LIB).unwrap().hash, lib_hash());
        assert_eq!(index.get("runtime").unwrap().hash, "rt-max");

        let hash = lib_hash();
        assert_eq!(
            backend.names("pkg"),
            vec![format!("{LIB}.{hash}.ax"), format!("{LIB}.{hash}.js")]
        );
        let stripped = backend.get("pkg", &format!("{LIB}.{hash}.ax")).unwrap();
        assert_eq!(stripped.content_type, MIME_JSON);
        let stripped = StrippedArchive::decode(&stripped.data).unwrap();
        assert_eq!(stripped.import_path, LIB);
        assert_eq!(stripped.imports, vec!["errors", "runtime"]);

        let events = drain(&mut rx);
        assert_eq!(events[0], ProgressMessage::from(Building::starting()));
        let notices = archives(&events);
        assert_eq!(
            notices,
            vec![
                &Archive {
                    path: "prelude".into(),
                    hash: "prelude-max".into(),
                    standard: true
                },
                &Archive {
                    path: "runtime".into(),
                    hash: "rt-max".into(),
                    standard: true
                },
                &Archive {
                    path: "errors".into(),
                    hash: "err-max".into(),
                    standard: true
                },
                &Archive {
                    path: LIB.into(),
                    hash: lib_hash(),
                    standard: false
                },
            ]
        );
        let n = events.len();
        assert_eq!(events[n - 2], ProgressMessage::from(index));
        assert_eq!(events[n - 1], ProgressMessage::from(Building::done()));
    }

    #[tokio::test]
    async fn current_cache_sends_nothing() {
        let backend = Arc::new(MemoryStore::new());
        let mut deployer = deployer(graph(), backend.clone()).with_standard(standard());
        let mut rx = deployer.take_events().unwrap();
        let hash = lib_hash();
        let req = request(&[
            ("prelude", "prelude-max"),
            ("runtime", "rt-max"),
            ("errors", "err-max"),
            (LIB, &hash),
        ]);

        let index = deployer.update(&req).await.unwrap();

        assert_eq!(index.len(), 3);
        assert!(index.iter().all(|(_, item)| item.unchanged));
        assert!(backend.is_empty());
        assert!(archives(&drain(&mut rx)).is_empty());
    }

    #[tokio::test]
    async fn stale_standard_package_is_announced_not_uploaded() {
        let backend = Arc::new(MemoryStore::new());
        let mut deployer = deployer(graph(), backend.clone()).with_standard(standard());
        let mut rx = deployer.take_events().unwrap();
        let hash = lib_hash();
        let req = request(&[
            ("prelude", "prelude-max"),
            ("runtime", "rt-max"),
            ("errors", "old"),
            (LIB, &hash),
        ]);

        let index = deployer.update(&req).await.unwrap();

        assert!(!index.get("errors").unwrap().unchanged);
        assert!(backend.is_empty());
        let events = drain(&mut rx);
        let notices = archives(&events);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].path, "errors");
        assert!(notices[0].standard);
    }

    #[tokio::test]
    async fn minified_update_uses_minified_hashes() {
        let backend = Arc::new(MemoryStore::new());
        let deployer = deployer(graph(), backend.clone()).with_standard(standard());
        let req = UpdateRequest {
            minified: true,
            ..request(&[])
        };

        let index = deployer.update(&req).await.unwrap();

        assert_eq!(index.get("runtime").unwrap().hash, "rt-min");
        let hash = ContentHash::of(b"/*min*/var lib;").to_hex();
        assert_eq!(index.get(LIB).unwrap().hash, hash);
        let stripped = backend.get("pkg", &format!("{LIB}.{hash}.ax")).unwrap();
        assert!(StrippedArchive::decode(&stripped.data).unwrap().minified);
    }

    #[tokio::test]
    async fn archive_notice_waits_for_both_halves() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(TestStore::gated(".js", gate.clone()));
        let mut deployer = deployer(graph(), backend.clone()).with_standard(standard());
        let mut rx = deployer.take_events().unwrap();
        let req = request(&[]);

        let is_lib = |m: &ProgressMessage| matches!(m, ProgressMessage::Archive(a) if a.path == LIB);
        let control = async {
            let name = format!("{LIB}.{}.ax", lib_hash());
            while !backend.exists("pkg", &name).await.unwrap() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let early = drain(&mut rx);
            assert!(!early.iter().any(is_lib));
            gate.add_permits(1);
        };
        let (result, ()) = tokio::join!(deployer.update(&req), control);
        result.unwrap();

        let late = drain(&mut rx);
        assert_eq!(late.iter().filter(|m| is_lib(*m)).count(), 1);
    }

    #[tokio::test]
    async fn failed_half_suppresses_notice() {
        let backend = Arc::new(TestStore::failing(".ax"));
        let mut deployer = deployer(graph(), backend.clone()).with_standard(standard());
        let mut rx = deployer.take_events().unwrap();

        let err = deployer.update(&request(&[])).await.unwrap_err();
        assert!(matches!(err, DeployError::Storage(_)));

        let events = drain(&mut rx);
        assert!(!archives(&events).iter().any(|a| a.path == LIB));
        assert!(
            !events
                .iter()
                .any(|m| matches!(m, ProgressMessage::ArchiveIndex(_)))
        );
        assert_eq!(backend.inner.names("pkg").len(), 1);
    }

    #[tokio::test]
    async fn slow_reader_receives_every_notice() {
        const DEPS: usize = 1100;
        let mut graph = graph();
        let deps: Vec<String> = (0..DEPS).map(|i| format!("example.com/dep{i:04}")).collect();
        for (i, dep) in deps.iter().enumerate() {
            graph.insert(dep, package(&format!("dep{i:04}"), &[], &format!("var d{i};")));
        }
        let imports: Vec<&str> = deps.iter().map(String::as_str).collect();
        graph.insert("example.com/edit", package("edit", &imports, "var edit;"));
        let backend = Arc::new(MemoryStore::new());
        let mut deployer = deployer(graph, backend.clone()).with_standard(standard());
        let mut rx = deployer.take_events().unwrap();

        let index = deployer.update(&request(&[])).await.unwrap();

        assert_eq!(index.len(), DEPS + 3);
        let events = drain(&mut rx);
        let stored = archives(&events).iter().filter(|a| !a.standard).count();
        assert_eq!(stored, DEPS + 1);
        let n = events.len();
        assert_eq!(events[n - 2], ProgressMessage::from(index));
        assert_eq!(events[n - 1], ProgressMessage::from(Building::done()));
    }

    #[tokio::test]
    async fn unknown_source_is_compile_error() {
        let backend = Arc::new(MemoryStore::new());
        let deployer = deployer(graph(), backend).with_standard(standard());
        let req = UpdateRequest {
            source: BTreeSet::from(["example.com/missing".to_string()]),
            ..UpdateRequest::default()
        };
        let err = deployer.update(&req).await.unwrap_err();
        assert!(matches!(err, DeployError::Compile(_)));
    }
}
