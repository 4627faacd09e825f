//! Full deploys of a command package.
//!
//! A deploy compiles the entry package once per requested variant, runs
//! the variants concurrently against one shared [`ContentStore`], and
//! publishes for each variant the package scripts, the loader and the
//! entry document.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use hashpub_constor::{Artifact, ContentStore, ProgressSink, UploadJob};
use hashpub_protocol::{Building, ProgressMessage, Storing, naming};
use hashpub_storage::{BlobStore, MIME_HTML, MIME_JS};

use crate::compiler::{CompileOptions, Compiler};
use crate::config::DeployerConfig;
use crate::error::DeployError;
use crate::hashchain::{self, ContentHash, PackageRef};
use crate::types::{AddressMode, DeployOutput, HashPair, StandardIndex, Variant, Variants};

/// Publishes builds to a blob store.
pub struct Deployer {
    pub(crate) compiler: Arc<dyn Compiler>,
    pub(crate) backend: Arc<dyn BlobStore>,
    pub(crate) config: DeployerConfig,
    pub(crate) prelude: HashPair,
    pub(crate) standard: StandardIndex,
    events_tx: mpsc::UnboundedSender<ProgressMessage>,
    events_rx: Option<mpsc::UnboundedReceiver<ProgressMessage>>,
}

impl Deployer {
    /// Creates a deployer. `prelude` holds the hashes of the published prelude.
    pub fn new(
        compiler: Arc<dyn Compiler>,
        backend: Arc<dyn BlobStore>,
        config: DeployerConfig,
        prelude: HashPair,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            compiler,
            backend,
            config,
            prelude,
            standard: StandardIndex::new(),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Sets the hashes of packages published out of band.
    pub fn with_standard(mut self, standard: StandardIndex) -> Self {
        self.standard = standard;
        self
    }

    pub fn config(&self) -> &DeployerConfig {
        &self.config
    }

    /// Takes the progress receiver. Can only be called once.
    ///
    /// The channel is unbounded so a slow reader never loses an archive
    /// notice or the final index.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ProgressMessage>> {
        self.events_rx.take()
    }

    pub(crate) fn sink(&self) -> ProgressSink {
        ProgressSink::new(self.events_tx.clone())
    }

    pub(crate) fn open_store(&self, sink: ProgressSink) -> ContentStore {
        ContentStore::open(
            self.backend.clone(),
            sink,
            self.config.concurrent_storage_uploads,
        )
    }

    /// Hash of a package that is not uploaded by this publisher.
    fn external_hash(&self, path: &str, contents: &[u8], minified: bool) -> String {
        match self.standard.get(path) {
            Some(pair) => pair.get(minified).to_string(),
            None => ContentHash::of(contents).to_hex(),
        }
    }

    /// Compiles and publishes `path` in every requested variant.
    ///
    /// Variants run concurrently. If any variant fails, the uploads already
    /// queued are drained and the first variant error (optimized before
    /// unoptimized) is returned.
    pub async fn deploy(
        &self,
        path: &str,
        mode: AddressMode,
        variants: Variants,
    ) -> Result<BTreeMap<Variant, DeployOutput>, DeployError> {
        let sink = self.sink();
        let store = self.open_store(sink.clone());

        sink.send(Building::starting());
        sink.send(Storing::starting());

        let (store_ref, sink_ref) = (&store, &sink);
        let runs = variants.iter().map(move |variant| async move {
            let result = self
                .deploy_variant(store_ref, sink_ref, path, mode, variant)
                .await;
            (variant, result)
        });
        let results = join_all(runs).await;

        let mut outputs = BTreeMap::new();
        let mut failure = None;
        for (variant, result) in results {
            match result {
                Ok(output) => {
                    outputs.insert(variant, output);
                }
                Err(e) => {
                    error!(path, variant = variant.label(), error = %e, "variant failed");
                    failure.get_or_insert(e);
                }
            }
        }

        store.close();
        if let Some(e) = failure {
            if let Err(store_err) = store.wait().await {
                warn!(path, error = %store_err, "upload failed while draining");
            }
            return Err(e);
        }

        sink.send(Building::done());
        store.wait().await?;
        sink.send(Storing::done());

        let counters = store.counters();
        info!(
            path,
            stored = counters.done,
            unchanged = counters.unchanged,
            "deploy completed"
        );
        Ok(outputs)
    }

    async fn deploy_variant(
        &self,
        store: &ContentStore,
        sink: &ProgressSink,
        path: &str,
        mode: AddressMode,
        variant: Variant,
    ) -> Result<DeployOutput, DeployError> {
        let minified = variant.minified();
        let options = CompileOptions {
            minify: minified,
            command: true,
        };
        let output = self.compiler.compile(path, options, None).await?;
        if !output.root.is_command() {
            return Err(DeployError::NotCommand(path.to_string()));
        }
        let template = hashchain::entry_template(output.entry_template.as_deref())?;
        let host = self.config.script_host();
        let pkg_bucket = self.config.pkg_bucket.as_str();

        let mut refs = Vec::with_capacity(output.packages.len());
        for package in &output.packages {
            let hash = if package.store {
                let hash = ContentHash::of(&package.contents).to_hex();
                let artifact = Artifact::immutable(
                    pkg_bucket,
                    naming::script_name(&package.path, &hash),
                    package.contents.clone(),
                    MIME_JS,
                );
                store.submit(UploadJob::counted(artifact)).await?;
                hash
            } else {
                self.external_hash(&package.path, &package.contents, minified)
            };
            refs.push(PackageRef::new(&package.path, hash));
        }

        sink.send(Building::message("Loader"));
        let entry_path = output.root.import_path.as_str();
        let manifest = hashchain::loader_manifest(self.prelude.get(minified), refs);
        let loader = hashchain::build_loader_script(entry_path, &manifest, minified, host)?;
        let artifact = Artifact::immutable(
            pkg_bucket,
            naming::script_name(entry_path, &loader.hash.to_hex()),
            loader.content,
            MIME_JS,
        );
        store.submit(UploadJob::counted(artifact)).await?;

        sink.send(Building::message("Index"));
        let entry = hashchain::build_entry_document(&template, entry_path, &loader.hash, host)?;
        let index_bucket = self.config.index_bucket.as_str();
        match mode {
            AddressMode::Hash => {
                for name in naming::hash_document_names(&entry.hash.to_hex()) {
                    let artifact =
                        Artifact::immutable(index_bucket, name, entry.content.clone(), MIME_HTML);
                    store.submit(UploadJob::counted(artifact)).await?;
                }
            }
            AddressMode::Path => {
                for name in naming::path_document_names(entry_path, minified) {
                    let artifact =
                        Artifact::mutable(index_bucket, name, entry.content.clone(), MIME_HTML);
                    store.submit(UploadJob::new(artifact)).await?;
                }
            }
        }

        info!(
            path,
            variant = variant.label(),
            loader = %loader.hash,
            entry = %entry.hash,
            "variant built"
        );
        Ok(DeployOutput {
            output,
            loader_hash: loader.hash,
            entry_hash: entry.hash,
        })
    }
}
