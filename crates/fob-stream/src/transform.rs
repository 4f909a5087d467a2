//! The transform unit inserted into a pipeline.
//!
//! ```no_run
//! use std::sync::Arc;
//! use fob_stream::{BuildOptions, BundleEngine, OutputOptions, TransformConfig, bundle_with};
//!
//! # async fn run(engine: Arc<dyn BundleEngine>, files: Vec<fob_stream::FileRecord>) {
//! use futures::StreamExt;
//!
//! let transform = bundle_with(
//!     TransformConfig::new(engine),
//!     BuildOptions::new().set("external", vec!["react"]),
//!     Some(vec![
//!         OutputOptions::new("cjs").with_file("app.cjs.js"),
//!         OutputOptions::new("es").with_file("app.esm.js"),
//!     ]
//!     .into()),
//! );
//!
//! let records: Vec<_> = transform.pipe(futures::stream::iter(files)).collect().await;
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;

use crate::cache::GraphCache;
use crate::engine::BundleEngine;
use crate::failure::{ErrorReceiver, ErrorReporter, Failure, FailureChannel};
use crate::file::FileRecord;
use crate::options::{
    BuildOptions, OptionsArg, OutputOptions, OutputSpecArg, resolve_entry, resolve_options,
};
use crate::orchestrator::BundleOrchestrator;
use crate::{Error, Result};

/// Construction-time settings of a transform.
#[derive(Clone)]
pub struct TransformConfig {
    /// Engine used unless build options name another one.
    pub engine: Option<Arc<dyn BundleEngine>>,
    /// Graph cache (default: the process-wide cache).
    pub cache: Arc<GraphCache>,
    /// How many files [`BundleTransform::pipe`] processes at once.
    pub concurrency: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            cache: GraphCache::global(),
            concurrency: 1,
        }
    }
}

#[cfg(feature = "rolldown")]
fn default_engine() -> Option<Arc<dyn BundleEngine>> {
    Some(Arc::new(crate::rolldown::RolldownEngine::new()))
}

#[cfg(not(feature = "rolldown"))]
fn default_engine() -> Option<Arc<dyn BundleEngine>> {
    None
}

impl fmt::Debug for TransformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformConfig")
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field("cache", &self.cache)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl TransformConfig {
    pub fn new(engine: Arc<dyn BundleEngine>) -> Self {
        Self {
            engine: Some(engine),
            ..Default::default()
        }
    }

    pub fn cache(mut self, cache: Arc<GraphCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// What one incoming record turns into.
#[derive(Debug)]
pub struct TransformOutput {
    /// The incoming record, possibly rewritten.
    pub file: FileRecord,
    /// Additional records for extra outputs.
    pub emitted: Vec<FileRecord>,
}

impl TransformOutput {
    pub fn passthrough(file: FileRecord) -> Self {
        Self {
            file,
            emitted: Vec::new(),
        }
    }

    /// Records in emission order: additional outputs first, then the
    /// incoming record.
    pub fn into_records(self) -> Vec<FileRecord> {
        let mut records = self.emitted;
        records.push(self.file);
        records
    }
}

/// Bundles every file that passes through it.
pub struct BundleTransform {
    build: BuildOptions,
    outputs: Vec<OutputOptions>,
    config: TransformConfig,
    failures: FailureChannel,
    errors: Mutex<Option<ErrorReceiver>>,
}

impl fmt::Debug for BundleTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleTransform")
            .field("build", &self.build)
            .field("outputs", &self.outputs)
            .field("config", &self.config)
            .finish()
    }
}

/// Create a transform with the default configuration.
///
/// With `arg2`, `arg1` is build options and `arg2` the output spec.
/// Without it, `arg1` is the output spec.
pub fn bundle(arg1: impl Into<OptionsArg>, arg2: Option<OutputSpecArg>) -> BundleTransform {
    bundle_with(TransformConfig::default(), arg1, arg2)
}

/// Create a transform with an explicit configuration.
pub fn bundle_with(
    config: TransformConfig,
    arg1: impl Into<OptionsArg>,
    arg2: Option<OutputSpecArg>,
) -> BundleTransform {
    let resolved = resolve_options(arg1.into(), arg2);
    BundleTransform::new(resolved.build, resolved.outputs, config)
}

impl BundleTransform {
    pub fn new(build: BuildOptions, outputs: Vec<OutputOptions>, config: TransformConfig) -> Self {
        let (reporter, errors) = ErrorReporter::channel();
        let failures = FailureChannel::new(Arc::clone(&config.cache), reporter);
        Self {
            build,
            outputs,
            config,
            failures,
            errors: Mutex::new(Some(errors)),
        }
    }

    pub fn build_options(&self) -> &BuildOptions {
        &self.build
    }

    pub fn outputs(&self) -> &[OutputOptions] {
        &self.outputs
    }

    /// Take the receiver of pipeline errors. Only the first call gets it.
    pub fn errors(&self) -> Option<ErrorReceiver> {
        self.errors.lock().take()
    }

    /// Process one record.
    ///
    /// Null records pass through untouched. Streamed records are rejected
    /// with [`Error::StreamingNotSupported`]. Build and generate failures are
    /// reported through [`errors`](Self::errors) and the record is passed on
    /// as it came in.
    pub async fn transform(&self, file: FileRecord) -> Result<TransformOutput> {
        if file.is_null() {
            return Ok(TransformOutput::passthrough(file));
        }

        if file.is_stream() {
            return Err(Error::StreamingNotSupported { path: file.path });
        }

        let original = file.clone();
        let mut file = file;
        let input = resolve_entry(&mut file, &self.build);

        let Some(engine) = self.engine() else {
            self.failures.handle(Failure::new(None, Error::MissingEngine));
            return Ok(TransformOutput::passthrough(original));
        };

        let orchestrator = BundleOrchestrator::new(engine, Arc::clone(&self.config.cache));
        match orchestrator
            .run(&mut file, &input, &self.build, &self.outputs)
            .await
        {
            Ok(bundled) => Ok(TransformOutput {
                file,
                emitted: bundled.emitted,
            }),
            Err(failure) => {
                self.failures.handle(failure);
                Ok(TransformOutput::passthrough(original))
            }
        }
    }

    /// Run every record of `input` through the transform.
    ///
    /// Up to `concurrency` files are processed at once; records come out in
    /// input order.
    pub fn pipe<'a, S>(&'a self, input: S) -> impl Stream<Item = Result<FileRecord>> + 'a
    where
        S: Stream<Item = FileRecord> + 'a,
    {
        input
            .map(move |file| self.transform(file))
            .buffered(self.config.concurrency.max(1))
            .flat_map(|result| {
                let items: Vec<Result<FileRecord>> = match result {
                    Ok(output) => output.into_records().into_iter().map(Ok).collect(),
                    Err(error) => vec![Err(error)],
                };
                stream::iter(items)
            })
    }

    fn engine(&self) -> Option<Arc<dyn BundleEngine>> {
        self.build
            .engine
            .clone()
            .or_else(|| self.config.engine.clone())
    }
}
