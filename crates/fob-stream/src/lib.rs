#![cfg_attr(docsrs, feature(doc_cfg))]

//! # fob-stream
//!
//! Per-file bundling for streaming build pipelines.
//!
//! Files flow through a pipeline as discrete [`FileRecord`]s. For each file,
//! this crate builds a module graph with a two-phase [`BundleEngine`] using
//! the file as entry, renders the graph once per output spec, and turns the
//! results into records: the incoming record is rewritten, and additional
//! outputs are emitted as new records next to it.
//!
//! Graphs are kept in a [`GraphCache`] keyed by entry identifier, so
//! rebuilding the same entry (watch mode) lets the engine work
//! incrementally. Build and generate failures never stop the stream: they
//! are reported through [`BundleTransform::errors`] and the record passes on.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use fob_stream::{BundleEngine, FileRecord, TransformConfig, bundle_with};
//!
//! # async fn run(engine: Arc<dyn BundleEngine>) -> fob_stream::Result<()> {
//! // Bundle each incoming file as UMD; `name` and `amd.id` default to the
//! // file's base name.
//! let transform = bundle_with(TransformConfig::new(engine), "umd", None);
//!
//! let file = FileRecord::new("/proj", "/proj/src", "/proj/src/main.js", "import './dep.js';");
//! let output = transform.transform(file).await?;
//! assert_eq!(output.file.path.to_str(), Some("/proj/src/main.js"));
//! # Ok(()) }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod failure;
pub mod file;
pub mod materialize;
pub mod merge;
pub mod options;
pub mod orchestrator;
pub mod sourcemap;
pub mod transform;

#[cfg(feature = "rolldown")]
#[cfg_attr(docsrs, doc(cfg(feature = "rolldown")))]
pub mod rolldown;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use cache::{BuildTicket, Checkout, GraphCache};
pub use config::{ConfigDiscovery, ConfigError, StreamConfig};
pub use engine::{
    BuildRequest, BundleEngine, EngineError, EngineResult, GenerateOutput, GraphHandle,
    OutputChunk, SharedGraph,
};
pub use failure::{
    ErrorReceiver, ErrorReporter, Failure, FailureChannel, FailureKind, PLUGIN_NAME,
    PipelineError,
};
pub use file::{Contents, FileRecord, FileStat};
pub use materialize::{Materializer, OutputTarget};
pub use merge::{INHERITED_FIELDS, merge_output_options};
pub use options::{
    AmdOptions, BuildOptions, ExportMode, Indent, Interop, OptionsArg, OutputFormat,
    OutputOptions, OutputSpecArg, PathTransform, ResolvedOptions, resolve_entry,
    resolve_options,
};
pub use orchestrator::{BundleOrchestrator, Bundled};
pub use sourcemap::{SourceMap, apply_source_map, relative_path};
pub use transform::{BundleTransform, TransformConfig, TransformOutput, bundle, bundle_with};

#[cfg(feature = "rolldown")]
#[cfg_attr(docsrs, doc(cfg(feature = "rolldown")))]
pub use rolldown::RolldownEngine;

use std::path::PathBuf;

/// Error types for fob-stream operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The record's contents are a stream.
    #[error("Streaming not supported: {}", path.display())]
    StreamingNotSupported { path: PathBuf },

    /// The engine failed to build the module graph.
    #[error("Build failed for '{input}': {source}")]
    Build {
        input: String,
        #[source]
        source: EngineError,
    },

    /// The engine failed to render one output.
    #[error("Generating output #{index} for '{input}' failed: {source}")]
    Generate {
        input: String,
        index: usize,
        #[source]
        source: EngineError,
    },

    /// Neither the transform nor its build options provide an engine.
    #[error("No bundling engine configured")]
    MissingEngine,
}

/// Result type alias for fob-stream operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::StreamingNotSupported { .. } => "STREAMING_NOT_SUPPORTED",
            Error::Build { .. } => "BUILD_FAILURE",
            Error::Generate { .. } => "GENERATE_FAILURE",
            Error::MissingEngine => "MISSING_ENGINE",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::StreamingNotSupported { .. } => Some(Box::new(
                "Read files into memory before bundling (disable streaming in the source step).",
            )),
            Error::Build { input, .. } => Some(Box::new(format!(
                "Check that '{}' exists relative to the pipeline's working directory and that all of its imports resolve.",
                input
            ))),
            Error::Generate { index, .. } => Some(Box::new(format!(
                "Check output spec #{} (format, name, globals) for options the engine rejects.",
                index
            ))),
            Error::MissingEngine => Some(Box::new(
                "Pass an engine with TransformConfig::new(), set BuildOptions::engine, or enable the `rolldown` feature.",
            )),
        }
    }
}
