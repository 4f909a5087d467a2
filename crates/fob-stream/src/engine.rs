//! Contract with the external bundling engine.
//!
//! The engine works in two phases. `build` resolves the module graph from an
//! entry and returns an opaque [`GraphHandle`]; `generate` renders that graph
//! under one set of output options. A handle is immutable once built, so any
//! number of `generate` calls may run against it at the same time.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::options::OutputOptions;
use crate::sourcemap::SourceMap;

/// Shared, engine-owned module graph.
pub type SharedGraph = Arc<dyn GraphHandle>;

/// Result type for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failure reported by the engine.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it as the source.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Everything the build phase receives.
#[derive(Clone)]
pub struct BuildRequest {
    /// Entry identifier, relative to the pipeline's `cwd`.
    pub input: String,
    /// Working directory the entry is relative to.
    pub cwd: PathBuf,
    /// Handle from a previous build of the same entry, for incremental reuse.
    pub cache: Option<SharedGraph>,
    /// Output fields set at build level.
    pub output: OutputOptions,
    /// Engine-specific build settings.
    pub extra: Map<String, Value>,
}

impl fmt::Debug for BuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildRequest")
            .field("input", &self.input)
            .field("cwd", &self.cwd)
            .field("cache", &self.cache.is_some())
            .field("output", &self.output)
            .field("extra", &self.extra)
            .finish()
    }
}

/// One rendered artifact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputChunk {
    /// File name the engine chose for the chunk, if any.
    pub file_name: Option<String>,
    pub code: String,
    /// Present when source maps were requested.
    pub map: Option<SourceMap>,
}

/// Result of the generate phase. Only the first chunk is materialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOutput {
    pub output: Vec<OutputChunk>,
}

impl GenerateOutput {
    pub fn single(chunk: OutputChunk) -> Self {
        Self {
            output: vec![chunk],
        }
    }

    /// The entry chunk.
    pub fn into_primary(self) -> Option<OutputChunk> {
        self.output.into_iter().next()
    }
}

/// The build phase.
#[async_trait]
pub trait BundleEngine: Send + Sync {
    /// Resolve the module graph for `request.input`.
    async fn build(&self, request: BuildRequest) -> EngineResult<SharedGraph>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "engine"
    }
}

/// A resolved, not yet rendered module graph.
#[async_trait]
pub trait GraphHandle: Send + Sync {
    /// Render the graph with fully merged output options.
    async fn generate(&self, options: &OutputOptions) -> EngineResult<GenerateOutput>;
}
