//! Failure channel.
//!
//! A failed build or generate never stops the stream. The cache entry of the
//! failing identifier is cleared, and the error is handed to the pipeline
//! through a channel so it is observed outside the call stack that was
//! processing the record.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::Error;
use crate::cache::{BuildTicket, GraphCache};

/// Identity attached to every pipeline-level error.
pub const PLUGIN_NAME: &str = "fob-stream";

/// Taxonomy of per-file failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Streamed contents. Reported directly, the record is dropped.
    UnsupportedInput,
    BuildFailure,
    GenerateFailure,
    /// The transform was set up without an engine.
    Configuration,
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::StreamingNotSupported { .. } => FailureKind::UnsupportedInput,
            Error::Build { .. } => FailureKind::BuildFailure,
            Error::Generate { .. } => FailureKind::GenerateFailure,
            Error::MissingEngine => FailureKind::Configuration,
        }
    }
}

/// An error as reported to the surrounding pipeline.
#[derive(Debug, thiserror::Error)]
#[error("[{plugin}] {error}")]
pub struct PipelineError {
    pub plugin: &'static str,
    #[source]
    pub error: Error,
}

impl PipelineError {
    pub fn new(error: Error) -> Self {
        Self {
            plugin: PLUGIN_NAME,
            error,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

/// Receiving end of reported errors.
pub type ErrorReceiver = mpsc::UnboundedReceiver<PipelineError>;

/// Sending end of reported errors.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    tx: mpsc::UnboundedSender<PipelineError>,
}

impl ErrorReporter {
    pub fn channel() -> (Self, ErrorReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `error` for the pipeline. Never blocks.
    pub fn report(&self, error: Error) {
        tracing::error!(plugin = PLUGIN_NAME, kind = ?error.kind(), "{}", error);
        if self.tx.send(PipelineError::new(error)).is_err() {
            tracing::debug!("no listener for pipeline errors");
        }
    }
}

/// A failed orchestration, before it is reported.
#[derive(Debug)]
pub struct Failure {
    /// Ticket of the build, when caching was enabled for it.
    pub ticket: Option<BuildTicket>,
    pub error: Error,
}

impl Failure {
    pub fn new(ticket: Option<BuildTicket>, error: Error) -> Self {
        Self { ticket, error }
    }
}

/// Invalidates cache entries and reports failures.
#[derive(Debug, Clone)]
pub struct FailureChannel {
    cache: Arc<GraphCache>,
    reporter: ErrorReporter,
}

impl FailureChannel {
    pub fn new(cache: Arc<GraphCache>, reporter: ErrorReporter) -> Self {
        Self { cache, reporter }
    }

    pub fn handle(&self, failure: Failure) {
        if let Some(ticket) = &failure.ticket {
            self.cache.invalidate_build(ticket);
        }
        self.reporter.report(failure.error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;

    #[test]
    fn test_kinds() {
        let build = Error::Build {
            input: "a.js".to_string(),
            source: EngineError::new("boom"),
        };
        assert_eq!(build.kind(), FailureKind::BuildFailure);
        assert_eq!(Error::MissingEngine.kind(), FailureKind::Configuration);
    }

    #[tokio::test]
    async fn test_report_is_delivered_through_channel() {
        let (reporter, mut rx) = ErrorReporter::channel();
        reporter.report(Error::MissingEngine);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.plugin, PLUGIN_NAME);
        assert_eq!(received.kind(), FailureKind::Configuration);
        assert!(received.to_string().starts_with("[fob-stream]"));
    }

    #[test]
    fn test_report_without_listener_does_not_panic() {
        let (reporter, rx) = ErrorReporter::channel();
        drop(rx);
        reporter.report(Error::MissingEngine);
    }

    #[test]
    fn test_handle_invalidates_ticketed_entry() {
        let cache = Arc::new(GraphCache::new());
        let (reporter, _rx) = ErrorReporter::channel();
        let channel = FailureChannel::new(Arc::clone(&cache), reporter);

        let first = cache.checkout("a.js");
        cache.store(&first.ticket, crate::testing::noop_graph());
        let second = cache.checkout("a.js");

        channel.handle(Failure::new(Some(second.ticket), Error::MissingEngine));
        assert!(!cache.contains("a.js"));
    }
}
