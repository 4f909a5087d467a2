//! Two-phase bundling of one file: build once, generate once per output.

use std::sync::Arc;

use futures::future::join_all;

use crate::Error;
use crate::cache::GraphCache;
use crate::engine::{BuildRequest, BundleEngine, EngineError};
use crate::failure::Failure;
use crate::file::FileRecord;
use crate::materialize::Materializer;
use crate::merge::merge_output_options;
use crate::options::{BuildOptions, OutputOptions};

/// Result of a successful orchestration.
#[derive(Debug, Default)]
pub struct Bundled {
    /// New records created for additional outputs, in output-spec order.
    pub emitted: Vec<FileRecord>,
    /// Whether the build received a cached graph.
    pub cache_hit: bool,
}

/// Drives the engine for one file.
pub struct BundleOrchestrator {
    engine: Arc<dyn BundleEngine>,
    cache: Arc<GraphCache>,
}

impl BundleOrchestrator {
    pub fn new(engine: Arc<dyn BundleEngine>, cache: Arc<GraphCache>) -> Self {
        Self { engine, cache }
    }

    /// Build `input`, then render every output spec concurrently.
    ///
    /// Outputs are only applied once all generate calls have succeeded, so a
    /// failure leaves `file` as it was after entry resolution.
    pub async fn run(
        &self,
        file: &mut FileRecord,
        input: &str,
        build: &BuildOptions,
        outputs: &[OutputOptions],
    ) -> Result<Bundled, Failure> {
        let checkout = build.cache.then(|| self.cache.checkout(input));
        let ticket = checkout.as_ref().map(|c| c.ticket.clone());
        let cached = checkout.and_then(|c| c.cached);
        let cache_hit = cached.is_some();

        tracing::debug!(
            engine = self.engine.name(),
            input,
            cache_enabled = build.cache,
            cache_hit,
            "building module graph"
        );

        let request = BuildRequest {
            input: input.to_string(),
            cwd: file.cwd.clone(),
            cache: cached,
            output: build.output.clone(),
            extra: build.extra.clone(),
        };

        let graph = match self.engine.build(request).await {
            Ok(graph) => graph,
            Err(source) => {
                return Err(Failure::new(
                    ticket,
                    Error::Build {
                        input: input.to_string(),
                        source,
                    },
                ));
            }
        };

        if let Some(ticket) = &ticket {
            self.cache.store(ticket, Arc::clone(&graph));
        }

        let materializer = Materializer::for_file(file, outputs.len());
        let module_name = file.stem();
        let merged: Vec<OutputOptions> = outputs
            .iter()
            .map(|spec| {
                merge_output_options(spec, &build.output, &module_name, materializer.source_maps())
            })
            .collect();

        let results = join_all(merged.iter().enumerate().map(|(index, options)| {
            let graph = Arc::clone(&graph);
            async move {
                tracing::debug!(input, index, format = ?options.format, "generating output");
                graph.generate(options).await
            }
        }))
        .await;

        let mut chunks = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            let source = match result.map(|output| output.into_primary()) {
                Ok(Some(chunk)) => {
                    chunks.push(chunk);
                    continue;
                }
                Ok(None) => EngineError::new("engine produced no output chunk"),
                Err(source) => source,
            };
            return Err(Failure::new(
                ticket,
                Error::Generate {
                    input: input.to_string(),
                    index,
                    source,
                },
            ));
        }

        let mut emitted = Vec::new();
        for (index, (spec, chunk)) in merged.iter().zip(chunks).enumerate() {
            if let Some(record) = materializer.materialize(file, spec, index, chunk) {
                emitted.push(record);
            }
        }

        tracing::info!(
            input,
            outputs = outputs.len(),
            emitted = emitted.len(),
            cache_hit,
            path = %file.path.display(),
            "bundled"
        );

        Ok(Bundled { emitted, cache_hit })
    }
}
