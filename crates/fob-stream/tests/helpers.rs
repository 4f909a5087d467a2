//! Shared test utilities for fob-stream tests
//!
//! Provides a scripted in-memory engine that records every call it receives,
//! so tests can assert on what the transform asked for without bundling real
//! code.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fob_stream::{
    BuildRequest, BundleEngine, EngineError, EngineResult, FileRecord, GenerateOutput,
    GraphCache, GraphHandle, OutputChunk, OutputOptions, SharedGraph, SourceMap,
};
use parking_lot::Mutex;

/// A build call as the engine saw it.
#[derive(Debug, Clone)]
pub struct RecordedBuild {
    pub input: String,
    pub cwd: PathBuf,
    /// Whether a cached graph was passed in.
    pub cached: bool,
}

/// A generate call as the engine saw it.
#[derive(Debug, Clone)]
pub struct RecordedGenerate {
    pub input: String,
    pub options: OutputOptions,
}

#[derive(Default)]
struct Script {
    builds: Vec<RecordedBuild>,
    generates: Vec<RecordedGenerate>,
    failing_builds: HashSet<String>,
    failing_formats: HashSet<String>,
    empty_formats: HashSet<String>,
    delays: HashMap<String, Duration>,
}

/// Engine whose behaviour is scripted per entry and per format.
///
/// Generated code has the shape `/* <format>:<name> */ <input>`.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Arc<dyn BundleEngine> {
        Arc::new(self.clone())
    }

    /// Make every build of `input` fail.
    pub fn fail_build(&self, input: &str) {
        self.script.lock().failing_builds.insert(input.to_string());
    }

    /// Stop failing builds of `input`.
    pub fn heal_build(&self, input: &str) {
        self.script.lock().failing_builds.remove(input);
    }

    /// Make every generate with `format` fail.
    pub fn fail_format(&self, format: &str) {
        self.script.lock().failing_formats.insert(format.to_string());
    }

    /// Make every generate with `format` succeed without any chunk.
    pub fn empty_format(&self, format: &str) {
        self.script.lock().empty_formats.insert(format.to_string());
    }

    /// Delay builds of `input`.
    pub fn delay(&self, input: &str, millis: u64) {
        self.script
            .lock()
            .delays
            .insert(input.to_string(), Duration::from_millis(millis));
    }

    pub fn builds(&self) -> Vec<RecordedBuild> {
        self.script.lock().builds.clone()
    }

    pub fn generates(&self) -> Vec<RecordedGenerate> {
        self.script.lock().generates.clone()
    }
}

#[async_trait]
impl BundleEngine for ScriptedEngine {
    async fn build(&self, request: BuildRequest) -> EngineResult<SharedGraph> {
        let (delay, fails) = {
            let mut script = self.script.lock();
            script.builds.push(RecordedBuild {
                input: request.input.clone(),
                cwd: request.cwd.clone(),
                cached: request.cache.is_some(),
            });
            (
                script.delays.get(&request.input).copied(),
                script.failing_builds.contains(&request.input),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fails {
            return Err(EngineError::new(format!(
                "Could not resolve entry module ({})",
                request.input
            )));
        }

        Ok(Arc::new(ScriptedGraph {
            input: request.input,
            cwd: request.cwd,
            script: Arc::clone(&self.script),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedGraph {
    input: String,
    cwd: PathBuf,
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl GraphHandle for ScriptedGraph {
    async fn generate(&self, options: &OutputOptions) -> EngineResult<GenerateOutput> {
        let format = options
            .format
            .as_ref()
            .map(|f| f.as_str().to_string())
            .unwrap_or_else(|| "es".to_string());

        {
            let mut script = self.script.lock();
            script.generates.push(RecordedGenerate {
                input: self.input.clone(),
                options: options.clone(),
            });
            if script.failing_formats.contains(&format) {
                return Err(EngineError::new(format!(
                    "You must supply output.name for {} bundles",
                    format
                )));
            }
            if script.empty_formats.contains(&format) {
                return Ok(GenerateOutput::default());
            }
        }

        let name = options.name.clone().unwrap_or_default();
        let map = (options.sourcemap == Some(true)).then(|| SourceMap {
            version: 3,
            file: Some(self.cwd.join(&self.input).to_string_lossy().into_owned()),
            sources: vec![
                self.cwd.join(&self.input).to_string_lossy().into_owned(),
                "src/dep.js".to_string(),
            ],
            mappings: "AAAA".to_string(),
            ..Default::default()
        });

        Ok(GenerateOutput::single(OutputChunk {
            file_name: None,
            code: format!("/* {}:{} */ {}", format, name, self.input),
            map,
        }))
    }
}

/// A buffered record at `/proj/<relative>` with base `/proj/src`.
pub fn source_file(relative: &str) -> FileRecord {
    FileRecord::new(
        "/proj",
        "/proj/src",
        PathBuf::from("/proj").join(relative),
        format!("// {}", relative),
    )
}

/// A fresh cache so tests do not share state through the global one.
pub fn isolated_cache() -> Arc<GraphCache> {
    Arc::new(GraphCache::new())
}
