//! [`BundleEngine`] backed by Rolldown.
//!
//! Rolldown resolves and renders in a single `generate` call, so the build
//! phase only validates the options and captures what `generate` needs. A
//! cached handle for the same entry is accepted but not consulted.
//!
//! Output options Rolldown has no counterpart for are reported with a
//! warning, never dropped silently. `banner`, `footer` and
//! `sourcemapExcludeSources` are applied to the rendered chunk here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use path_clean::PathClean;
use rolldown::{
    BundlerBuilder, BundlerOptions, GlobalsOutputOption, InputItem, IsExternal,
    OutputFormat as RolldownFormat, SourceMapType,
};
use rolldown_common::Output;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::engine::{
    BuildRequest, BundleEngine, EngineError, EngineResult, GenerateOutput, GraphHandle,
    OutputChunk, SharedGraph,
};
use crate::options::{OutputFormat, OutputOptions};
use crate::sourcemap::SourceMap;

/// Build settings the adapter forwards to Rolldown.
const SUPPORTED_BUILD_SETTINGS: &[&str] = &["external"];

/// Engine that bundles with Rolldown.
#[derive(Debug, Clone, Default)]
pub struct RolldownEngine;

impl RolldownEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BundleEngine for RolldownEngine {
    async fn build(&self, request: BuildRequest) -> EngineResult<SharedGraph> {
        if request.cache.is_some() {
            tracing::debug!(input = %request.input, "rolldown rebuilds from scratch");
        }

        let ignored: Vec<&str> = request
            .extra
            .keys()
            .map(String::as_str)
            .filter(|key| !SUPPORTED_BUILD_SETTINGS.contains(key))
            .collect();
        if !ignored.is_empty() {
            tracing::warn!(
                input = %request.input,
                settings = ?ignored,
                "build settings not supported by rolldown are ignored"
            );
        }

        let graph = RolldownGraph {
            input: request.input,
            cwd: request.cwd,
            external: external_from(&request.extra)?,
        };

        // Surface invalid build settings now rather than on every generate.
        BundlerBuilder::default()
            .with_options(graph.options(&request.output, RolldownFormat::Esm))
            .build()
            .map_err(|e| RolldownDiagnostics::from_rolldown("build", &e).into_engine_error())?;

        Ok(Arc::new(graph))
    }

    fn name(&self) -> &str {
        "rolldown"
    }
}

struct RolldownGraph {
    input: String,
    cwd: PathBuf,
    external: Option<Vec<String>>,
}

impl RolldownGraph {
    fn options(&self, output: &OutputOptions, format: RolldownFormat) -> BundlerOptions {
        let mut options = BundlerOptions {
            input: Some(vec![InputItem {
                name: None,
                import: self.input.clone(),
            }]),
            cwd: Some(self.cwd.clone()),
            // Map sources come out relative to `dir`; anchoring it at `cwd`
            // lets them be resolved without guessing Rolldown's default.
            dir: Some(self.cwd.to_string_lossy().into_owned()),
            format: Some(format),
            sourcemap: output.sourcemap.unwrap_or(false).then_some(SourceMapType::File),
            name: output.name.clone(),
            ..Default::default()
        };

        if let Some(external) = &self.external {
            options.external = Some(IsExternal::from(external.clone()));
        }

        if let Some(globals) = output.globals.as_ref().filter(|g| !g.is_empty()) {
            let globals: FxHashMap<String, String> =
                globals.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            options.globals = Some(GlobalsOutputOption::from(globals));
        }

        options
    }
}

#[async_trait]
impl GraphHandle for RolldownGraph {
    async fn generate(&self, options: &OutputOptions) -> EngineResult<GenerateOutput> {
        let format = options
            .format
            .as_ref()
            .map(format_to_rolldown)
            .transpose()?
            .unwrap_or(RolldownFormat::Esm);

        let ignored = unsupported_output_fields(options);
        if !ignored.is_empty() {
            tracing::warn!(
                input = %self.input,
                options = ?ignored,
                "output options not supported by rolldown are ignored"
            );
        }

        let mut bundler = BundlerBuilder::default()
            .with_options(self.options(options, format))
            .build()
            .map_err(|e| RolldownDiagnostics::from_rolldown("build", &e).into_engine_error())?;

        let bundle = bundler
            .generate()
            .await
            .map_err(|e| RolldownDiagnostics::from_rolldown("generate", &e).into_engine_error())?;

        let mut chunks = Vec::new();
        for asset in bundle.assets {
            if let Output::Chunk(chunk) = asset {
                let map = match chunk.map.as_ref() {
                    Some(map) => {
                        let mut map = SourceMap::from_json(&map.to_json_string())
                            .map_err(|e| EngineError::with_source("invalid source map", e))?;
                        absolutize_sources(&mut map, &self.cwd);
                        if options.sourcemap_exclude_sources == Some(true) {
                            map.sources_content = None;
                        }
                        Some(map)
                    }
                    None => None,
                };
                let mut converted = OutputChunk {
                    file_name: Some(chunk.filename.to_string()),
                    code: chunk.code.clone(),
                    map,
                };
                wrap_addons(
                    &mut converted,
                    options.banner.as_deref(),
                    options.footer.as_deref(),
                );
                // Entry chunk first.
                if chunk.is_entry {
                    chunks.insert(0, converted);
                } else {
                    chunks.push(converted);
                }
            }
        }

        Ok(GenerateOutput { output: chunks })
    }
}

fn format_to_rolldown(format: &OutputFormat) -> EngineResult<RolldownFormat> {
    match format {
        OutputFormat::Es => Ok(RolldownFormat::Esm),
        OutputFormat::Cjs => Ok(RolldownFormat::Cjs),
        OutputFormat::Iife => Ok(RolldownFormat::Iife),
        OutputFormat::Umd => Ok(RolldownFormat::Umd),
        other => Err(EngineError::new(format!(
            "rolldown does not support the '{}' output format",
            other.as_str()
        ))),
    }
}

fn external_from(extra: &Map<String, Value>) -> EngineResult<Option<Vec<String>>> {
    match extra.get("external") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| EngineError::new("'external' entries must be strings"))
            })
            .collect::<EngineResult<Vec<_>>>()
            .map(Some),
        Some(_) => Err(EngineError::new(
            "'external' must be a string or a list of strings",
        )),
    }
}

/// Set output fields the adapter cannot pass to Rolldown.
///
/// `dir`, `file` and `sourcemapFile` only matter for writing, which the
/// pipeline does. `amd.id` is always filled in by merging and is only
/// reported for the AMD-specific `define` and extra fields.
fn unsupported_output_fields(options: &OutputOptions) -> Vec<&'static str> {
    let checks = [
        ("assetFileNames", options.asset_file_names.is_some()),
        ("chunkFileNames", options.chunk_file_names.is_some()),
        ("compact", options.compact.is_some()),
        ("entryFileNames", options.entry_file_names.is_some()),
        ("esModule", options.es_module.is_some()),
        ("exports", options.exports.is_some()),
        ("extend", options.extend.is_some()),
        ("freeze", options.freeze.is_some()),
        ("indent", options.indent.is_some()),
        ("interop", options.interop.is_some()),
        ("intro", options.intro.is_some()),
        ("namespaceToStringTag", options.namespace_to_string_tag.is_some()),
        ("noConflict", options.no_conflict.is_some()),
        ("outro", options.outro.is_some()),
        ("paths", options.paths.is_some()),
        ("preferConst", options.prefer_const.is_some()),
        ("sourcemapPathTransform", options.sourcemap_path_transform.is_some()),
        ("strict", options.strict.is_some()),
        (
            "amd",
            options
                .amd
                .as_ref()
                .is_some_and(|amd| amd.define.is_some() || !amd.extra.is_empty()),
        ),
    ];
    checks
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
}

/// Resolve relative map sources against `base`.
fn absolutize_sources(map: &mut SourceMap, base: &Path) {
    for source in map.sources.iter_mut() {
        let path = Path::new(source.as_str());
        if path.is_relative() {
            *source = base.join(path).clean().to_string_lossy().into_owned();
        }
    }
}

/// Prepend `banner` and append `footer` as lines of their own.
///
/// The map gets one empty line group per inserted line so existing
/// mappings keep pointing at the right generated lines.
fn wrap_addons(chunk: &mut OutputChunk, banner: Option<&str>, footer: Option<&str>) {
    if let Some(banner) = banner.filter(|b| !b.is_empty()) {
        chunk.code = format!("{}\n{}", banner, chunk.code);
        if let Some(map) = chunk.map.as_mut() {
            let lines = banner.matches('\n').count() + 1;
            map.mappings = format!("{}{}", ";".repeat(lines), map.mappings);
        }
    }
    if let Some(footer) = footer.filter(|f| !f.is_empty()) {
        if !chunk.code.ends_with('\n') {
            chunk.code.push('\n');
        }
        chunk.code.push_str(footer);
    }
}

/// Diagnostics reported by Rolldown, one entry per problem.
#[derive(Debug, thiserror::Error)]
#[error("rolldown {phase} failed: {}", .diagnostics.join("; "))]
pub struct RolldownDiagnostics {
    pub phase: &'static str,
    pub diagnostics: Vec<String>,
}

impl RolldownDiagnostics {
    /// Split a batched Rolldown error into its individual diagnostics.
    ///
    /// Rolldown's batch type exposes no stable accessor, so the split works
    /// on its debug rendering.
    fn from_rolldown(phase: &'static str, error: &dyn std::fmt::Debug) -> Self {
        let rendered = format!("{:?}", error);
        let mut diagnostics: Vec<String> = rendered
            .split("BuildDiagnostic")
            .map(|part| {
                part.trim_matches(|c: char| {
                    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | ',')
                })
            })
            .filter(|part| !part.is_empty() && *part != "Batched")
            .map(str::to_string)
            .collect();
        if diagnostics.is_empty() {
            diagnostics.push(rendered);
        }
        Self { phase, diagnostics }
    }

    fn into_engine_error(self) -> EngineError {
        let message = match self.diagnostics.as_slice() {
            [only] => format!("rolldown {} failed: {}", self.phase, only),
            many => format!(
                "rolldown {} failed with {} diagnostics",
                self.phase,
                many.len()
            ),
        };
        EngineError::with_source(message, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{AmdOptions, ExportMode};
    use serde_json::json;

    #[test]
    fn test_format_mapping() {
        assert!(matches!(
            format_to_rolldown(&OutputFormat::Es),
            Ok(RolldownFormat::Esm)
        ));
        assert!(format_to_rolldown(&OutputFormat::System).is_err());
        assert!(format_to_rolldown(&OutputFormat::Other("xyz".into())).is_err());
    }

    #[test]
    fn test_external_from_extra() {
        let mut extra = Map::new();
        assert_eq!(external_from(&extra).unwrap(), None);

        extra.insert("external".into(), json!(["react", "vue"]));
        assert_eq!(
            external_from(&extra).unwrap(),
            Some(vec!["react".to_string(), "vue".to_string()])
        );

        extra.insert("external".into(), json!(42));
        assert!(external_from(&extra).is_err());
    }

    #[test]
    fn test_unsupported_fields_are_listed() {
        let mut options = OutputOptions::new("umd").with_name("main").with_amd_id("main");
        options.sourcemap = Some(true);
        options.banner = Some("/* b */".to_string());
        assert!(unsupported_output_fields(&options).is_empty());

        options.intro = Some("var x;".to_string());
        options.exports = Some(ExportMode::Named);
        options.amd = Some(AmdOptions {
            id: Some("main".to_string()),
            define: Some("req".to_string()),
            ..Default::default()
        });
        assert_eq!(
            unsupported_output_fields(&options),
            vec!["exports", "intro", "amd"]
        );
    }

    #[test]
    fn test_relative_sources_are_resolved_against_base() {
        let mut map = SourceMap {
            version: 3,
            sources: vec!["src/main.js".to_string(), "/abs/dep.js".to_string()],
            ..Default::default()
        };
        absolutize_sources(&mut map, Path::new("/proj"));
        assert_eq!(map.sources, vec!["/proj/src/main.js", "/abs/dep.js"]);
    }

    #[test]
    fn test_banner_and_footer_shift_mappings() {
        let mut chunk = OutputChunk {
            file_name: None,
            code: "code();".to_string(),
            map: Some(SourceMap {
                version: 3,
                mappings: "AAAA".to_string(),
                ..Default::default()
            }),
        };
        wrap_addons(&mut chunk, Some("/*!\n * lib\n */"), Some("/* end */"));

        assert_eq!(chunk.code, "/*!\n * lib\n */\ncode();\n/* end */");
        assert_eq!(chunk.map.unwrap().mappings, ";;;AAAA");
    }

    #[test]
    fn test_diagnostics_are_kept_apart() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct BuildDiagnostic(&'static str);

        let batch = vec![
            BuildDiagnostic("UnresolvedEntry ./missing.js"),
            BuildDiagnostic("MissingExport foo"),
        ];
        let diagnostics = RolldownDiagnostics::from_rolldown("generate", &batch);
        assert_eq!(diagnostics.diagnostics.len(), 2);
        assert!(diagnostics.diagnostics[0].contains("UnresolvedEntry"));

        let error = diagnostics.into_engine_error();
        assert_eq!(error.message, "rolldown generate failed with 2 diagnostics");
        assert!(std::error::Error::source(&error).is_some());
    }
}
