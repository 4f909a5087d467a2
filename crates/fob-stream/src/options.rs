//! Build and output options, and resolution of the factory call shapes.
//!
//! The transform accepts either an output spec alone, or build options
//! followed by an output spec. An output spec is a bare format string, one
//! set of output options, or an ordered list of them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::BundleEngine;
use crate::file::FileRecord;
use crate::sourcemap::relative_path;

/// Output module format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputFormat {
    Amd,
    Cjs,
    Es,
    Iife,
    Umd,
    System,
    /// A format this crate does not know about. Passed to the engine as-is.
    Other(String),
}

impl OutputFormat {
    pub fn as_str(&self) -> &str {
        match self {
            OutputFormat::Amd => "amd",
            OutputFormat::Cjs => "cjs",
            OutputFormat::Es => "es",
            OutputFormat::Iife => "iife",
            OutputFormat::Umd => "umd",
            OutputFormat::System => "system",
            OutputFormat::Other(s) => s,
        }
    }
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s {
            "amd" => OutputFormat::Amd,
            "cjs" | "commonjs" => OutputFormat::Cjs,
            "es" | "esm" | "module" => OutputFormat::Es,
            "iife" => OutputFormat::Iife,
            "umd" => OutputFormat::Umd,
            "system" | "systemjs" => OutputFormat::System,
            other => OutputFormat::Other(other.to_string()),
        }
    }
}

impl From<String> for OutputFormat {
    fn from(s: String) -> Self {
        OutputFormat::from(s.as_str())
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.as_str().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How default and namespace imports of externals are handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Interop {
    Enabled(bool),
    Mode(String),
}

/// Export mode of the generated bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    Auto,
    Default,
    Named,
    None,
}

/// Indentation of the generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Indent {
    Enabled(bool),
    With(String),
}

/// Rewrites each source path of a generated map.
///
/// Called with the relative source path and the path of the map file.
#[derive(Clone)]
pub struct PathTransform(pub Arc<dyn Fn(&str, &str) -> String + Send + Sync>);

impl PathTransform {
    pub fn new(f: impl Fn(&str, &str) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, source: &str, map_path: &str) -> String {
        (self.0)(source, map_path)
    }
}

impl fmt::Debug for PathTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PathTransform(..)")
    }
}

impl PartialEq for PathTransform {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// AMD-specific output options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AmdOptions {
    /// Module id of the AMD/UMD define call.
    pub id: Option<String>,
    /// Name of the function to use instead of `define`.
    pub define: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One output spec: the settings for rendering one artifact.
///
/// Every field is optional; unset fields are filled from build options by
/// [`merge_output_options`](crate::merge::merge_output_options).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputOptions {
    // core options
    pub dir: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub globals: Option<BTreeMap<String, String>>,
    pub name: Option<String>,

    // advanced options
    pub asset_file_names: Option<String>,
    pub banner: Option<String>,
    pub chunk_file_names: Option<String>,
    pub compact: Option<bool>,
    pub entry_file_names: Option<String>,
    pub extend: Option<bool>,
    pub footer: Option<String>,
    pub interop: Option<Interop>,
    pub intro: Option<String>,
    pub outro: Option<String>,
    pub paths: Option<BTreeMap<String, String>>,
    pub sourcemap: Option<bool>,
    pub sourcemap_exclude_sources: Option<bool>,
    pub sourcemap_file: Option<PathBuf>,
    #[serde(skip)]
    pub sourcemap_path_transform: Option<PathTransform>,

    // danger zone
    pub amd: Option<AmdOptions>,
    pub es_module: Option<bool>,
    pub exports: Option<ExportMode>,
    pub freeze: Option<bool>,
    pub indent: Option<Indent>,
    pub namespace_to_string_tag: Option<bool>,
    pub no_conflict: Option<bool>,
    pub prefer_const: Option<bool>,
    pub strict: Option<bool>,
}

impl OutputOptions {
    /// Output options with only the format set.
    pub fn new(format: impl Into<OutputFormat>) -> Self {
        Self {
            format: Some(format.into()),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_amd_id(mut self, id: impl Into<String>) -> Self {
        self.amd.get_or_insert_with(AmdOptions::default).id = Some(id.into());
        self
    }

    /// Module id of the AMD define call, if set.
    pub fn amd_id(&self) -> Option<&str> {
        self.amd.as_ref().and_then(|amd| amd.id.as_deref())
    }
}

fn default_cache() -> bool {
    true
}

/// Build-phase options.
///
/// Output fields given here act as defaults for every output spec.
/// Anything this crate does not model (plugins, externals, ...) lands in
/// `extra` and is forwarded to the engine untouched.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    /// Entry identifier. Derived from the file when unset; when set, the
    /// file is relocated to `cwd/input`.
    #[serde(default)]
    pub input: Option<String>,

    /// Reuse previously built graphs for the same entry (default: true).
    #[serde(default = "default_cache")]
    pub cache: bool,

    #[serde(flatten)]
    pub output: OutputOptions,

    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Alternate engine to use for this transform.
    #[serde(skip)]
    pub engine: Option<Arc<dyn BundleEngine>>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            input: None,
            cache: true,
            output: OutputOptions::default(),
            extra: Map::new(),
            engine: None,
        }
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("input", &self.input)
            .field("cache", &self.cache)
            .field("output", &self.output)
            .field("extra", &self.extra)
            .field("engine", &self.engine.as_ref().map(|_| ".."))
            .finish()
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.output.name = Some(name.into());
        self
    }

    pub fn format(mut self, format: impl Into<OutputFormat>) -> Self {
        self.output.format = Some(format.into());
        self
    }

    pub fn engine(mut self, engine: Arc<dyn BundleEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Set an engine-specific build setting.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// The output-spec argument of the factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSpecArg {
    /// Shorthand for `{ format }`.
    Format(String),
    Multiple(Vec<OutputOptions>),
    Single(OutputOptions),
}

impl OutputSpecArg {
    /// Normalize into an ordered list of output specs.
    pub fn into_specs(self) -> Vec<OutputOptions> {
        match self {
            OutputSpecArg::Format(format) => vec![OutputOptions::new(format)],
            OutputSpecArg::Multiple(specs) => specs,
            OutputSpecArg::Single(spec) => vec![spec],
        }
    }
}

impl From<&str> for OutputSpecArg {
    fn from(format: &str) -> Self {
        OutputSpecArg::Format(format.to_string())
    }
}

impl From<String> for OutputSpecArg {
    fn from(format: String) -> Self {
        OutputSpecArg::Format(format)
    }
}

impl From<OutputOptions> for OutputSpecArg {
    fn from(spec: OutputOptions) -> Self {
        OutputSpecArg::Single(spec)
    }
}

impl From<Vec<OutputOptions>> for OutputSpecArg {
    fn from(specs: Vec<OutputOptions>) -> Self {
        OutputSpecArg::Multiple(specs)
    }
}

/// The first factory argument: build options, or the output spec when no
/// second argument is given.
#[derive(Debug, Clone, Default)]
pub enum OptionsArg {
    #[default]
    None,
    Build(BuildOptions),
    Output(OutputSpecArg),
}

impl From<()> for OptionsArg {
    fn from(_: ()) -> Self {
        OptionsArg::None
    }
}

impl From<BuildOptions> for OptionsArg {
    fn from(options: BuildOptions) -> Self {
        OptionsArg::Build(options)
    }
}

impl From<OutputSpecArg> for OptionsArg {
    fn from(spec: OutputSpecArg) -> Self {
        OptionsArg::Output(spec)
    }
}

impl From<&str> for OptionsArg {
    fn from(format: &str) -> Self {
        OptionsArg::Output(format.into())
    }
}

impl From<OutputOptions> for OptionsArg {
    fn from(spec: OutputOptions) -> Self {
        OptionsArg::Output(spec.into())
    }
}

impl From<Vec<OutputOptions>> for OptionsArg {
    fn from(specs: Vec<OutputOptions>) -> Self {
        OptionsArg::Output(specs.into())
    }
}

/// Canonical `(build options, output specs)` pair.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub build: BuildOptions,
    pub outputs: Vec<OutputOptions>,
}

/// Normalize the two factory arguments.
///
/// With a second argument, the first is build options. Without one, the
/// first is the output spec and build options are empty. Shapes that do not
/// fit are coerced rather than rejected; the engine reports what it cannot
/// handle.
pub fn resolve_options(arg1: OptionsArg, arg2: Option<OutputSpecArg>) -> ResolvedOptions {
    match arg2 {
        Some(spec) => {
            let build = match arg1 {
                OptionsArg::None => BuildOptions::default(),
                OptionsArg::Build(build) => build,
                OptionsArg::Output(OutputSpecArg::Single(output)) => BuildOptions {
                    output,
                    ..Default::default()
                },
                OptionsArg::Output(OutputSpecArg::Format(format)) => {
                    BuildOptions::default().format(format)
                }
                OptionsArg::Output(OutputSpecArg::Multiple(_)) => BuildOptions::default(),
            };
            ResolvedOptions {
                build,
                outputs: spec.into_specs(),
            }
        }
        None => {
            let outputs = match arg1 {
                OptionsArg::None => vec![OutputOptions::default()],
                OptionsArg::Build(build) => vec![build.output],
                OptionsArg::Output(spec) => spec.into_specs(),
            };
            ResolvedOptions {
                build: BuildOptions::default(),
                outputs,
            }
        }
    }
}

/// Determine the entry identifier for `file`.
///
/// Without an explicit `input`, the identifier is the file path relative to
/// `cwd`. An explicit `input` is authoritative and the record is moved to
/// `cwd/input` so downstream consumers see the declared entry path.
pub fn resolve_entry(file: &mut FileRecord, build: &BuildOptions) -> String {
    match &build.input {
        None => relative_path(&file.cwd, &file.path),
        Some(input) => {
            file.path = file.cwd.join(Path::new(input)).clean();
            input.clone()
        }
    }
}
