//! Source map model and attachment.
//!
//! The engine hands back a v3 source map whose `file` and `sources` are
//! expressed however the engine likes (usually absolute). Before the map is
//! attached to a record, those paths are rewritten relative to the directory
//! of the file that was bundled.

use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Serialize};

use crate::file::FileRecord;

/// Revision 3 source map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub mappings: String,
}

impl SourceMap {
    /// An empty map, as installed by the pipeline when source maps are
    /// initialised for a record.
    pub fn empty_for(file: Option<String>) -> Self {
        Self {
            version: 3,
            file,
            ..Default::default()
        }
    }

    /// Whether the map carries no mappings yet.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Rewrite `file` and every entry of `sources` relative to `dir`.
    ///
    /// Relative source paths are first resolved against `cwd`.
    pub fn relativize(&mut self, dir: &Path, cwd: &Path, original: &Path) {
        self.file = Some(relative_path(dir, &resolve(cwd, original)));
        for source in self.sources.iter_mut() {
            *source = relative_path(dir, &resolve(cwd, Path::new(source.as_str())));
        }
    }
}

fn resolve(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf().clean()
    } else {
        cwd.join(path).clean()
    }
}

/// Attach `map` to `file` through the pipeline's source-map mechanism.
///
/// A record whose current map has no mappings simply takes the new map. A
/// record that already carries mappings from an upstream transform gets the
/// new map as well; the engine read the sources itself, so its mappings
/// already point at the real inputs.
pub fn apply_source_map(file: &mut FileRecord, map: SourceMap) {
    match &file.source_map {
        Some(existing) if !existing.is_empty() => {
            tracing::warn!(
                path = %file.path.display(),
                "replacing upstream source map with bundler output"
            );
            file.source_map = Some(map);
        }
        _ => file.source_map = Some(map),
    }
}

/// Compute the path of `to` relative to the directory `from`.
///
/// Both paths are expected to be absolute. Separators in the result are
/// always `/`, as source maps require.
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from = from.to_path_buf().clean();
    let to = to.to_path_buf().clean();

    let from_parts: Vec<Component<'_>> = from.components().collect();
    let to_parts: Vec<Component<'_>> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for component in &from_parts[common..] {
        if matches!(component, Component::Normal(_) | Component::ParentDir) {
            parts.push("..".to_string());
        }
    }
    for component in &to_parts[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
