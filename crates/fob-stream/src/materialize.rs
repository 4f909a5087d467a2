//! Turning generated artifacts into pipeline records.

use std::path::{Path, PathBuf};

use crate::engine::OutputChunk;
use crate::file::FileRecord;
use crate::options::OutputOptions;
use crate::sourcemap::apply_source_map;

/// Where one output ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Applied to the incoming record, path unchanged.
    Original,
    /// Applied to the incoming record after moving it to this path.
    Renamed(PathBuf),
    /// Applied to a new record at this path, emitted next to the original.
    Injected(PathBuf),
}

/// Applies the outputs of one source file.
///
/// The first output spec always lands on the incoming record. A later spec
/// with a destination file gets a record of its own; a later spec without
/// one is applied to the incoming record as well, so among those the last
/// one wins.
#[derive(Debug, Clone)]
pub struct Materializer {
    source_maps: bool,
    cwd: PathBuf,
    base: PathBuf,
    original_path: PathBuf,
    /// Directory map paths are made relative to.
    dir: PathBuf,
    total: usize,
}

impl Materializer {
    /// Capture the state of `file` before any output is applied.
    pub fn for_file(file: &FileRecord, total: usize) -> Self {
        Self {
            source_maps: file.has_source_map(),
            cwd: file.cwd.clone(),
            base: file.base.clone(),
            original_path: file.path.clone(),
            dir: file.dirname(),
            total,
        }
    }

    pub fn source_maps(&self) -> bool {
        self.source_maps
    }

    /// Choose the target of output `index`.
    pub fn target(&self, spec: &OutputOptions, index: usize) -> OutputTarget {
        let inject = self.total > 1 && index > 0;
        match spec.file.as_deref().and_then(Path::file_name) {
            Some(name) => {
                let path = self.base.join(name);
                if inject {
                    OutputTarget::Injected(path)
                } else {
                    OutputTarget::Renamed(path)
                }
            }
            None => OutputTarget::Original,
        }
    }

    /// Apply output `index` to `file`, or to a new record which is returned.
    pub fn materialize(
        &self,
        file: &mut FileRecord,
        spec: &OutputOptions,
        index: usize,
        chunk: OutputChunk,
    ) -> Option<FileRecord> {
        match self.target(spec, index) {
            OutputTarget::Original => {
                self.apply(file, chunk);
                None
            }
            OutputTarget::Renamed(path) => {
                tracing::debug!(from = %file.path.display(), to = %path.display(), "renaming bundled file");
                file.path = path;
                self.apply(file, chunk);
                None
            }
            OutputTarget::Injected(path) => {
                let mut injected = file.sibling(path);
                self.apply(&mut injected, chunk);
                Some(injected)
            }
        }
    }

    /// Set the contents of `target` and attach the map, if source maps are on.
    pub fn apply(&self, target: &mut FileRecord, chunk: OutputChunk) {
        target.set_contents(chunk.code.into_bytes());

        if !self.source_maps {
            return;
        }

        match chunk.map {
            Some(mut map) => {
                map.relativize(&self.dir, &self.cwd, &self.original_path);
                apply_source_map(target, map);
            }
            None => {
                tracing::warn!(
                    path = %target.path.display(),
                    "engine returned no source map although one was requested"
                );
            }
        }
    }
}
