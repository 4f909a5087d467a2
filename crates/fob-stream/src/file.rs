//! Pipeline file records.
//!
//! A [`FileRecord`] is the unit that flows through a streaming build
//! pipeline. The bundling transform mutates `path`/`contents` on the record
//! it receives, or constructs new records sharing the same `base`/`cwd`.

use std::path::{Path, PathBuf};

use crate::sourcemap::SourceMap;

/// Content state of a file record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Contents {
    /// No contents (directories, or files read with `read: false`).
    #[default]
    Null,
    /// Fully buffered contents.
    Buffer(Vec<u8>),
    /// Contents are a not-yet-read stream. Not supported by the bundler.
    Stream,
}

/// Minimal file-system metadata carried by a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub is_directory: bool,
    pub is_symlink: bool,
}

impl FileStat {
    /// Metadata describing a regular file.
    pub fn regular_file() -> Self {
        Self {
            is_file: true,
            is_directory: false,
            is_symlink: false,
        }
    }
}

/// One item of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Base directory the pipeline globbed from.
    pub base: PathBuf,
    /// Working directory of the pipeline.
    pub cwd: PathBuf,
    pub contents: Contents,
    pub stat: Option<FileStat>,
    /// Source map sentinel: `Some` when the pipeline's source-map capability
    /// is active for this record.
    pub source_map: Option<SourceMap>,
}

impl FileRecord {
    /// Create a record with buffered contents.
    pub fn new(
        cwd: impl Into<PathBuf>,
        base: impl Into<PathBuf>,
        path: impl Into<PathBuf>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            path: path.into(),
            base: base.into(),
            cwd: cwd.into(),
            contents: Contents::Buffer(contents.into()),
            stat: None,
            source_map: None,
        }
    }

    /// Construct a new record that lives next to `self`.
    ///
    /// `cwd` and `base` are copied, the stat marks a regular file and the
    /// contents start out null.
    pub fn sibling(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base: self.base.clone(),
            cwd: self.cwd.clone(),
            contents: Contents::Null,
            stat: Some(FileStat::regular_file()),
            source_map: self.source_map.as_ref().map(|_| SourceMap::empty_for(None)),
        }
    }

    /// Enable the source-map capability for this record.
    pub fn with_source_map(mut self) -> Self {
        let file = self.relative().to_string_lossy().into_owned();
        self.source_map = Some(SourceMap::empty_for(Some(file)));
        self
    }

    /// Replace the contents with a stream marker.
    pub fn with_stream(mut self) -> Self {
        self.contents = Contents::Stream;
        self
    }

    /// Replace the contents with the null marker.
    pub fn with_null(mut self) -> Self {
        self.contents = Contents::Null;
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self.contents, Contents::Null)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.contents, Contents::Stream)
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.contents, Contents::Buffer(_))
    }

    /// Whether the pipeline's source-map mechanism is active for this record.
    pub fn has_source_map(&self) -> bool {
        self.source_map.is_some()
    }

    /// Buffered contents, if any.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.contents {
            Contents::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Buffered contents as UTF-8 text, if any.
    pub fn text(&self) -> Option<&str> {
        self.bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn set_contents(&mut self, contents: impl Into<Vec<u8>>) {
        self.contents = Contents::Buffer(contents.into());
    }

    /// Path relative to `base`.
    pub fn relative(&self) -> PathBuf {
        self.path
            .strip_prefix(&self.base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.path.clone())
    }

    /// Base name without extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory containing the file.
    pub fn dirname(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.clone())
    }
}
