//! Source text access
//!
//! The analyzer reads module and resource files through this seam so tests
//! can serve sources from memory.

use std::path::Path;

use log::trace;
use rustc_hash::FxHashMap;

pub trait SourceReader {
    /// Text of the file at `path`, `None` when it does not exist or cannot
    /// be read
    fn read(&self, path: &Path) -> Option<String>;
}

/// Reads from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceReader;

impl SourceReader for FsSourceReader {
    fn read(&self, path: &Path) -> Option<String> {
        match std::fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(err) => {
                trace!("Could not read {}: {err}", path.display());
                None
            }
        }
    }
}

/// Serves sources from an in-memory path map
#[derive(Debug, Clone, Default)]
pub struct MemorySourceReader {
    files: FxHashMap<String, String>,
}

impl MemorySourceReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files
            .insert(path.as_ref().to_string_lossy().into_owned(), text.into());
    }
}

impl SourceReader for MemorySourceReader {
    fn read(&self, path: &Path) -> Option<String> {
        self.files.get(path.to_string_lossy().as_ref()).cloned()
    }
}
