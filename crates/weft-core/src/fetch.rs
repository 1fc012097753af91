//! Resource fetching.
//!
//! The runtime reads module and style sources through the [`TextFetcher`]
//! trait so the transport can be swapped out: production sessions read the
//! build output tree from disk, tests use an in-memory map.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{Result, WeftError};

/// Locates compiled component resources under a build output root.
///
/// The build pipeline emits one `<module>.js` and one `<style>.css` file per
/// identifier, all in a flat directory.
#[derive(Debug, Clone)]
pub struct ResourcePaths {
    root: PathBuf,
}

impl ResourcePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module_path(&self, module_id: &str) -> PathBuf {
        self.root.join(format!("{}.js", module_id))
    }

    pub fn style_path(&self, style_id: &str) -> PathBuf {
        self.root.join(format!("{}.css", style_id))
    }
}

/// Reads the textual content of a resource.
#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn read_text(&self, path: &Path) -> Result<String>;
}

/// Fetcher backed by the local filesystem.
pub struct FsFetcher;

#[async_trait]
impl TextFetcher for FsFetcher {
    async fn read_text(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| WeftError::Fetch(format!("{}: {}", path.display(), e)))
    }
}

/// In-memory fetcher for tests and embedded bundles.
///
/// Counts reads so callers can assert that deduplication held and a given
/// resource was fetched exactly once.
pub struct MemoryFetcher {
    entries: Mutex<HashMap<PathBuf, String>>,
    reads: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.entries
            .lock()
            .unwrap()
            .insert(path.into(), content.into());
    }

    /// Total number of `read_text` calls, hits and misses alike.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Default for MemoryFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextFetcher for MemoryFetcher {
    async fn read_text(&self, path: &Path) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| WeftError::Fetch(format!("{}: not found", path.display())))
    }
}
