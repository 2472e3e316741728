//! Where asset bytes come from.
//!
//! The loader thread resolves every locator through an [`AssetSource`].
//! [`FsSource`] reads files under a root directory; [`MemorySource`] serves
//! bytes registered up front (embedded assets, tests).

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

/// Byte provider for asset locators. Must be shareable with the loader thread.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, src: &str) -> io::Result<Vec<u8>>;
}

/// Reads locators as paths relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, src: &str) -> io::Result<PathBuf> {
        let rel = Path::new(src.trim_start_matches("./"));
        // Locators may not climb out of the root.
        if rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("locator '{src}' escapes the asset root"),
            ));
        }
        Ok(self.root.join(rel))
    }
}

impl AssetSource for FsSource {
    fn fetch(&self, src: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(src)?)
    }
}

/// In-memory locator → bytes map. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Arc<RwLock<FxHashMap<String, Vec<u8>>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, src: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(src.into(), bytes.into());
        }
    }

    pub fn with(self, src: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(src, bytes);
        self
    }

    pub fn remove(&self, src: &str) -> bool {
        self.files
            .write()
            .map(|mut files| files.remove(src).is_some())
            .unwrap_or(false)
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, src: &str) -> io::Result<Vec<u8>> {
        let files = self
            .files
            .read()
            .map_err(|_| io::Error::other("memory source lock poisoned"))?;
        files
            .get(src)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("'{src}' not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_serves_registered_bytes() {
        let source = MemorySource::new().with("data/a.json", b"{}".to_vec());
        assert_eq!(source.fetch("data/a.json").unwrap(), b"{}");
        assert_eq!(
            source.fetch("missing").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        assert!(source.remove("data/a.json"));
        assert!(source.fetch("data/a.json").is_err());
    }

    #[test]
    fn fs_source_rejects_parent_components() {
        let source = FsSource::new("/tmp/assets");
        let err = source.fetch("../etc/passwd").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
