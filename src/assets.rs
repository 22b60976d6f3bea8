//! Asset sources
//!
//! Geometry files and images are fetched through an [`AssetSource`]. Paths look
//! like web paths (`/models/plane.json`); every source resolves them relative to
//! its own root.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::error::AssetError;

/// Fetches raw asset bytes by path
pub trait AssetSource {
    fn fetch<'a>(&'a self, path: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, AssetError>>;
}

fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Reads assets from a directory on disk
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl AssetSource for FileSource {
    fn fetch<'a>(&'a self, path: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, AssetError>> {
        let full = self.root.join(relative(path));
        let result = std::fs::read(&full).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.to_string()),
            _ => AssetError::Io {
                path: path.to_string(),
                source,
            },
        });
        future::ready(result).boxed_local()
    }
}

/// Serves assets from memory
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `contents` under `path`, replacing any previous entry
    pub fn insert(&self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .borrow_mut()
            .insert(relative(path).to_string(), contents.into());
    }

    pub fn with(self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }
}

impl AssetSource for MemorySource {
    fn fetch<'a>(&'a self, path: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, AssetError>> {
        let result = self
            .files
            .borrow()
            .get(relative(path))
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_string()));
        future::ready(result).boxed_local()
    }
}

/// Fetches assets with plain HTTP GET requests
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
}

#[cfg(feature = "http")]
impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        use std::io::Read;

        let url = format!("{}/{}", self.base_url, relative(path));
        let response = ureq::get(&url).call().map_err(|e| match e {
            ureq::Error::Status(404, _) => AssetError::NotFound(path.to_string()),
            ureq::Error::Status(code, _) => AssetError::Http {
                path: path.to_string(),
                message: format!("status {}", code),
            },
            ureq::Error::Transport(transport) => AssetError::Http {
                path: path.to_string(),
                message: transport.to_string(),
            },
        })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|source| AssetError::Io {
                path: path.to_string(),
                source,
            })?;
        Ok(bytes)
    }
}

#[cfg(feature = "http")]
impl AssetSource for HttpSource {
    fn fetch<'a>(&'a self, path: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, AssetError>> {
        async move { self.get(path) }.boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_ignores_leading_slash() {
        let source = MemorySource::new().with("models/plane.json", b"{}".to_vec());
        let bytes = pollster::block_on(source.fetch("/models/plane.json")).unwrap();
        assert_eq!(bytes, b"{}");
    }

    #[test]
    fn test_missing_memory_asset_is_not_found() {
        let source = MemorySource::new();
        let err = pollster::block_on(source.fetch("/nope.json")).unwrap_err();
        assert!(matches!(err, AssetError::NotFound(path) if path == "/nope.json"));
    }

    #[test]
    fn test_file_source_reads_relative_to_root() {
        let dir = std::env::temp_dir().join(format!("sketch-engine-assets-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("geometry.json"), b"[1,2,3]").unwrap();

        let source = FileSource::new(&dir);
        assert_eq!(
            pollster::block_on(source.fetch("/geometry.json")).unwrap(),
            b"[1,2,3]"
        );
        assert!(matches!(
            pollster::block_on(source.fetch("/missing.json")),
            Err(AssetError::NotFound(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
