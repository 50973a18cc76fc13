// Asset store - name-addressed byte storage for uploaded images.
//
// The relational database is the source of truth; this store is a mirror
// keyed by the locators saved in `post_images.url`. Callers that delete
// assets treat failures as advisory (log and continue), callers that write
// treat failures as fatal.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Prefix under which stored assets are served back over HTTP.
pub const LOCATOR_PREFIX: &str = "/media/";

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Write bytes under the given name. Returns the locator to persist.
    async fn write(&self, name: &str, data: Bytes) -> io::Result<String>;

    /// Read the bytes behind a locator.
    async fn read(&self, locator: &str) -> io::Result<Bytes>;

    /// Delete the bytes behind a locator. Deleting a missing asset is not
    /// an error.
    async fn delete(&self, locator: &str) -> io::Result<()>;

    /// Whether the locator currently resolves to stored bytes.
    async fn exists(&self, locator: &str) -> bool;
}

pub type DynAssetStore = Arc<dyn AssetStore>;

/// Filesystem-backed store rooted at the configured uploads directory.
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a locator to a path inside the root, rejecting anything that
    /// would escape it.
    fn resolve(&self, locator: &str) -> io::Result<PathBuf> {
        let name = locator.strip_prefix(LOCATOR_PREFIX).unwrap_or(locator);
        let relative = Path::new(name);
        let traverses = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || traverses {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid asset locator: {locator}"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn write(&self, name: &str, data: Bytes) -> io::Result<String> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        Ok(format!("{LOCATOR_PREFIX}{name}"))
    }

    async fn read(&self, locator: &str) -> io::Result<Bytes> {
        let path = self.resolve(locator)?;
        Ok(Bytes::from(tokio::fs::read(&path).await?))
    }

    async fn delete(&self, locator: &str) -> io::Result<()> {
        let path = self.resolve(locator)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, locator: &str) -> bool {
        match self.resolve(locator) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
