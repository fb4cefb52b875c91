//! Asset store adapter: uploads files under a package's `assets/`
//! directory to `<name>/<version>/<file>` and
//! resolves asset keys back to fetchable URLs for the HTTP front end's
//! redirect handler.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum AssetStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("unsupported asset store backend: {0}")]
    UnsupportedBackend(String),
}

pub type Result<T> = std::result::Result<T, AssetStoreError>;

/// Backing object-store adapter for dataset assets. Implementations are
/// expected to be cheap to clone and safe to share across tasks.
#[async_trait::async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, key: &str, local_path: &Path) -> Result<()>;

    /// Resolve a stored asset key to a URL the HTTP front end can
    /// redirect clients to.
    fn resolve_url(&self, key: &str) -> String;
}

/// Filesystem-backed asset store used for local development and tests:
/// assets are copied under a base directory mirroring the `<name>/<version>/<file>`
/// key layout, and `resolve_url` returns a `file://` URL.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    base_dir: PathBuf,
}

impl LocalAssetStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }
}

#[async_trait::async_trait]
impl AssetStore for LocalAssetStore {
    async fn upload(&self, key: &str, local_path: &Path) -> Result<()> {
        let dest = self.base_dir.join(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &dest).await?;
        Ok(())
    }

    fn resolve_url(&self, key: &str) -> String {
        format!("file://{}", self.base_dir.join(key).display())
    }
}

/// Upload every file under `<package_dir>/assets/` to the given store,
/// keyed `<name>/<version>/<relative path>`.
pub async fn upload_assets_dir(
    store: &dyn AssetStore,
    package_dir: &Path,
    name: &str,
    version: &str,
) -> Result<Vec<String>> {
    let assets_dir = package_dir.join("assets");
    if !assets_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut uploaded = Vec::new();
    let mut stack = vec![assets_dir.clone()];
    while let Some(dir) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                stack.push(path);
                continue;
            }
            let relative = path.strip_prefix(&assets_dir).unwrap_or(&path);
            let key = format!("{name}/{version}/{}", relative.display());
            store.upload(&key, &path).await?;
            uploaded.push(key);
        }
    }
    uploaded.sort();
    Ok(uploaded)
}

/// Stub for a cloud object store backend, selected via the
/// `ASSET_STORE` environment variable. Not implemented: constructing
/// one always fails with [`AssetStoreError::UnsupportedBackend`].
#[derive(Debug, Clone)]
pub struct CloudAssetStore {
    backend_name: String,
}

impl CloudAssetStore {
    pub fn new(backend_name: impl Into<String>) -> Self {
        Self { backend_name: backend_name.into() }
    }
}

#[async_trait::async_trait]
impl AssetStore for CloudAssetStore {
    async fn upload(&self, _key: &str, _local_path: &Path) -> Result<()> {
        Err(AssetStoreError::UnsupportedBackend(self.backend_name.clone()))
    }

    fn resolve_url(&self, key: &str) -> String {
        format!("https://{}/{key}", self.backend_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uploads_nested_asset_tree_with_prefixed_keys() {
        let package_dir = tempfile::tempdir().unwrap();
        let assets_dir = package_dir.path().join("assets").join("icons");
        tokio::fs::create_dir_all(&assets_dir).await.unwrap();
        tokio::fs::write(assets_dir.join("flag.svg"), b"<svg/>").await.unwrap();

        let store_dir = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(store_dir.path());

        let uploaded = upload_assets_dir(&store, package_dir.path(), "test", "v1").await.unwrap();
        assert_eq!(uploaded, vec!["test/v1/icons/flag.svg".to_string()]);
        assert!(store_dir.path().join("test/v1/icons/flag.svg").exists());
    }

    #[tokio::test]
    async fn missing_assets_dir_uploads_nothing() {
        let package_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(store_dir.path());
        let uploaded = upload_assets_dir(&store, package_dir.path(), "test", "v1").await.unwrap();
        assert!(uploaded.is_empty());
    }
}
