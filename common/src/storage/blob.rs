use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;

use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Blob storage for uploaded images.
///
/// Backed by `object_store`; the local backend stages writes to a temporary
/// file and renames into place, so a concurrent reader never observes a
/// truncated blob.
#[derive(Clone)]
pub struct BlobStorage {
    store: DynStore,
    backend_kind: StorageKind,
    local_base: Option<PathBuf>,
}

impl BlobStorage {
    /// Create a new BlobStorage from the application configuration.
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        let backend_kind = cfg.storage.clone();
        let (store, local_base) = create_storage_backend(cfg).await?;

        Ok(Self {
            store,
            backend_kind,
            local_base,
        })
    }

    /// Create a BlobStorage with a custom backend, used to inject an
    /// in-memory store in tests.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
            local_base: None,
        }
    }

    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Resolved base directory when using the local backend.
    pub fn local_base_path(&self) -> Option<&Path> {
        self.local_base.as_deref()
    }

    /// Store the full byte stream under `name`.
    ///
    /// Write failures (disk full, permissions) propagate to the caller and
    /// are not retried.
    pub async fn put(&self, name: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(name);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    /// Retrieve the full contents buffered in memory.
    pub async fn get(&self, name: &str) -> object_store::Result<Bytes> {
        let path = ObjPath::from(name);
        let result = self.store.get(&path).await?;
        result.bytes().await
    }

    /// Get a streaming handle, suitable for serving large blobs.
    pub async fn get_stream(
        &self,
        name: &str,
    ) -> object_store::Result<BoxStream<'static, object_store::Result<Bytes>>> {
        let path = ObjPath::from(name);
        let result = self.store.get(&path).await?;
        Ok(result.into_stream())
    }

    /// Delete the blob if present. Deleting a missing blob is a no-op.
    pub async fn delete(&self, name: &str) -> object_store::Result<()> {
        let path = ObjPath::from(name);
        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Check whether a blob exists under `name`.
    pub async fn exists(&self, name: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(name);
        self.store
            .head(&path)
            .await
            .map(|_| true)
            .or_else(|e| match e {
                object_store::Error::NotFound { .. } => Ok(false),
                _ => Err(e),
            })
    }
}

/// Create a storage backend based on configuration.
async fn create_storage_backend(
    cfg: &AppConfig,
) -> object_store::Result<(DynStore, Option<PathBuf>)> {
    match cfg.storage {
        StorageKind::Local => {
            let base = PathBuf::from(&cfg.data_dir);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await.map_err(|e| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    }
                })?;
            }
            let store = LocalFileSystem::new_with_prefix(base.clone())?;
            Ok((Arc::new(store), Some(base)))
        }
        StorageKind::Memory => {
            let store = InMemory::new();
            Ok((Arc::new(store), None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_blobs() -> BlobStorage {
        BlobStorage::with_backend(Arc::new(InMemory::new()), StorageKind::Memory)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let blobs = memory_blobs();
        let data = Bytes::from_static(b"fake image bytes");

        blobs.put("abc_cat.png", data.clone()).await.expect("put");

        let fetched = blobs.get("abc_cat.png").await.expect("get");
        assert_eq!(fetched, data);
        assert!(blobs.exists("abc_cat.png").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_get_missing_blob_is_not_found() {
        let blobs = memory_blobs();
        let result = blobs.get("nope.png").await;
        assert!(matches!(result, Err(object_store::Error::NotFound { .. })));
        assert!(!blobs.exists("nope.png").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let blobs = memory_blobs();
        blobs
            .put("gone.png", Bytes::from_static(b"x"))
            .await
            .expect("put");

        blobs.delete("gone.png").await.expect("first delete");
        assert!(!blobs.exists("gone.png").await.expect("exists"));

        // Second delete of the same name must succeed as a no-op.
        blobs.delete("gone.png").await.expect("second delete");
    }

    #[tokio::test]
    async fn test_local_backend_creates_base_dir() {
        let dir = std::env::temp_dir().join(format!("tolka_blob_test_{}", uuid::Uuid::new_v4()));
        let cfg = AppConfig {
            data_dir: dir.to_string_lossy().into_owned(),
            storage: StorageKind::Local,
            ..AppConfig::default()
        };

        let blobs = BlobStorage::new(&cfg).await.expect("local backend");
        assert!(dir.exists());
        assert_eq!(blobs.local_base_path(), Some(dir.as_path()));

        blobs
            .put("id_scan.png", Bytes::from_static(b"bytes"))
            .await
            .expect("put");
        assert!(dir.join("id_scan.png").exists());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
