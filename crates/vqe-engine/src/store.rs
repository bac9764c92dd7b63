//! Result store: the (asset identity, executor identity) cache.
//!
//! Entries are keyed by `{executor_key}/{asset_identity}` so two executor
//! variants can never clobber each other's rows. The file-backed store
//! keeps gzip-compressed JSON; anything unreadable, corrupt, or written
//! under an older result format is logged and treated as a miss rather
//! than surfaced as wrong-shaped data.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use vqe_models::{AssetResult, ExecutorId};

use crate::error::{EngineError, EngineResult};

/// Cache of previously computed results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Look up the result for an (asset, executor) pair.
    ///
    /// Returns `Ok(None)` on a miss; corrupt or outdated entries count as
    /// misses.
    async fn get(
        &self,
        asset_id: &str,
        executor_id: &ExecutorId,
    ) -> EngineResult<Option<AssetResult>>;

    /// Store a result under its (asset, executor) key.
    async fn put(&self, result: &AssetResult) -> EngineResult<()>;

    /// Remove the entry for an (asset, executor) pair, if present.
    async fn remove(&self, asset_id: &str, executor_id: &ExecutorId) -> EngineResult<()>;
}

/// Compress a result to gzip JSON bytes.
pub fn compress_result(result: &AssetResult) -> EngineResult<Vec<u8>> {
    let json = serde_json::to_string(result)
        .map_err(|e| EngineError::Serialization(format!("failed to serialize result: {}", e)))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(json.as_bytes())
        .map_err(|e| EngineError::Serialization(format!("failed to gzip result: {}", e)))?;

    encoder
        .finish()
        .map_err(|e| EngineError::Serialization(format!("failed to finish gzip encoding: {}", e)))
}

/// Decompress gzip JSON bytes to a result.
///
/// Returns `None` if decompression or deserialization fails, or if the
/// entry was written under an older result format (treated as a miss).
pub fn decompress_result(data: &[u8]) -> Option<AssetResult> {
    let mut decoder = GzDecoder::new(data);
    let mut json = String::new();

    if let Err(e) = decoder.read_to_string(&mut json) {
        warn!(error = %e, "Failed to decompress cached result");
        return None;
    }

    match serde_json::from_str::<AssetResult>(&json) {
        Ok(result) => {
            if result.is_current_version() {
                Some(result)
            } else {
                debug!(
                    cached_version = result.format_version,
                    "Cached result format version mismatch, treating as miss"
                );
                None
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to deserialize cached result");
            None
        }
    }
}

/// File-backed result store.
///
/// Layout: `{root}/{executor_key}/{asset_identity}.json.gz`. Writes go
/// through a temp file and an atomic rename.
pub struct FileResultStore {
    root: PathBuf,
}

impl FileResultStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn entry_path(&self, asset_id: &str, executor_id: &ExecutorId) -> PathBuf {
        self.root
            .join(executor_id.key())
            .join(format!("{}.json.gz", asset_id))
    }
}

#[async_trait]
impl ResultStore for FileResultStore {
    async fn get(
        &self,
        asset_id: &str,
        executor_id: &ExecutorId,
    ) -> EngineResult<Option<AssetResult>> {
        let path = self.entry_path(asset_id, executor_id);

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Result cache MISS");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match decompress_result(&data) {
            Some(result) => {
                debug!(path = %path.display(), "Result cache HIT");
                Ok(Some(result))
            }
            None => {
                debug!(path = %path.display(), "Result cache MISS (corrupt or outdated)");
                Ok(None)
            }
        }
    }

    async fn put(&self, result: &AssetResult) -> EngineResult<()> {
        let path = self.entry_path(&result.asset_id, &result.executor_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let compressed = compress_result(result)?;
        debug!(
            path = %path.display(),
            bytes = compressed.len(),
            "Storing result"
        );

        let tmp = path.with_extension("gz.tmp");
        tokio::fs::write(&tmp, &compressed).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, asset_id: &str, executor_id: &ExecutorId) -> EngineResult<()> {
        let path = self.entry_path(asset_id, executor_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory result store for tests and embedding.
#[derive(Default)]
pub struct MemoryResultStore {
    entries: RwLock<HashMap<String, AssetResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(asset_id: &str, executor_id: &ExecutorId) -> String {
        format!("{}/{}", executor_id.key(), asset_id)
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn get(
        &self,
        asset_id: &str,
        executor_id: &ExecutorId,
    ) -> EngineResult<Option<AssetResult>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&Self::key(asset_id, executor_id))
            .cloned())
    }

    async fn put(&self, result: &AssetResult) -> EngineResult<()> {
        self.entries.write().await.insert(
            Self::key(&result.asset_id, &result.executor_id),
            result.clone(),
        );
        Ok(())
    }

    async fn remove(&self, asset_id: &str, executor_id: &ExecutorId) -> EngineResult<()> {
        self.entries
            .write()
            .await
            .remove(&Self::key(asset_id, executor_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_result() -> AssetResult {
        let mut result = AssetResult::new("asset_a", ExecutorId::new("psnr", "1.0"));
        result.insert_series("psnr_scores", vec![34.2, 35.1]);
        result
    }

    #[test]
    fn test_compress_decompress_roundtrip() {
        let result = test_result();

        let compressed = compress_result(&result).expect("compress should succeed");
        assert!(!compressed.is_empty());

        let back = decompress_result(&compressed).expect("decompress should succeed");
        assert_eq!(back, result);
    }

    #[test]
    fn test_decompress_corrupt_data() {
        assert!(decompress_result(b"not gzip data at all").is_none());
    }

    #[test]
    fn test_decompress_outdated_version() {
        let mut result = test_result();
        result.format_version = 0;

        let compressed = compress_result(&result).unwrap();
        assert!(decompress_result(&compressed).is_none());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::new(dir.path());
        let result = test_result();
        let id = ExecutorId::new("psnr", "1.0");

        assert!(store.get("asset_a", &id).await.unwrap().is_none());

        store.put(&result).await.unwrap();
        let back = store.get("asset_a", &id).await.unwrap().unwrap();
        assert_eq!(back, result);

        // other executor versions never see the entry
        assert!(store
            .get("asset_a", &ExecutorId::new("psnr", "2.0"))
            .await
            .unwrap()
            .is_none());

        store.remove("asset_a", &id).await.unwrap();
        assert!(store.get("asset_a", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::new(dir.path());
        let id = ExecutorId::new("psnr", "1.0");

        let path = dir.path().join("psnr_v1.0").join("asset_a.json.gz");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"garbage").unwrap();

        assert!(store.get("asset_a", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResultStore::new(dir.path());
        store
            .remove("nothing", &ExecutorId::new("psnr", "1.0"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryResultStore::new();
        let result = test_result();
        let id = ExecutorId::new("psnr", "1.0");

        store.put(&result).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("asset_a", &id).await.unwrap().unwrap(), result);

        store.remove("asset_a", &id).await.unwrap();
        assert!(store.get("asset_a", &id).await.unwrap().is_none());
    }
}
