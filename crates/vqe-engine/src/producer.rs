//! The producer contract and the batch driver.
//!
//! A [`Producer`] is one unit of production: given an asset it yields an
//! [`AssetResult`], identified by a (TYPE, VERSION) pair. The provided
//! [`Producer::run`] wraps every production in the cache protocol (look
//! up the (asset identity, executor identity) row, validate its shape,
//! produce and store on a miss), so concrete variants only implement
//! [`Producer::produce`].

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vqe_models::{Asset, AssetResult, ExecutorId};

use crate::context::RunContext;
use crate::error::{EngineError, EngineResult};
use crate::store::ResultStore;

/// A unit of production with caching and log lifecycle management.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Identity of this variant.
    fn id(&self) -> ExecutorId;

    /// Score keys every result of this producer must carry. Used to
    /// validate cache hits before returning them.
    fn score_keys(&self) -> Vec<String>;

    /// Produce the result for one asset. Called only on a cache miss.
    async fn produce(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<AssetResult>;

    /// Delete this producer's intermediate log file for an asset.
    ///
    /// Composite producers override this to delegate to their constituent
    /// assembler so no intermediate file is orphaned.
    async fn remove_log(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<()> {
        let path = ctx.log_file_path(&self.id(), asset);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove this producer's cache row for an asset.
    ///
    /// Composite producers override this to also fan out to their
    /// constituent assembler.
    async fn remove_result(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<()> {
        ctx.store.remove(&asset.identity(), &self.id()).await
    }

    /// Run one asset through the cache protocol.
    async fn run_on_asset(&self, ctx: &RunContext, asset: &Asset) -> EngineResult<AssetResult> {
        let asset_id = asset.identity();
        let id = self.id();
        let expected = self.score_keys();

        if let Some(cached) = ctx.store.get(&asset_id, &id).await? {
            match missing_keys(&cached, &expected) {
                None => {
                    debug!(executor = %id, asset = %asset_id, "Returning cached result");
                    counter!("vqe_cache_hits_total", "executor" => id.key()).increment(1);
                    return Ok(cached);
                }
                Some(missing) => {
                    // A hit with the wrong shape is never returned; recompute.
                    warn!(
                        executor = %id,
                        asset = %asset_id,
                        missing = %missing,
                        "Cached result lacks expected score keys, recomputing"
                    );
                }
            }
        }
        counter!("vqe_cache_misses_total", "executor" => id.key()).increment(1);

        let result = self.produce(ctx, asset).await?;
        if let Some(missing) = missing_keys(&result, &expected) {
            return Err(EngineError::CacheInconsistency {
                key: format!("{}/{}", id.key(), asset_id),
                missing,
            });
        }

        ctx.store.put(&result).await?;
        Ok(result)
    }

    /// Process each asset independently, returning one result per asset in
    /// input order. The first failing asset aborts the call.
    async fn run(&self, ctx: &RunContext, assets: &[Asset]) -> EngineResult<Vec<AssetResult>> {
        let mut results = Vec::with_capacity(assets.len());
        for asset in assets {
            results.push(self.run_on_asset(ctx, asset).await?);
        }
        Ok(results)
    }
}

/// Comma-joined list of expected keys absent from `result`, or `None` when
/// all are present.
fn missing_keys(result: &AssetResult, expected: &[String]) -> Option<String> {
    let missing: Vec<&str> = expected
        .iter()
        .filter(|key| !result.contains_key(key))
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(missing.join(", "))
    }
}

/// Drive independent (asset, executor) units concurrently, bounded by
/// `config.max_parallel_assets`.
///
/// Disjoint cache and log keys make concurrent units safe without locking;
/// results come back in input order. Any unit's failure aborts the batch
/// with that unit's error.
pub async fn run_batch(
    producer: Arc<dyn Producer>,
    ctx: Arc<RunContext>,
    assets: Vec<Asset>,
) -> EngineResult<Vec<AssetResult>> {
    let run_id = Uuid::new_v4();
    let max_parallel = ctx.config.max_parallel_assets.max(1);
    info!(
        run_id = %run_id,
        executor = %producer.id(),
        assets = assets.len(),
        max_parallel = max_parallel,
        "Starting batch run"
    );

    let semaphore = Arc::new(Semaphore::new(max_parallel));
    let mut join_set = JoinSet::new();

    for (index, asset) in assets.into_iter().enumerate() {
        let producer = Arc::clone(&producer);
        let ctx = Arc::clone(&ctx);
        let semaphore = Arc::clone(&semaphore);

        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| EngineError::store("semaphore closed"))?;
            let result = producer.run_on_asset(&ctx, &asset).await?;
            Ok::<(usize, AssetResult), EngineError>((index, result))
        });
    }

    let mut indexed = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        let unit = joined.map_err(|e| EngineError::store(format!("batch task failed: {}", e)))?;
        match unit {
            Ok(pair) => indexed.push(pair),
            Err(e) => {
                join_set.abort_all();
                return Err(e);
            }
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, result)| result).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::{MemoryResultStore, ResultStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vqe_models::PixelFormat;

    /// Producer that counts how often `produce` actually runs.
    struct CountingProducer {
        calls: AtomicUsize,
        broken: bool,
    }

    impl CountingProducer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                broken: false,
            }
        }

        fn broken() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                broken: true,
            }
        }
    }

    #[async_trait]
    impl Producer for CountingProducer {
        fn id(&self) -> ExecutorId {
            ExecutorId::new("counting", "0.1")
        }

        fn score_keys(&self) -> Vec<String> {
            vec!["counting_scores".to_string()]
        }

        async fn produce(&self, _ctx: &RunContext, asset: &Asset) -> EngineResult<AssetResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut result = AssetResult::new(asset.identity(), self.id());
            if !self.broken {
                result.insert_series("counting_scores", vec![1.0, 2.0]);
            }
            Ok(result)
        }
    }

    fn test_ctx() -> RunContext {
        RunContext::new(
            EngineConfig::default(),
            Arc::new(MemoryResultStore::new()),
        )
        .unwrap()
    }

    fn test_asset(n: u32) -> Asset {
        Asset::new(
            "/r/a.yuv",
            format!("/d/b{}.yuv", n),
            PixelFormat::Yuv420p,
            640,
            480,
        )
    }

    #[tokio::test]
    async fn test_second_run_is_cache_hit() {
        let ctx = test_ctx();
        let producer = CountingProducer::new();
        let assets = vec![test_asset(0)];

        let first = producer.run(&ctx, &assets).await.unwrap();
        let second = producer.run(&ctx, &assets).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(producer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_lacking_keys_is_recomputed() {
        let ctx = test_ctx();
        let producer = CountingProducer::new();
        let asset = test_asset(0);

        // Seed a wrong-shaped row under the producer's identity.
        let stale = AssetResult::new(asset.identity(), producer.id());
        ctx.store.put(&stale).await.unwrap();

        let result = producer.run_on_asset(&ctx, &asset).await.unwrap();
        assert!(result.contains_key("counting_scores"));
        assert_eq!(producer.calls.load(Ordering::SeqCst), 1);

        // The recomputed row replaced the stale one.
        let cached = ctx
            .store
            .get(&asset.identity(), &producer.id())
            .await
            .unwrap()
            .unwrap();
        assert!(cached.contains_key("counting_scores"));
    }

    #[tokio::test]
    async fn test_wrong_shaped_production_is_fatal() {
        let ctx = test_ctx();
        let producer = CountingProducer::broken();
        let asset = test_asset(0);

        let err = producer.run_on_asset(&ctx, &asset).await.unwrap_err();
        assert!(matches!(err, EngineError::CacheInconsistency { .. }));

        // Nothing wrong-shaped was cached.
        assert!(ctx
            .store
            .get(&asset.identity(), &producer.id())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_remove_result_clears_cache_row() {
        let ctx = test_ctx();
        let producer = CountingProducer::new();
        let asset = test_asset(0);

        producer.run_on_asset(&ctx, &asset).await.unwrap();
        producer.remove_result(&ctx, &asset).await.unwrap();

        producer.run_on_asset(&ctx, &asset).await.unwrap();
        assert_eq!(producer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remove_log_on_missing_file_is_ok() {
        let ctx = test_ctx();
        let producer = CountingProducer::new();
        producer.remove_log(&ctx, &test_asset(0)).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_batch_preserves_input_order() {
        let ctx = Arc::new(RunContext::new(
            EngineConfig {
                max_parallel_assets: 4,
                ..EngineConfig::default()
            },
            Arc::new(MemoryResultStore::new()),
        )
        .unwrap());
        let producer: Arc<dyn Producer> = Arc::new(CountingProducer::new());

        let assets: Vec<Asset> = (0..8).map(test_asset).collect();
        let expected_ids: Vec<String> = assets.iter().map(Asset::identity).collect();

        let results = run_batch(producer, ctx, assets).await.unwrap();
        let got_ids: Vec<String> = results.iter().map(|r| r.asset_id.clone()).collect();
        assert_eq!(got_ids, expected_ids);
    }
}
