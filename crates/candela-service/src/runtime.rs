//! Service runtime wiring.

use candela_backfill::{ClientConfig, KlineClient, backfill_symbol};
use candela_publish::RedisPublisher;
use candela_store::{CandleStore, PoolConfig, RollupRefresher, create_pool};
use candela_types::{BaseCandle, CandelaError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::guard::BackfillGuard;
use crate::ingest::Ingestor;

/// Owns the connected collaborators and runs the service loops.
///
/// Startup is ordered: store first (fatal if unreachable — the service
/// never serves ingestion without durable state), then Redis (fatal),
/// then gap recovery for every symbol, and only then the ingestion loop
/// and the maintenance schedulers.
pub struct Runtime {
    config: Config,
    store: Arc<CandleStore>,
    publisher: Arc<RedisPublisher>,
    kline_client: KlineClient,
    guard: BackfillGuard,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Connects to the store and Redis and prepares the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or Redis cannot be reached, or the
    /// HTTP client cannot be built. All are fatal at startup.
    pub async fn connect(config: Config) -> Result<Self> {
        let pool = create_pool(&config.database_url, &PoolConfig::default())
            .await
            .map_err(|e| CandelaError::Store(e.to_string()))?;
        let store = Arc::new(CandleStore::new(pool));

        let publisher = Arc::new(
            RedisPublisher::connect(&config.redis_url)
                .await
                .map_err(|e| CandelaError::Publish(e.to_string()))?,
        );

        let kline_client = KlineClient::new(ClientConfig {
            base_url: config.rest_base_url.clone(),
            ..ClientConfig::default()
        })
        .map_err(|e| CandelaError::Http(e.to_string()))?;

        Ok(Self {
            config,
            store,
            publisher,
            kline_client,
            guard: BackfillGuard::new(),
        })
    }

    /// Returns the store handle.
    #[must_use]
    pub fn store(&self) -> Arc<CandleStore> {
        Arc::clone(&self.store)
    }

    /// Returns the backfill guard.
    #[must_use]
    pub fn guard(&self) -> BackfillGuard {
        self.guard.clone()
    }

    /// Repairs gaps for every configured symbol, concurrently, holding a
    /// guard token per symbol so cleanup stays out of the way.
    ///
    /// Per-symbol failures are logged; one broken symbol never blocks the
    /// others. Returns the total number of rows recovered.
    pub async fn recover_gaps(&self) -> u64 {
        let tasks = self.config.symbols.iter().map(|symbol| async move {
            let _token = self.guard.begin(symbol);
            match backfill_symbol(
                self.store.as_ref(),
                &self.kline_client,
                symbol,
                self.config.backfill_max_lookback,
                self.config.backfill_batch,
            )
            .await
            {
                Ok(report) => report.inserted,
                Err(e) => {
                    tracing::error!(symbol, error = %e, "startup backfill failed");
                    0
                }
            }
        });
        let recovered: u64 = futures::future::join_all(tasks).await.into_iter().sum();
        tracing::info!(recovered, "gap recovery finished");
        recovered
    }

    /// Runs the full service until shutdown is signalled.
    ///
    /// `feed` is the external stream collaborator's interface: a channel
    /// of base candle updates. Spawns the cleanup and rollup schedulers,
    /// then drains the feed in this task.
    pub async fn run(&self, feed: mpsc::Receiver<BaseCandle>, shutdown: watch::Receiver<bool>) {
        self.recover_gaps().await;

        let cleanup_store = self.store();
        let cleanup_guard = self.guard();
        let retention = self.config.retention;
        let cleanup_interval = self.config.cleanup_interval;
        let cleanup_shutdown = shutdown.clone();
        let cleanup = tokio::spawn(async move {
            crate::cleanup::run_cleanup_scheduler(
                cleanup_store.as_ref(),
                cleanup_guard,
                retention,
                cleanup_interval,
                cleanup_shutdown,
            )
            .await;
        });

        let refresher = RollupRefresher::new(self.store.pool().clone());
        let rollup_interval = self.config.rollup_interval;
        let rollup_shutdown = shutdown.clone();
        let rollup = tokio::spawn(async move {
            run_rollup_scheduler(refresher, rollup_interval, rollup_shutdown).await;
        });

        let coordinator = Arc::new(Coordinator::new(
            self.store(),
            Arc::clone(&self.publisher),
            Arc::clone(&self.publisher),
            self.config.timeframes.clone(),
        ));
        let ingestor = Ingestor::new(self.store(), coordinator);
        ingestor.run(feed, shutdown).await;

        // The schedulers watch the same shutdown signal; give them a
        // grace period to finish an in-flight round.
        let drain = async {
            let _ = cleanup.await;
            let _ = rollup.await;
        };
        if tokio::time::timeout(Duration::from_secs(5), drain).await.is_err() {
            tracing::warn!("maintenance tasks did not stop within the grace period");
        }
    }
}

/// Periodic continuous-aggregate refresh scheduler.
///
/// Keeps reader lag on the coarse rollup views bounded. Failures are
/// logged per view inside the refresher and retried on the next tick.
pub async fn run_rollup_scheduler(
    refresher: RollupRefresher,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "rollup refresh scheduler started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let refreshed = refresher.refresh_all().await;
                tracing::debug!(refreshed, "rollup refresh sweep finished");
            }
            _ = shutdown.changed() => {
                tracing::info!("rollup refresh scheduler stopping");
                return;
            }
        }
    }
}
