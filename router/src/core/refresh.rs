use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, timeout};
use tracing::{debug, info, warn};

use common::api_error::RouteError;
use common::constants::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_REFRESH_SECS, DEFAULT_STALE_TOLERANCE};

use crate::core::directory::{DirectorySource, ServerRecords};
use crate::core::registry::Registry;
use crate::core::server::{Cluster, Server};
use crate::core::staleness::StalenessTracker;

/// Shortest period the refresh loop ticks at.
pub const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(10);

#[derive(Clone, Debug)]
pub struct RefreshConfig {
    pub cluster_ids: Vec<String>,
    pub refresh_period: Duration,
    pub fetch_timeout: Duration,
    pub stale_tolerance: u32,
}

impl RefreshConfig {
    pub fn new(cluster_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            cluster_ids: cluster_ids.into_iter().map(Into::into).collect(),
            refresh_period: Duration::from_secs(DEFAULT_REFRESH_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            stale_tolerance: DEFAULT_STALE_TOLERANCE,
        }
    }

    pub fn with_refresh_period(mut self, period: Duration) -> Self {
        self.refresh_period = period;
        self
    }

    /// Loop period, raised to [`MIN_REFRESH_PERIOD`] when set lower.
    pub fn tick_period(&self) -> Duration {
        self.refresh_period.max(MIN_REFRESH_PERIOD)
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_stale_tolerance(mut self, tolerance: u32) -> Self {
        self.stale_tolerance = tolerance;
        self
    }
}

/// Outcome of one refresh cycle. Failures stay here; they never reach readers.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<RouteError>,
}

impl RefreshReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetches every cluster concurrently and publishes each one that succeeded.
/// A cluster whose fetch fails or times out keeps its previous snapshot.
pub async fn refresh(
    registry: &Registry,
    source: &dyn DirectorySource,
    tracker: &mut StalenessTracker,
    cluster_ids: &[String],
    fetch_timeout: Duration,
) -> RefreshReport {
    let fetches = cluster_ids.iter().map(|cluster_id| async move {
        let res = match timeout(fetch_timeout, source.fetch_cluster(cluster_id)).await {
            Ok(Ok(records)) => Ok(records),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!("fetch timed out after {:?}", fetch_timeout)),
        };
        (cluster_id, res)
    });

    let mut report = RefreshReport::default();
    for (cluster_id, res) in join_all(fetches).await {
        match res {
            Ok(records) => {
                let cluster = build_cluster(registry, tracker, cluster_id, records);
                debug!(
                    cluster_id = %cluster_id,
                    servers = cluster.len(),
                    available = cluster.available_count(),
                    "cluster refreshed"
                );
                registry.install(cluster);
                report.refreshed.push(cluster_id.clone());
            }
            Err(reason) => {
                warn!(cluster_id = %cluster_id, "directory fetch failed, keeping previous snapshot: {reason}");
                report.failed.push(RouteError::DirectorySourceUnavailable {
                    cluster_id: cluster_id.clone(),
                    reason,
                });
            }
        }
    }
    report
}

fn build_cluster(
    registry: &Registry,
    tracker: &mut StalenessTracker,
    cluster_id: &str,
    records: ServerRecords,
) -> Cluster {
    let previous = registry.get_cluster(cluster_id);

    let servers = records.into_iter().map(|(server_id, record)| {
        if record.server_id != server_id || record.cluster_id != cluster_id {
            debug!(
                cluster_id,
                server_id = %server_id,
                record_cluster = %record.cluster_id,
                record_server = %record.server_id,
                "record ids differ from directory keys, using the keys"
            );
        }

        let available = tracker.observe(cluster_id, &server_id, record.update_timestamp);
        let was_available = previous
            .as_ref()
            .and_then(|c| c.get(&server_id))
            .map(|s| s.available);
        match (was_available, available) {
            (Some(true), false) => warn!(cluster_id, server_id = %server_id, "server stopped heartbeating, excluded"),
            (Some(false), true) => info!(cluster_id, server_id = %server_id, "server heartbeating again, restored"),
            _ => {}
        }

        Server::from_record(cluster_id, &server_id, record, available)
    });

    Cluster::with_servers(cluster_id, servers.collect::<Vec<_>>())
}

/// Owns the staleness state and keeps one registry up to date.
pub struct Refresher {
    registry: Arc<Registry>,
    source: Arc<dyn DirectorySource>,
    tracker: StalenessTracker,
    config: RefreshConfig,
}

impl Refresher {
    pub fn new(
        registry: Arc<Registry>,
        source: Arc<dyn DirectorySource>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            registry,
            source,
            tracker: StalenessTracker::new(config.stale_tolerance),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub async fn refresh_once(&mut self) -> RefreshReport {
        refresh(
            &self.registry,
            self.source.as_ref(),
            &mut self.tracker,
            &self.config.cluster_ids,
            self.config.fetch_timeout,
        )
        .await
    }

    /// Refreshes every period until `shutdown` turns true or its sender is
    /// dropped. The first tick fires one full period from now.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let period = self.config.tick_period();
        let mut tick = tokio::time::interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {},
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() { break; }
                    continue;
                }
            }

            let report = self.refresh_once().await;
            debug!(
                refreshed = report.refreshed.len(),
                failed = report.failed.len(),
                "refresh cycle done"
            );
        }

        info!("registry refresh loop stopped");

        Ok(())
    }
}

/// Handle on a spawned refresh loop.
pub struct RefreshHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl RefreshHandle {
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.handle.await?
    }
}

/// Loads the registry once before returning, so the first caller already sees
/// data, then keeps refreshing it in the background.
pub async fn start_refresher(
    source: Arc<dyn DirectorySource>,
    config: RefreshConfig,
) -> (Arc<Registry>, RefreshHandle, RefreshReport) {
    let registry = Arc::new(Registry::new());
    let mut refresher = Refresher::new(Arc::clone(&registry), source, config);

    let report = refresher.refresh_once().await;
    info!(
        clusters = ?report.refreshed,
        failed = report.failed.len(),
        "initial registry load done"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(refresher.run(shutdown_rx));

    (registry, RefreshHandle { shutdown_tx, handle }, report)
}
