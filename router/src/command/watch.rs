use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::command::common::DirectoryArgs;
use crate::core::registry::Registry;
use crate::core::refresh::Refresher;

#[derive(Parser, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    directory: DirectoryArgs,
}

/// Keeps the registry refreshed and logs every cluster after each cycle,
/// until Ctrl+C.
pub async fn watch(args: WatchArgs) -> anyhow::Result<()> {
    let http = args.directory.http_client()?;
    let source = args.directory.source(http)?;
    let config = args.directory.refresh_config(&[])?;
    let period = config.tick_period();

    let registry = Arc::new(Registry::new());
    let mut refresher = Refresher::new(Arc::clone(&registry), source, config);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let ctrl_c = tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    loop {
        let report = refresher.refresh_once().await;
        for failure in &report.failed {
            warn!("{failure}");
        }
        log_registry(&registry);

        tokio::select! {
            _ = tokio::time::sleep(period) => {},
            res = shutdown_rx.changed() => {
                if res.is_err() || *shutdown_rx.borrow() { break; }
            }
        }
    }

    ctrl_c.abort();
    info!("watch stopped");

    Ok(())
}

fn log_registry(registry: &Registry) {
    let snapshot = registry.snapshot();
    for cluster_id in registry.cluster_ids() {
        let Some(cluster) = snapshot.get(&cluster_id) else {
            continue;
        };
        for server in cluster.servers() {
            info!(
                cluster_id = %cluster_id,
                server_id = %server.server_id,
                available = server.available,
                free_space_mb = server.free_space_mb,
                load_average = server.load_average,
                proxy = %server.proxy_address,
                "server"
            );
        }
    }
}
