use anyhow::bail;
use clap::Args;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use common::constants::{
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_REFRESH_SECS,
    DEFAULT_STALE_TOLERANCE,
};

use crate::core::directory::{DirectorySource, FileDirectory, HttpDirectory, RedisDirectory};
use crate::core::facade::FsRouter;
use crate::core::refresh::{RefreshConfig, RefreshHandle, start_refresher};

#[derive(Args, Debug, Clone)]
pub struct DirectoryArgs {
    /// Base URL of the HTTP directory service
    #[arg(long, conflicts_with = "directory_file")]
    pub directory_url: Option<String>,

    /// JSON file holding {cluster: {server: record}}
    #[arg(long)]
    pub directory_file: Option<PathBuf>,

    /// Redis holding one hash of server records per cluster
    #[arg(long, conflicts_with_all = ["directory_url", "directory_file"])]
    pub redis_url: Option<String>,

    /// Cluster ids to load (repeatable)
    #[arg(long = "cluster")]
    pub clusters: Vec<String>,

    /// Registry refresh period (seconds)
    #[arg(long, default_value_t = DEFAULT_REFRESH_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_secs: u64,

    /// Per-cluster directory fetch timeout (seconds)
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    pub fetch_timeout_secs: u64,

    /// Unchanged-heartbeat cycles tolerated before a server is excluded
    #[arg(long, default_value_t = DEFAULT_STALE_TOLERANCE)]
    pub stale_tolerance: u32,

    /// Timeout for directory and file-server HTTP requests (seconds)
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,
}

impl DirectoryArgs {
    pub fn http_client(&self) -> anyhow::Result<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .build()?)
    }

    pub fn source(&self, http: Client) -> anyhow::Result<Arc<dyn DirectorySource>> {
        match (&self.redis_url, &self.directory_url, &self.directory_file) {
            (Some(url), _, _) => Ok(Arc::new(RedisDirectory::new(url)?)),
            (None, Some(url), _) => Ok(Arc::new(HttpDirectory::new(http, url)?)),
            (None, None, Some(path)) => Ok(Arc::new(FileDirectory::new(path.clone()))),
            (None, None, None) => {
                bail!("no directory source; pass --redis-url, --directory-url or --directory-file")
            }
        }
    }

    /// Configured clusters plus `extra`, without duplicates.
    pub fn refresh_config(&self, extra: &[&str]) -> anyhow::Result<RefreshConfig> {
        let mut ids = self.clusters.clone();
        for id in extra {
            if !id.is_empty() && !ids.iter().any(|c| c == id) {
                ids.push(id.to_string());
            }
        }
        if ids.is_empty() {
            bail!("no cluster ids given; pass --cluster");
        }

        Ok(RefreshConfig::new(ids)
            .with_refresh_period(Duration::from_secs(self.refresh_secs))
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_stale_tolerance(self.stale_tolerance))
    }
}

/// Loads the registry and returns a router over it with the refresh loop
/// running in the background.
pub async fn connect(
    args: &DirectoryArgs,
    extra_clusters: &[&str],
) -> anyhow::Result<(FsRouter, RefreshHandle)> {
    let http = args.http_client()?;
    let source = args.source(http.clone())?;
    let config = args.refresh_config(extra_clusters)?;

    let (registry, handle, report) = start_refresher(source, config).await;
    for failure in &report.failed {
        warn!("{failure}");
    }

    Ok((FsRouter::new(registry, http), handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        directory: DirectoryArgs,
    }

    #[test]
    fn zero_refresh_period_is_rejected() {
        let res = Cli::try_parse_from(["router", "--directory-file", "d.json", "--refresh-secs", "0"]);
        assert!(res.is_err());

        let cli = Cli::try_parse_from(["router", "--directory-file", "d.json", "--refresh-secs", "5"]).unwrap();
        assert_eq!(cli.directory.refresh_secs, 5);
    }

    #[test]
    fn refresh_config_merges_clusters() {
        let cli = Cli::try_parse_from(["router", "--directory-file", "d.json", "--cluster", "c1"]).unwrap();
        let config = cli.directory.refresh_config(&["c2", "c1", ""]).unwrap();
        assert_eq!(config.cluster_ids, vec!["c1".to_string(), "c2".to_string()]);

        let cli = Cli::try_parse_from(["router", "--directory-file", "d.json"]).unwrap();
        assert!(cli.directory.refresh_config(&[]).is_err());
    }

    #[test]
    fn directory_sources_are_exclusive() {
        let res = Cli::try_parse_from([
            "router",
            "--redis-url",
            "redis://127.0.0.1/",
            "--directory-file",
            "d.json",
        ]);
        assert!(res.is_err());

        let cli = Cli::try_parse_from(["router", "--redis-url", "redis://127.0.0.1/"]).unwrap();
        assert!(cli.directory.source(Client::new()).is_ok());

        let cli = Cli::try_parse_from(["router"]).unwrap();
        assert!(cli.directory.source(Client::new()).is_err());
    }
}
