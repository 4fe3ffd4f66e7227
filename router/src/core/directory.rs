use anyhow::{Context, anyhow};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use common::schemas::ServerRecord;
use common::url_utils::sanitize_url;

/// Server records of one cluster, keyed by server id.
pub type ServerRecords = HashMap<String, ServerRecord>;

/// System of record for cluster membership, capacity and heartbeats.
///
/// The refresher issues one `fetch_cluster` per cluster per cycle. A missing
/// cluster is an empty map, not an error.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    async fn fetch_cluster(&self, cluster_id: &str) -> anyhow::Result<ServerRecords>;
}

/// Directory served over HTTP: `GET {base}/clusters/{cluster_id}` returns a
/// JSON object of server records.
#[derive(Clone, Debug)]
pub struct HttpDirectory {
    http: Client,
    base_url: String,
}

impl HttpDirectory {
    pub fn new(http: Client, base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http,
            base_url: sanitize_url(base_url)?,
        })
    }

    pub fn cluster_url(&self, cluster_id: &str) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("directory URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .push("clusters")
            .push(cluster_id);
        Ok(url)
    }
}

#[async_trait]
impl DirectorySource for HttpDirectory {
    async fn fetch_cluster(&self, cluster_id: &str) -> anyhow::Result<ServerRecords> {
        let url = self.cluster_url(cluster_id)?;
        let resp = self.http.get(url.clone()).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(cluster_id, "directory has no entry for cluster");
            return Ok(ServerRecords::new());
        }

        let resp = resp
            .error_for_status()
            .with_context(|| format!("directory request {} failed", url))?;
        let records: ServerRecords = resp.json().await?;
        Ok(records)
    }
}

/// Directory kept in a JSON file of the form `{cluster_id: {server_id: record}}`.
/// The file is re-read on every fetch so edits show up on the next cycle.
#[derive(Clone, Debug)]
pub struct FileDirectory {
    path: PathBuf,
}

impl FileDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DirectorySource for FileDirectory {
    async fn fetch_cluster(&self, cluster_id: &str) -> anyhow::Result<ServerRecords> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read directory file {}", self.path.display()))?;
        let mut all: HashMap<String, ServerRecords> = serde_json::from_slice(&raw)
            .with_context(|| format!("invalid directory file {}", self.path.display()))?;

        Ok(all.remove(cluster_id).unwrap_or_default())
    }
}

/// Directory kept in Redis: one hash per cluster under the cluster id, with
/// server ids as fields and JSON server records as values.
pub struct RedisDirectory {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisDirectory {
    /// `url` is `redis://[:password@]host[:port][/db]`.
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client =
            redis::Client::open(url).with_context(|| format!("invalid redis URL {}", url))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> anyhow::Result<MultiplexedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to redis")?;
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl DirectorySource for RedisDirectory {
    async fn fetch_cluster(&self, cluster_id: &str) -> anyhow::Result<ServerRecords> {
        let mut conn = self.connection().await?;

        let res: redis::RedisResult<HashMap<String, String>> = conn.hgetall(cluster_id).await;
        let fields = match res {
            Ok(fields) => fields,
            Err(e) => {
                // redial on the next cycle
                self.conn.lock().await.take();
                return Err(e).with_context(|| format!("HGETALL {} failed", cluster_id));
            }
        };

        decode_hash(cluster_id, fields)
    }
}

/// Decodes the fields of a cluster hash. A missing key reads as an empty hash,
/// so an unknown cluster is an empty map.
pub fn decode_hash(
    cluster_id: &str,
    fields: HashMap<String, String>,
) -> anyhow::Result<ServerRecords> {
    if fields.is_empty() {
        debug!(cluster_id, "redis has no hash for cluster");
    }

    fields
        .into_iter()
        .map(|(server_id, raw)| {
            let record: ServerRecord = serde_json::from_str(&raw).with_context(|| {
                warn!(cluster_id, server_id = %server_id, "undecodable server record");
                format!("invalid record for {}:{}", cluster_id, server_id)
            })?;
            Ok((server_id, record))
        })
        .collect()
}
