use serde::Serialize;
use std::collections::BTreeMap;

use common::constants::PATH_SEP;
use common::schemas::ServerRecord;

/// A storage node as seen through the latest registry snapshot.
///
/// Only built once an availability verdict exists for the record it came from.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Server {
    pub cluster_id: String,
    pub server_id: String,
    pub local_address: String, // direct file-server calls
    pub proxy_address: String, // public URLs
    pub update_timestamp: i64,
    pub rated_space_mb: i64,
    pub free_space_mb: i64,
    pub cpu_load: i64,
    pub memory_used_mb: i64,
    pub memory_free_mb: i64,
    pub load_average: i64,
    pub available: bool,
}

impl Server {
    pub fn from_record(
        cluster_id: &str,
        server_id: &str,
        record: ServerRecord,
        available: bool,
    ) -> Self {
        Server {
            cluster_id: cluster_id.to_string(),
            server_id: server_id.to_string(),
            local_address: record.local_address,
            proxy_address: record.proxy_address,
            update_timestamp: record.update_timestamp,
            rated_space_mb: record.rated_space_mb,
            free_space_mb: record.free_space_mb,
            cpu_load: record.cpu_load,
            memory_used_mb: record.memory_used_mb,
            memory_free_mb: record.memory_free_mb,
            load_average: record.load_average,
            available,
        }
    }

    pub fn key(&self) -> String {
        server_key(&self.cluster_id, &self.server_id)
    }

    /// Whether this server publishes `prefix` as its public address.
    /// A trailing separator on either side is ignored.
    pub fn serves_prefix(&self, prefix: &str) -> bool {
        let own = self.proxy_address.trim_end_matches(PATH_SEP);
        !own.is_empty() && own == prefix.trim_end_matches(PATH_SEP)
    }
}

pub fn server_key(cluster_id: &str, server_id: &str) -> String {
    format!("{}:{}", cluster_id, server_id)
}

/// Immutable set of servers sharing one storage pool, keyed by server id.
#[derive(Clone, Debug, Default)]
pub struct Cluster {
    pub id: String,
    servers: BTreeMap<String, Server>,
}

impl Cluster {
    pub fn new(id: impl Into<String>) -> Self {
        Cluster {
            id: id.into(),
            servers: BTreeMap::new(),
        }
    }

    pub fn with_servers(id: impl Into<String>, servers: impl IntoIterator<Item = Server>) -> Self {
        Cluster {
            id: id.into(),
            servers: servers
                .into_iter()
                .map(|s| (s.server_id.clone(), s))
                .collect(),
        }
    }

    pub fn get(&self, server_id: &str) -> Option<&Server> {
        self.servers.get(server_id)
    }

    /// Servers in ascending server id order.
    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.servers.values()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn available_count(&self) -> usize {
        self.servers.values().filter(|s| s.available).count()
    }

    pub fn find_by_proxy(&self, prefix: &str) -> Option<&Server> {
        self.servers.values().find(|s| s.serves_prefix(prefix))
    }
}
