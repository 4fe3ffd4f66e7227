use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::server::{Cluster, Server};

pub type ClusterMap = HashMap<String, Arc<Cluster>>;

/// Snapshot of every known cluster.
///
/// Readers load the current map without locking. Writers never mutate a
/// published cluster; they publish a new map in which one cluster entry has
/// been replaced as a whole.
pub struct Registry {
    clusters: ArcSwap<ClusterMap>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("clusters", &self.cluster_ids())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            clusters: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn snapshot(&self) -> Arc<ClusterMap> {
        self.clusters.load_full()
    }

    /// Publishes `cluster`, replacing any previous entry with the same id.
    pub fn install(&self, cluster: Cluster) {
        let cluster = Arc::new(cluster);
        self.clusters.rcu(|current| {
            let mut next = ClusterMap::clone(current);
            next.insert(cluster.id.clone(), Arc::clone(&cluster));
            next
        });
    }

    pub fn get_cluster(&self, cluster_id: &str) -> Option<Arc<Cluster>> {
        self.clusters.load().get(cluster_id).cloned()
    }

    pub fn get_server(&self, cluster_id: &str, server_id: &str) -> Option<Server> {
        self.clusters
            .load()
            .get(cluster_id)
            .and_then(|c| c.get(server_id))
            .cloned()
    }

    /// Finds the server whose public address is `url_prefix`.
    pub fn reverse_lookup(&self, url_prefix: &str) -> Option<(String, String)> {
        let clusters = self.clusters.load();
        clusters.values().find_map(|cluster| {
            cluster
                .find_by_proxy(url_prefix)
                .map(|s| (s.cluster_id.clone(), s.server_id.clone()))
        })
    }

    pub fn cluster_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clusters.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.load().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::schemas::ServerRecord;

    fn server(cluster: &str, id: &str, proxy: &str) -> Server {
        let record = ServerRecord {
            proxy_address: proxy.to_string(),
            local_address: format!("http://10.0.0.1/{}", id),
            ..Default::default()
        };
        Server::from_record(cluster, id, record, true)
    }

    #[test]
    fn empty_registry_finds_nothing() {
        let registry = Registry::new();
        assert!(registry.get_server("static", "s1").is_none());
        assert!(registry.get_cluster("static").is_none());
        assert!(registry.reverse_lookup("http://img.example.com/").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn install_replaces_whole_cluster() {
        let registry = Registry::new();
        registry.install(Cluster::with_servers(
            "static",
            [server("static", "s1", "http://a/"), server("static", "s2", "http://b/")],
        ));
        let before = registry.get_cluster("static").unwrap();

        registry.install(Cluster::with_servers("static", [server("static", "s3", "http://c/")]));

        assert!(registry.get_server("static", "s1").is_none());
        assert!(registry.get_server("static", "s3").is_some());
        // earlier readers keep their complete view
        assert_eq!(before.len(), 2);
    }

    #[test]
    fn install_leaves_other_clusters_alone() {
        let registry = Registry::new();
        registry.install(Cluster::with_servers("a", [server("a", "s1", "http://a/")]));
        registry.install(Cluster::with_servers("b", [server("b", "s1", "http://b/")]));

        assert_eq!(registry.cluster_ids(), vec!["a".to_string(), "b".to_string()]);
        registry.install(Cluster::new("a"));
        assert!(registry.get_cluster("a").is_some_and(|c| c.is_empty()));
        assert!(registry.get_server("b", "s1").is_some());
    }

    #[test]
    fn reverse_lookup_ignores_trailing_separator() {
        let registry = Registry::new();
        registry.install(Cluster::with_servers(
            "cluster1",
            [server("cluster1", "serverA", "http://img.example.com/")],
        ));

        let expected = Some(("cluster1".to_string(), "serverA".to_string()));
        assert_eq!(registry.reverse_lookup("http://img.example.com/"), expected);
        assert_eq!(registry.reverse_lookup("http://img.example.com"), expected);
        assert_eq!(registry.reverse_lookup("http://other.example.com/"), None);
    }
}
