use crate::core::server::{Cluster, Server};

/// Picks the available server with the most free space.
///
/// Ties keep the first server in iteration order. `None` means the cluster has
/// no capacity to offer and the write must not be attempted.
pub fn choose_server(cluster: &Cluster) -> Option<&Server> {
    cluster
        .servers()
        .filter(|s| s.available)
        .fold(None, |best: Option<&Server>, s| match best {
            Some(b) if b.free_space_mb >= s.free_space_mb => Some(b),
            _ => Some(s),
        })
}
