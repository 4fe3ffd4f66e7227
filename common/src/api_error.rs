use std::io;

#[derive(thiserror::Error, Debug)]
pub enum RouteError {
    #[error("malformed address: {0}")]
    MalformedAddress(String),
    #[error("no such server: {cluster_id}:{server_id}")]
    ServerNotFound {
        cluster_id: String,
        server_id: String,
    },
    #[error("no such cluster: {0}")]
    ClusterNotFound(String),
    #[error("cluster '{0}' has no available server")]
    NoAvailableServer(String),
    #[error("directory source unavailable for cluster '{cluster_id}': {reason}")]
    DirectorySourceUnavailable { cluster_id: String, reason: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("upstream request failed: {0}")]
    UpstreamReq(#[from] reqwest::Error),
    #[error("upstream status {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("upstream rejected the call: {0}")]
    UpstreamRejected(String),
    #[error("undecodable upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

impl RouteError {
    pub fn server_not_found(cluster_id: &str, server_id: &str) -> Self {
        RouteError::ServerNotFound {
            cluster_id: cluster_id.to_string(),
            server_id: server_id.to_string(),
        }
    }
}
