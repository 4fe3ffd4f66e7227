use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::api_error::RouteError;
use crate::constants::STATE_OK;

/// One server as published by the directory source.
///
/// Field names follow the directory's wire format, which predates this crate.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServerRecord {
    pub cluster_id: String,
    pub server_id: String,
    #[serde(rename = "Local")]
    pub local_address: String,
    #[serde(rename = "Proxy")]
    pub proxy_address: String,
    #[serde(rename = "Ut")]
    pub update_timestamp: i64, // heartbeat marker, opaque
    #[serde(rename = "RatedSpace")]
    pub rated_space_mb: i64,
    #[serde(rename = "FreeSpace")]
    pub free_space_mb: i64,
    #[serde(rename = "Cpu")]
    pub cpu_load: i64,
    #[serde(rename = "Mem")]
    pub memory_used_mb: i64,
    #[serde(rename = "MemFree")]
    pub memory_free_mb: i64,
    pub load_average: i64,
}

/// Response envelope used by every file-server endpoint except raw reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JsonResult<T> {
    #[serde(default)]
    pub state: i32,
    pub data: Option<T>,
    #[serde(default)]
    pub err: Option<Value>,
}

impl<T> JsonResult<T> {
    pub fn into_data(self) -> Result<Option<T>, RouteError> {
        if self.state != STATE_OK {
            let reason = match self.err {
                Some(Value::String(s)) => s,
                Some(Value::Null) | None => format!("state {}", self.state),
                Some(Value::Object(o)) if o.is_empty() => format!("state {}", self.state),
                Some(other) => other.to_string(),
            };
            return Err(RouteError::UpstreamRejected(reason));
        }
        Ok(self.data)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FileInfo {
    pub name: String,
    pub size: i64,
    pub mode: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub mode_time: OffsetDateTime,
    pub is_dir: bool,
    #[serde(default)]
    pub raw_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageTransformParam {
    pub file_path: String,
    pub crop: Vec<i64>,
    pub resize: Vec<Vec<i64>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VideoCompressParam {
    pub file: String,
    pub progress_redis_key: String,
    pub video_id: i64,
}

/// Storage collection a written file is filed under on the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Image,
    Video,
    Epub,
    Txt,
    Pdf,
    Bin,
    Office,
    Zip,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Image,
        Collection::Video,
        Collection::Epub,
        Collection::Txt,
        Collection::Pdf,
        Collection::Bin,
        Collection::Office,
        Collection::Zip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Image => "image",
            Collection::Video => "video",
            Collection::Epub => "epub",
            Collection::Txt => "txt",
            Collection::Pdf => "pdf",
            Collection::Bin => "bin",
            Collection::Office => "office",
            Collection::Zip => "zip",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RouteError::InvalidArgument(format!("unknown collection: {}", s)))
    }
}
