pub mod command;
pub mod core;

pub use crate::core::directory::{
    DirectorySource, FileDirectory, HttpDirectory, RedisDirectory, ServerRecords,
};
pub use crate::core::facade::FsRouter;
pub use crate::core::link::Link;
pub use crate::core::refresh::{RefreshConfig, RefreshHandle, Refresher, start_refresher};
pub use crate::core::registry::Registry;
pub use crate::core::server::{Cluster, Server};
