pub mod balance;
pub mod directory;
pub mod facade;
pub mod fs_client;
pub mod link;
pub mod link_serde;
pub mod refresh;
pub mod registry;
pub mod server;
pub mod staleness;
