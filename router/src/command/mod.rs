pub mod choose;
pub mod common;
pub mod files;
pub mod resolve;
pub mod watch;
