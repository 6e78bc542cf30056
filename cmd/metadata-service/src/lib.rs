pub mod cli;
pub mod config;
pub mod error;
pub mod server;
pub mod shard;
pub mod store;

pub use cli::*;
pub use config::{Config, ConfigError};
pub use error::MetadataError;
pub use shard::{BlockShard, ShardError, ShardSet};
pub use store::*;
