use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::store::VersionPolicy;

#[derive(Parser, Debug)]
#[command(name = "metadata-service")]
#[command(about = "Tracks filename versions and block lists for the block store", long_about = None)]
pub struct Cli {
    /// Path to the cluster config file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Require creation to propose version 1 and revival to propose tombstone + 1
    #[arg(long)]
    pub strict_versions: bool,

    /// Upper bound on a single block-existence query
    #[arg(long, default_value_t = 5000)]
    pub shard_timeout_ms: u64,

    /// Upper bound on establishing each shard connection at startup
    #[arg(long, default_value_t = 1000)]
    pub connect_timeout_ms: u64,
}

impl Cli {
    pub fn version_policy(&self) -> VersionPolicy {
        if self.strict_versions {
            VersionPolicy::Strict
        } else {
            VersionPolicy::Lenient
        }
    }

    pub fn shard_timeout(&self) -> Duration {
        Duration::from_millis(self.shard_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
