use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tonic::transport::Server;

use metadata_service::shard::{BlockShard, RemoteBlockShard};
use metadata_service::{Cli, Config, MetadataStore, ShardSet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_log::LogTracer::init().context("Failed to set up LogTracer")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    tracing::info!(
        shards = config.shard_count(),
        replacement_policy = config.replacement_policy,
        "Loaded config from {}",
        cli.config.display()
    );

    let mut shards: Vec<Arc<dyn BlockShard>> = Vec::with_capacity(config.shard_count());
    for (index, addr) in config.shards.iter().enumerate() {
        let shard = RemoteBlockShard::connect(index as u32, addr, cli.connect_timeout()).await?;
        tracing::info!("Connected to block shard {} at {}", index, addr);
        shards.push(Arc::new(shard));
    }

    let shards = ShardSet::new(shards).with_timeout(cli.shard_timeout());
    tracing::info!(shards = shards.len(), "Block shards ready");
    let store = Arc::new(MetadataStore::new(shards, cli.version_policy()));

    let addr = tokio::net::lookup_host(&config.metadata_addr)
        .await
        .with_context(|| format!("Failed to resolve {}", config.metadata_addr))?
        .next()
        .with_context(|| format!("No address found for {}", config.metadata_addr))?;
    tracing::info!(policy = ?store.policy(), "Metadata service listening on {}", addr);

    Server::builder()
        .add_service(metadata_service::server::build_metastore_server(store))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
