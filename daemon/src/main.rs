use lore_daemon::DaemonOptions;
use lore_daemon::run_daemon;
use lore_engine::Engine;
use lore_engine::EngineConfig;
use lore_retrieval::CollectionSet;
use std::sync::Arc;
use tracing::warn;

/// Daemon entrypoint. Corpus backends (embedder, collections, research
/// lookup) are wired in by the embedding host; started bare, the daemon
/// serves guidance-only results until backends are registered.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let engine =
        Engine::bootstrap(EngineConfig::default(), CollectionSet::new(), None, None).await?;
    warn!("started without corpus backends; queries resolve through guidance only");

    run_daemon(Arc::new(engine), DaemonOptions::default()).await
}
