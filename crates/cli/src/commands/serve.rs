//! `tutorgraph serve`: Start the HTTP API server.

use tracing::warn;
use tutorgraph_config::AppConfig;

use super::runtime;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🎓 tutorgraph Gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:      {}", config.store.backend);
    println!("   Embedding:  {}", config.embedding.backend);
    println!("   Export dir: {}", config.sync.output_dir.display());

    let engine = runtime::engine(config).await?;

    if let Err(e) = engine.sync_if_needed().await {
        warn!(error = %e, "Startup corpus sync failed");
    }
    let _listener = engine.start_sync_listener();

    tutorgraph_gateway::start(engine).await?;

    Ok(())
}
