//! `tutorgraph sync`: Export the corpus for the trainer.

use tutorgraph_config::AppConfig;

use super::runtime;

pub async fn run(config: AppConfig, if_needed: bool) -> Result<(), Box<dyn std::error::Error>> {
    let engine = runtime::engine(config).await?;
    let report = if if_needed {
        engine.sync_if_needed().await?
    } else {
        engine.sync().await?
    };

    if report.skipped {
        println!("✅ Export is current ({} exemplars)", report.exemplars);
    } else {
        println!("📦 Exported {} exemplars", report.exemplars);
        println!("   {}", report.exemplars_path.display());
        println!("   {} ({} token groups)", report.tokens_path.display(), report.token_groups);
    }

    Ok(())
}
