//! `tutorgraph doctor`: Diagnose system health.

use std::path::Path;
use tutorgraph_config::{AppConfig, ConfigError};

use super::runtime;

pub async fn run(
    config_path: Option<&Path>,
    loaded: Result<AppConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 tutorgraph Doctor: System Diagnostics");
    println!("=========================================\n");

    let mut issues = 0;

    // Config
    let default_path = AppConfig::config_dir().join("config.toml");
    let path = config_path.unwrap_or(&default_path);
    let config = match loaded {
        Ok(config) => {
            if path.exists() {
                println!("  ✅ Config file valid ({})", path.display());
            } else {
                println!("  ⚠️  No config file at {}, using defaults", path.display());
            }
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running other checks.");
            return Ok(());
        }
    };

    // Store
    let engine = match runtime::engine(config.clone()).await {
        Ok(engine) => engine,
        Err(e) => {
            println!("  ❌ Store ({}) cannot be opened: {e}", config.store.backend);
            println!("\n  ⚠️  1 blocking issue found.");
            return Ok(());
        }
    };
    match engine.store().health_check().await {
        Ok(_) => {
            let count = engine.store().count_active().await.unwrap_or(0);
            println!(
                "  ✅ Store reachable ({}, {count} active exemplars)",
                engine.store().name()
            );
        }
        Err(e) => {
            println!("  ❌ Store unreachable: {e}");
            issues += 1;
        }
    }

    // Embedding model
    let model = config.model_path();
    if config.embedding.backend == "none" {
        println!("  ⚠️  Embedding disabled, retrieval uses keyword overlap only");
    } else if engine.gateway().is_trained() {
        println!("  ✅ Embedding model present ({})", model.display());
    } else {
        println!(
            "  ⚠️  No trained model at {}; run `tutorgraph sync` then `tutorgraph train`",
            model.display()
        );
        issues += 1;
    }

    // Corpus export
    match engine.corpus_sync().needs_sync().await {
        Ok(false) => println!("  ✅ Corpus export is current"),
        Ok(true) => {
            println!("  ⚠️  Corpus export missing or stale; run `tutorgraph sync`");
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Corpus export check failed: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
