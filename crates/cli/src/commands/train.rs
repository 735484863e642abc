//! `tutorgraph train`: Run the configured trainer on the token export.

use tutorgraph_config::AppConfig;
use tutorgraph_embedding::Trainer;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let data = config.tokens_path();
    let model = config.model_path();
    if let Some(parent) = model.parent() {
        std::fs::create_dir_all(parent)?;
    }

    println!("🧪 Training with {}", config.embedding.trainer_program);
    println!("   Data:  {}", data.display());
    println!("   Model: {}", model.display());

    let report = Trainer::from_config(&config).train(&data, &model).await?;

    println!("✅ Model written in {:.1}s", report.elapsed.as_secs_f64());
    if !report.log.is_empty() {
        println!("{}", report.log);
    }

    Ok(())
}
