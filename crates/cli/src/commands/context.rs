//! `tutorgraph context`: Assemble the response context for one message.

use tutorgraph_config::AppConfig;

use super::runtime;

pub async fn run(
    config: AppConfig,
    message: &str,
    user: Option<&str>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = runtime::engine(config).await?;
    let assembled = engine.context(message, user).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&assembled)?);
        return Ok(());
    }

    let ctx = &assembled.context;
    let meta = &assembled.metadata;
    println!("🔎 Intent:     {}", ctx.keywords.intent);
    println!("   Exemplars:  {}", ctx.exemplars.len());
    println!("   Exercises:  {}", ctx.exercises.len());
    if let Some(recs) = &ctx.error_based_recommendations {
        println!("   Remedies:   {}", recs.len());
    }
    if !ctx.suggested_topics.is_empty() {
        println!("   Topics:     {}", ctx.suggested_topics.join(", "));
    }
    println!(
        "   Took {}ms, ~{} tokens{}",
        meta.elapsed_ms,
        meta.preamble_tokens,
        if meta.degraded { " (degraded)" } else { "" }
    );
    println!();
    println!("{}", assembled.preamble);

    Ok(())
}
