//! `tutorgraph graph`: Print the knowledge graph as JSON.

use tutorgraph_config::AppConfig;
use tutorgraph_engine::{GraphFilter, filter_graph};

use super::runtime;

pub async fn run(
    config: AppConfig,
    categories: Vec<String>,
    tags: Vec<String>,
    search: Option<String>,
    user: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = runtime::engine(config).await?;
    let filter = GraphFilter {
        categories,
        tags,
        search,
    };

    let out = match user {
        Some(user_id) => {
            let mut augmented = engine.error_graph(&user_id, None).await?;
            augmented.graph = filter_graph(augmented.graph, &filter);
            serde_json::to_string_pretty(&augmented)?
        }
        None => serde_json::to_string_pretty(&engine.graph(&filter).await?)?,
    };
    println!("{out}");

    Ok(())
}
