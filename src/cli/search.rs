use anyhow::Result;
use std::sync::Arc;

use barkeep::config::BarkeepConfig;
use barkeep::context::AdvisorContext;

/// Run a catalog search from the terminal.
pub async fn search(config: BarkeepConfig, query: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);
    let context = Arc::new(tokio::task::spawn_blocking(move || AdvisorContext::open(config)).await??);

    let hits = context.search(query.to_string(), top_k).await?;

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Top {} match(es) for \"{query}\":\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "  {}. {} [{}] (distance: {:.4})",
            i + 1,
            hit.record.name,
            hit.record.id,
            hit.distance
        );

        let ingredients: Vec<String> = hit
            .record
            .ingredients
            .iter()
            .enumerate()
            .map(|(j, name)| match hit.record.ingredient_measures.get(j) {
                Some(measure) if !measure.trim().is_empty() => {
                    format!("{} {name}", measure.trim())
                }
                _ => name.clone(),
            })
            .collect();
        println!("     {}", ingredients.join(", "));
        println!();
    }

    Ok(())
}
