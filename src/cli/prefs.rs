//! CLI `prefs` command: show one user's stored preferences.

use anyhow::{Context, Result};

use barkeep::config::BarkeepConfig;
use barkeep::embedding::EMBEDDING_DIM;
use barkeep::preferences::PreferenceStore;

const SIMILAR_USERS: usize = 3;

pub fn prefs(config: &BarkeepConfig, user_id: &str) -> Result<()> {
    let store = PreferenceStore::open(
        config.resolved_preferences_index_path(),
        EMBEDDING_DIM,
        config.preferences.history_policy,
    )
    .context("failed to open preference store")?;

    let prefs = store.get(user_id);
    if prefs.is_empty() {
        println!("No preferences stored for '{user_id}'.");
        return Ok(());
    }

    println!("Preferences for {user_id}");
    println!("{}", "=".repeat(40));
    println!("  Ingredients:  {}", list(prefs.ingredients.iter()));
    println!("  Cocktails:    {}", list(prefs.cocktails.iter()));
    if let Some(updated) = prefs.updated_at {
        println!("  Updated:      {}", updated.to_rfc3339());
    }

    let similar = store.similar_users(user_id, SIMILAR_USERS)?;
    if !similar.is_empty() {
        println!();
        println!("Similar tastes:");
        for user in similar {
            println!("  {:<20} (distance: {:.4})", user.user_id, user.distance);
        }
    }

    Ok(())
}

fn list<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let joined = items.map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "(none)".into()
    } else {
        joined
    }
}
