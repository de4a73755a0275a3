//! CLI `doctor` command: check files, counts, and store consistency.

use anyhow::Result;
use std::path::Path;

use barkeep::catalog::Catalog;
use barkeep::config::BarkeepConfig;
use barkeep::embedding::local::ModelFiles;
use barkeep::embedding::EMBEDDING_DIM;
use barkeep::index::FlatIndex;
use barkeep::preferences::PreferenceStore;

pub fn doctor(config: &BarkeepConfig) -> Result<()> {
    let catalog_path = config.resolved_catalog_path();
    let index_path = config.resolved_catalog_index_path();
    let prefs_path = config.resolved_preferences_index_path();
    let model = ModelFiles::in_cache(&config.embedding);

    println!("Barkeep Health Report");
    println!("=====================");
    println!();
    println!("Embedding model:   {}", config.embedding.model);
    println!("  ONNX model:      {}", presence(&model.model));
    println!("  Tokenizer:       {}", presence(&model.tokenizer));
    if !model.present() {
        println!("  Run `barkeep model download` to fetch the model.");
    }
    println!();

    println!("Catalog:           {}", catalog_path.display());
    let catalog = match Catalog::load(&catalog_path) {
        Ok(catalog) => {
            println!("  Records:         {}", catalog.len());
            Some(catalog)
        }
        Err(e) => {
            println!("  ERROR:           {e}");
            None
        }
    };

    println!("Catalog index:     {}", index_path.display());
    if index_path.exists() {
        match FlatIndex::load(&index_path) {
            Ok(index) => {
                println!("  Rows:            {}", index.size());
                println!("  Dimension:       {}", index.dimension());
                if let Some(catalog) = &catalog {
                    if catalog.matches_keys(index.keys()) {
                        println!("  Status:          OK (matches catalog)");
                    } else {
                        println!("  WARNING: index is out of date. Run `barkeep build-index`.");
                    }
                }
            }
            Err(e) => println!("  ERROR:           {e}"),
        }
    } else {
        println!("  Not built. Run `barkeep build-index`.");
    }
    println!();

    println!("Preferences:       {}", prefs_path.display());
    println!("  Policy:          {}", config.preferences.history_policy);
    match PreferenceStore::open(&prefs_path, EMBEDDING_DIM, config.preferences.history_policy) {
        Ok(store) => {
            println!("  Users:           {}", store.len());
            println!("  Vectors:         {}", store.index().size());
            let report = store.check_consistency();
            if report.is_consistent() {
                println!("  Status:          OK (mapping and index agree)");
            } else {
                println!(
                    "  WARNING: {} user(s) without a vector, {} orphan vector(s).",
                    report.missing_vectors.len(),
                    report.orphan_vectors.len()
                );
                println!("  They are repaired the next time `barkeep serve` starts.");
            }
        }
        Err(e) => println!("  ERROR:           {e}"),
    }

    Ok(())
}

fn presence(path: &Path) -> String {
    if path.exists() {
        format!("found ({})", path.display())
    } else {
        format!("missing ({})", path.display())
    }
}
