#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Barrier, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use barkeep::catalog::{Catalog, CatalogRecord};
use barkeep::config::BarkeepConfig;
use barkeep::embedding::EmbeddingProvider;
use barkeep::llm::CompletionClient;

pub const TEST_DIM: usize = 256;

/// Deterministic bag-of-words embedder: each lower-cased alphanumeric token
/// adds 1.0 to an FNV-1a bucket, then the vector is L2-normalized. Texts that
/// share words end up close together, which is all the tests rely on.
pub struct BagOfWords;

impl EmbeddingProvider for BagOfWords {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; TEST_DIM];
        for token in text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            v[fnv1a(&token.to_ascii_lowercase()) as usize % TEST_DIM] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

/// Embedder whose model is "down".
pub struct BrokenEmbedder;

impl EmbeddingProvider for BrokenEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("inference backend unreachable")
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }
}

/// Bag-of-words embedder that stops inside `embed` whenever the text
/// mentions `trigger`: it meets `barrier` once on entry and once more before
/// returning, so a test can act while an embedding is in flight.
pub struct GatedEmbedder {
    pub trigger: &'static str,
    pub barrier: Arc<Barrier>,
}

impl EmbeddingProvider for GatedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains(self.trigger) {
            self.barrier.wait();
            self.barrier.wait();
        }
        BagOfWords.embed(text)
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }
}

pub fn record(id: &str, name: &str, ingredients: &[&str]) -> CatalogRecord {
    CatalogRecord {
        id: id.to_string(),
        name: name.to_string(),
        ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
        ingredient_measures: Vec::new(),
        details: Default::default(),
    }
}

/// The two-cocktail catalog used throughout the tests.
pub fn mojito_daiquiri() -> Catalog {
    Catalog::from_records(vec![
        record("1", "Mojito", &["lime", "soda", "mint"]),
        record("2", "Daiquiri", &["rum", "lime"]),
    ])
}

pub const CATALOG_CSV: &str = "\
id,name,category,ingredients,ingredientMeasures
1,Mojito,Cocktail,\"['lime', 'soda', 'mint']\",\"['1/2', '1 cup', '4 leaves']\"
2,Daiquiri,Ordinary Drink,\"['rum', 'lime']\",\"['2 oz', '1 oz']\"
3,Negroni,Ordinary Drink,\"['gin', 'campari', 'sweet vermouth']\",not a list
";

/// Config rooted at `dir` with the fixture catalog written to `dir/data/cocktails.csv`.
pub fn config_in(dir: &Path) -> BarkeepConfig {
    let mut config = BarkeepConfig::default();
    config.storage.data_dir = dir.to_string_lossy().into_owned();
    let catalog_path = config.resolved_catalog_path();
    std::fs::create_dir_all(catalog_path.parent().unwrap()).unwrap();
    std::fs::write(&catalog_path, CATALOG_CSV).unwrap();
    config
}

/// Scripted completion client. Each call kind answers with its configured
/// reply, or fails when none is set. Every prompt is recorded.
#[derive(Default)]
pub struct ScriptedLlm {
    pub classification: Option<String>,
    pub extraction: Option<String>,
    pub answer: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(
        classification: Option<&str>,
        extraction: Option<&str>,
        answer: Option<&str>,
    ) -> Arc<Self> {
        Arc::new(Self {
            classification: classification.map(str::to_string),
            extraction: extraction.map(str::to_string),
            answer: answer.map(str::to_string),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Fails every call.
    pub fn offline() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = if prompt.starts_with("The user sent the following message") {
            &self.classification
        } else if prompt.starts_with("Analyze the user's message") {
            &self.extraction
        } else {
            &self.answer
        };
        reply
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion service unavailable"))
    }
}
