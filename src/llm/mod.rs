//! Text-completion oracle.
//!
//! Everything the advisor asks of a language model goes through
//! [`CompletionClient::complete`]: a prompt in, a string out. Callers treat it
//! as slow and fallible and pick their own fallback on error.

pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub use openai::OpenAiClient;
