//! Chat orchestration: classify → maybe update preferences → retrieve → answer.
//!
//! Every completion call is caught at the call boundary and replaced by a
//! safe default, so a failing language model degrades the answer instead of
//! failing the request.

pub mod prompts;

use std::sync::Arc;

use crate::context::AdvisorContext;
use crate::llm::CompletionClient;
use crate::preferences::UserPreferences;
use crate::retrieval::SearchHit;
pub use prompts::{MessageKind, PreferenceUpdate};

/// Reply used when answer composition fails.
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't come up with an answer right now.";

/// Everything that happened while handling one message.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub response: String,
    pub kind: MessageKind,
    /// Preferences after any update made by this message.
    pub preferences: UserPreferences,
    pub hits: Vec<SearchHit>,
}

#[derive(Clone)]
pub struct Advisor {
    context: Arc<AdvisorContext>,
    llm: Arc<dyn CompletionClient>,
}

impl Advisor {
    pub fn new(context: Arc<AdvisorContext>, llm: Arc<dyn CompletionClient>) -> Self {
        Self { context, llm }
    }

    pub fn context(&self) -> &Arc<AdvisorContext> {
        &self.context
    }

    /// Handle one user message end to end. Never fails: each step that can
    /// go wrong has a fallback.
    pub async fn handle(&self, user_id: &str, message: &str) -> ChatTurn {
        let kind = self.classify(message).await;
        tracing::info!(user_id, kind = %kind, "message classified");

        if kind == MessageKind::Preferences {
            let update = self.extract_preferences(message).await;
            if !update.is_empty() {
                if let Err(e) = self
                    .context
                    .merge_preferences(user_id.to_string(), update)
                    .await
                {
                    tracing::error!(user_id, error = %e, "failed to save preferences");
                }
            }
        }

        let preferences = self.context.preferences_for(user_id);

        let top_k = self.context.config().retrieval.default_top_k;
        let hits = match self.context.search(message.to_string(), top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "catalog search failed, answering without it");
                Vec::new()
            }
        };

        let prompt = prompts::answer_prompt(message, &preferences, &hits);
        let response = match self.llm.complete(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "answer composition failed");
                FALLBACK_ANSWER.to_string()
            }
        };

        ChatTurn {
            response,
            kind,
            preferences,
            hits,
        }
    }

    /// Classify a message; [`MessageKind::Query`] when the model is unreachable.
    pub async fn classify(&self, message: &str) -> MessageKind {
        match self.llm.complete(&prompts::classification_prompt(message)).await {
            Ok(reply) => MessageKind::from_reply(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "classification failed, treating message as a query");
                MessageKind::Query
            }
        }
    }

    /// Extract liked ingredients and cocktails; empty on any failure.
    pub async fn extract_preferences(&self, message: &str) -> PreferenceUpdate {
        let reply = match self.llm.complete(&prompts::extraction_prompt(message)).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "preference extraction failed");
                return PreferenceUpdate::default();
            }
        };

        match prompts::parse_extraction(&reply) {
            Some(update) => {
                tracing::info!(
                    ingredients = ?update.ingredients,
                    cocktails = ?update.cocktails,
                    "preferences extracted"
                );
                update
            }
            None => {
                tracing::warn!(reply = %reply, "extraction reply was not JSON");
                PreferenceUpdate::default()
            }
        }
    }
}
