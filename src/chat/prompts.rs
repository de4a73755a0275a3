//! Prompt construction and response parsing for the three completion calls:
//! classification, preference extraction, and answer composition.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::preferences::UserPreferences;
use crate::retrieval::SearchHit;

/// What a user message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// States liked ingredients or cocktails.
    Preferences,
    /// Asks a question or requests a recommendation.
    Query,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preferences => "preferences",
            Self::Query => "query",
        }
    }

    /// Interpret a classifier reply. Anything that does not name
    /// `preferences` is a query.
    pub fn from_reply(reply: &str) -> Self {
        let word = reply
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.starts_with("preference") {
            Self::Preferences
        } else {
            Self::Query
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classification_prompt(message: &str) -> String {
    format!(
        r#"The user sent the following message:
"{message}"

Classify the message into one of the following two categories:
1. "preferences" - the message describes the user's favorite ingredients or cocktails, such as:
   - "I love soda, lemon, and peach."
   - "My favorite cocktail is Mojito."
2. "query" - the message asks a question or requests information, such as:
   - "What cocktails can I make with lime and soda?"
   - "Recommend 5 cocktails that contain my favorite ingredients."

Respond with either "preferences" or "query"."#
    )
}

/// Shape the extraction call must answer with.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ExtractedPreferences {
    /// Comma-separated list of ingredients or an empty string
    #[serde(default)]
    pub ingredients: String,
    /// Comma-separated list of cocktails or an empty string
    #[serde(default)]
    pub cocktails: String,
}

/// Ingredient and cocktail names pulled out of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceUpdate {
    pub ingredients: Vec<String>,
    pub cocktails: Vec<String>,
}

impl PreferenceUpdate {
    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty() && self.cocktails.is_empty()
    }
}

pub fn extraction_prompt(message: &str) -> String {
    let schema = schemars::schema_for!(ExtractedPreferences);
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "Analyze the user's message and extract ingredients and/or cocktails that the user prefers.\n\
         Reply with a single JSON object that conforms to this JSON schema:\n\
         ```\n{schema}\n```\n\
         Do not include any other text.\n\
         {message}\n"
    )
}

/// Parse an extraction reply. Tolerates code fences, surrounding prose, and
/// JSON arrays in place of comma-separated strings. Returns `None` when no
/// JSON object can be found.
pub fn parse_extraction(reply: &str) -> Option<PreferenceUpdate> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    let value: Value = serde_json::from_str(&reply[start..=end]).ok()?;

    Some(PreferenceUpdate {
        ingredients: names(value.get("ingredients"))
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect(),
        cocktails: names(value.get("cocktails")),
    })
}

fn names(value: Option<&Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn answer_prompt(message: &str, preferences: &UserPreferences, hits: &[SearchHit]) -> String {
    let favorites = format!(
        "User's favorite ingredients: {}. Favorite cocktails: {}.",
        join(preferences.ingredients.iter()),
        join(preferences.cocktails.iter())
    );
    let relevant = serde_json::to_string(hits).unwrap_or_else(|_| "[]".into());

    format!(
        "{favorites}\n\nUser Query: {message}\n\nRelevant Cocktails: {relevant}\n\n\
         Provide a detailed response based on the above information."
    )
}

fn join<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}
