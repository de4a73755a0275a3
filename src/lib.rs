//! Conversational cocktail advisor.
//!
//! Barkeep answers free-text chat messages about cocktails. Each message is
//! classified by a language model as either a statement of taste
//! ("I love lime and mint") or a question ("what can I make with rum?").
//! Stated preferences are merged into a per-user store; every message is then
//! answered from the catalog records nearest to it in embedding space.
//!
//! # Architecture
//!
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Index**: exhaustive squared-L2 scan over keyed vectors, persisted to a
//!   flat binary file
//! - **Preferences**: union-merged ingredient and cocktail sets per user,
//!   persisted as JSON next to their own embedding index
//! - **Answers**: an OpenAI-compatible chat completion endpoint
//! - **Transport**: HTTP via axum (`GET /`, `POST /chat`)
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files and environment variables
//! - [`embedding`] - Text-to-vector embedding pipeline via ONNX Runtime
//! - [`index`] - Flat similarity index with stable keys
//! - [`catalog`] - Cocktail catalog loading and index building
//! - [`preferences`] - Per-user preference store
//! - [`retrieval`] - Free-text catalog search
//! - [`llm`] - Text-completion client
//! - [`chat`] - Message classification, extraction, and answer composition
//! - [`context`] - Explicitly constructed process state
//! - [`server`] - HTTP routes

pub mod catalog;
pub mod chat;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod preferences;
pub mod retrieval;
pub mod server;
pub mod storage;

pub use error::{AdvisorError, Result};
