//! Core types and traits for the climate chat pipeline
//!
//! This crate provides the foundational pieces shared across all other
//! crates:
//! - Collaborator traits for pluggable external services (embedding,
//!   vector index, reranker, LLM, web search, answer cache)
//! - Conversation and query types
//! - Retrieval, citation, and answer types
//! - Progress event types
//! - The shared error enum

pub mod answer;
pub mod conversation;
pub mod error;
pub mod language;
pub mod progress;
pub mod query;
pub mod retrieval;
pub mod traits;

pub use answer::{Answer, FeedbackRecord, QueryResponse};
pub use conversation::{ConversationTurn, ParsedHistory, TurnRole};
pub use error::{Error, Result};
pub use language::{LanguageDecision, ModelFamily};
pub use progress::{NullProgress, ProgressSink, ProgressStage};
pub use query::{Classification, QueryIntent, UserQuery};
pub use retrieval::{Citation, Passage, RetrievalSource};

pub use traits::{
    AnswerCache, ChatMessage, ChatRole, CompletionRequest, Embedding, EmbeddingProvider, IndexHit,
    LlmClient, PassageMetadata, Reranker, RerankScore, SparseVector, VectorIndex, WebHit,
    WebSearch,
};
