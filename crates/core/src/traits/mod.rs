//! Collaborator traits
//!
//! Every external service the pipeline consumes is reached through one of
//! these traits, so backends can be swapped by configuration and tests can
//! run against deterministic mocks.

mod cache;
mod embedding;
mod index;
mod llm;
mod rerank;
mod search;

pub use cache::AnswerCache;
pub use embedding::{Embedding, EmbeddingProvider, SparseVector};
pub use index::{IndexHit, PassageMetadata, VectorIndex};
pub use llm::{ChatMessage, ChatRole, CompletionRequest, LlmClient};
pub use rerank::{Reranker, RerankScore};
pub use search::{WebHit, WebSearch};
