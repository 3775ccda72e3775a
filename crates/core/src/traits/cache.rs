//! Answer cache trait

use async_trait::async_trait;

use crate::answer::{Answer, FeedbackRecord};
use crate::error::Result;

/// Global, fingerprint-keyed store of finalized answers.
///
/// Implementations survive process restarts. Callers must treat every
/// failure as recoverable: a failed `get` is a miss, a failed `put` is
/// logged and the computed answer is returned anyway.
#[async_trait]
pub trait AnswerCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Answer>>;

    async fn put(&self, key: &str, answer: &Answer) -> Result<()>;

    /// Append a feedback record. Must never block the request path.
    async fn put_feedback(&self, record: FeedbackRecord) -> Result<()>;
}
