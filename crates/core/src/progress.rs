//! Progress events
//!
//! The orchestrator reports coarse progress to a caller-supplied sink.
//! Events are observability only; dropping them never affects correctness.

/// Stages reported while a query is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Routing,
    Rewriting,
    ValidatingInput,
    RetrievingDocuments,
    DocumentsRetrieved,
    FormulatingResponse,
    VerifyingAnswer,
    Finalizing,
    Complete,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Routing => "routing",
            ProgressStage::Rewriting => "rewriting",
            ProgressStage::ValidatingInput => "validating_input",
            ProgressStage::RetrievingDocuments => "retrieving_documents",
            ProgressStage::DocumentsRetrieved => "documents_retrieved",
            ProgressStage::FormulatingResponse => "formulating_response",
            ProgressStage::VerifyingAnswer => "verifying_answer",
            ProgressStage::Finalizing => "finalizing",
            ProgressStage::Complete => "complete",
        }
    }
}

/// Per-request progress sink. Events arrive in order for a given request.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, stage: ProgressStage, detail: &str);
}

/// Sink that drops every event.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&self, _stage: ProgressStage, _detail: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        assert_eq!(ProgressStage::RetrievingDocuments.as_str(), "retrieving_documents");
        assert_eq!(ProgressStage::Complete.as_str(), "complete");
    }
}
