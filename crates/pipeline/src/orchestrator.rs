//! Pipeline orchestrator
//!
//! Drives one query through the state machine: parse, classify, route,
//! cache lookup, retrieve, generate, guard (with one web-search fallback
//! loop), translate back, cache, return. The orchestrator is the only
//! component that turns errors into user-visible responses; everything
//! below it reports tagged error kinds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use uuid::Uuid;

use climate_chat_config::constants::timeouts;
use climate_chat_config::Settings;
use climate_chat_core::{
    Answer, AnswerCache, Error, LanguageDecision, LlmClient, NullProgress, ParsedHistory, Passage,
    ProgressSink, ProgressStage, QueryIntent, QueryResponse, RetrievalSource, UserQuery, WebSearch,
};
use climate_chat_llm::FamilyClients;
use climate_chat_rag::PassageRetriever;

use crate::canned::CannedKind;
use crate::classifier::QueryClassifier;
use crate::generator::{GeneratedAnswer, ResponseGenerator};
use crate::guard::FaithfulnessGuard;
use crate::history::ConversationParser;
use crate::router::MultilingualRouter;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Whole-request deadline
    pub deadline: Duration,
    /// Per-process concurrent request cap
    pub max_concurrent: usize,
    /// Cache operation timeout
    pub cache_op_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(timeouts::REQUEST_DEADLINE_MS),
            max_concurrent: climate_chat_config::constants::limits::MAX_CONCURRENT_REQUESTS,
            cache_op_timeout: Duration::from_millis(timeouts::CACHE_OP_MS),
        }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            deadline: Duration::from_millis(settings.pipeline.request_deadline_ms),
            max_concurrent: settings.pipeline.max_concurrent_requests,
            cache_op_timeout: Duration::from_millis(timeouts::CACHE_OP_MS),
        }
    }
}

/// The end-to-end query pipeline
pub struct QueryPipeline {
    parser: ConversationParser,
    classifier: QueryClassifier,
    router: MultilingualRouter,
    retriever: Arc<PassageRetriever>,
    generator: ResponseGenerator,
    guard: FaithfulnessGuard,
    llms: FamilyClients,
    web_search: Option<Arc<dyn WebSearch>>,
    cache: Option<Arc<dyn AnswerCache>>,
    limiter: Arc<Semaphore>,
    config: PipelineConfig,
}

impl QueryPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        parser: ConversationParser,
        classifier: QueryClassifier,
        router: MultilingualRouter,
        retriever: Arc<PassageRetriever>,
        generator: ResponseGenerator,
        guard: FaithfulnessGuard,
        llms: FamilyClients,
        config: PipelineConfig,
    ) -> Self {
        Self {
            parser,
            classifier,
            router,
            retriever,
            generator,
            guard,
            llms,
            web_search: None,
            cache: None,
            limiter: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
        }
    }

    pub fn with_web_search(mut self, web_search: Arc<dyn WebSearch>) -> Self {
        self.web_search = Some(web_search);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn AnswerCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Process one query end to end. Always returns a record; failures are
    /// folded into it with `success = false` and a correlation id.
    pub async fn process_query(
        &self,
        query: UserQuery,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> QueryResponse {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let sink: Arc<dyn ProgressSink> = progress.unwrap_or_else(|| Arc::new(NullProgress));

        let _permit = match self.limiter.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                return self
                    .failure(
                        Error::ProviderSaturated("request cap reached".to_string()),
                        None,
                        &request_id,
                        started,
                    )
                    .await;
            }
        };

        let outcome = tokio::time::timeout(
            self.config.deadline,
            self.run(&query, sink.as_ref(), &request_id, started),
        )
        .await;

        match outcome {
            Ok(response) => response,
            Err(_) => {
                // Dropping the request future aborts its in-flight calls.
                tracing::warn!(request_id = %request_id, "request deadline exceeded");
                self.failure(Error::Timeout, None, &request_id, started).await
            }
        }
    }

    async fn run(
        &self,
        query: &UserQuery,
        sink: &dyn ProgressSink,
        request_id: &str,
        started: Instant,
    ) -> QueryResponse {
        sink.emit(ProgressStage::ValidatingInput, "validating query");
        if query.text.trim().is_empty() {
            tracing::info!(request_id, "rejecting empty query");
            return self
                .canned(CannedKind::EmptyQuery, None, RetrievalSource::None, false, request_id, started, sink)
                .await;
        }

        // Received -> Parsed
        let history = match self.parser.parse_with_follow_up(&query.text, &query.history).await {
            Ok(history) => history,
            Err(err) => return self.failure(err, None, request_id, started).await,
        };

        // Parsed -> Classified
        sink.emit(ProgressStage::Rewriting, "classifying and rewriting");
        let classification = self
            .classifier
            .classify(&query.text, &history, query.language_name.as_deref())
            .await;
        let canned_kind = CannedKind::for_classification(&classification);

        // Classified -> Routed
        sink.emit(ProgressStage::Routing, "detecting language");
        let decision = match self
            .router
            .route(&query.text, query.language_name.as_deref())
            .await
        {
            Ok(decision) => Some(decision),
            Err(Error::LanguageUndetected) => None,
            Err(err) => return self.failure(err, None, request_id, started).await,
        };

        // Canned intents short-circuit before any downstream model runs.
        if let Some(kind) = canned_kind {
            return self
                .canned(kind, decision.as_ref(), RetrievalSource::Canned, true, request_id, started, sink)
                .await;
        }

        let Some(decision) = decision else {
            return self
                .canned(
                    CannedKind::LanguageUndetected,
                    None,
                    RetrievalSource::Canned,
                    true,
                    request_id,
                    started,
                    sink,
                )
                .await;
        };

        tracing::info!(
            request_id,
            language = %decision.code,
            family = decision.family.as_str(),
            intent = classification.intent.as_tag(),
            "query routed"
        );

        // Routed -> CacheLookup
        let key = climate_chat_cache::cache_key(&decision.code, &query.text);
        if !query.skip_cache {
            if let Some(cached) = self.cache_get(&key).await {
                sink.emit(ProgressStage::Complete, "cache hit");
                let mut answer = cached;
                answer.processing_time_ms = started.elapsed().as_millis() as u64;
                return QueryResponse::from_answer(&answer, true, request_id);
            }
        }

        let llm = self.llms.for_family(decision.family);

        // CacheLookup -> Retrieved (pre-translating when required)
        let retrieval_query =
            match self.retrieval_query(query, &classification, &decision, &llm).await {
                Ok(q) => q,
                Err(err) => return self.failure(err, Some(&decision), request_id, started).await,
            };

        sink.emit(ProgressStage::RetrievingDocuments, "searching climate corpus");
        let mut retrieval_source = RetrievalSource::Vector;
        let mut passages = match self.retriever.retrieve(&retrieval_query).await {
            Ok(passages) => passages,
            Err(Error::NoEvidence) => match self.web_passages(&retrieval_query).await {
                Some(web) if !web.is_empty() => {
                    retrieval_source = RetrievalSource::WebFallback;
                    web
                }
                _ => {
                    return self
                        .canned(
                            CannedKind::NoEvidence,
                            Some(&decision),
                            RetrievalSource::None,
                            true,
                            request_id,
                            started,
                            sink,
                        )
                        .await;
                }
            },
            Err(err) => return self.failure(err, Some(&decision), request_id, started).await,
        };
        sink.emit(
            ProgressStage::DocumentsRetrieved,
            &format!("{} passages", passages.len()),
        );

        // Follow-ups get the previous assistant turn as tagged context;
        // it is never cited.
        if history.is_follow_up {
            if let Some(last) = history.last_assistant() {
                passages.push(conversation_context_passage(&last.content));
            }
        }

        // Retrieved -> Generated
        sink.emit(ProgressStage::FormulatingResponse, "generating answer");
        let mut generated = match self
            .generate(&llm, query, &decision, &passages, &history)
            .await
        {
            Ok(generated) => generated,
            Err(err) => return self.failure(err, Some(&decision), request_id, started).await,
        };

        // Generated -> Guarded
        sink.emit(ProgressStage::VerifyingAnswer, "checking answer against sources");
        let mut report = self.guard.evaluate(&llm, &generated.text, &passages).await;

        // Guarded -> Fallback? (at most one loop, only off the vector path)
        if report.score < self.guard.threshold() && retrieval_source == RetrievalSource::Vector {
            tracing::info!(
                request_id,
                score = report.score,
                assessment = report.assessment,
                "answer below faithfulness threshold, trying web fallback"
            );
            if let Some(web) = self.web_passages(&retrieval_query).await {
                if !web.is_empty() {
                    sink.emit(ProgressStage::FormulatingResponse, "retrying with web sources");
                    match self.generate(&llm, query, &decision, &web, &history).await {
                        Ok(regenerated) => {
                            sink.emit(ProgressStage::VerifyingAnswer, "re-checking answer");
                            report = self.guard.evaluate(&llm, &regenerated.text, &web).await;
                            generated = regenerated;
                            retrieval_source = RetrievalSource::WebFallback;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "fallback generation failed, keeping original answer");
                        }
                    }
                }
            }
        }

        // Guarded/Fallback? -> Translated. Citations stay in the source
        // language.
        sink.emit(ProgressStage::Finalizing, "finalizing");
        let final_text = if decision.translate_answer_back {
            match self.translate_with_retry(&llm, &generated.text, &decision.code).await {
                Ok(text) => text,
                Err(err) => return self.failure(err, Some(&decision), request_id, started).await,
            }
        } else {
            generated.text.clone()
        };

        let answer = Answer {
            text: final_text,
            language_code: decision.code.clone(),
            model_family: Some(decision.family),
            citations: generated.citations.clone(),
            faithfulness_score: report.score,
            retrieval_source,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        // Translated -> Cached. Only faithful, on-topic, vector-sourced
        // answers are stored.
        let cacheable = classification.intent == QueryIntent::OnTopic
            && report.score >= self.guard.threshold()
            && retrieval_source == RetrievalSource::Vector;
        if cacheable {
            self.cache_put(&key, &answer).await;
        }

        self.router.record_outcome(&decision.code, decision.family, true);
        sink.emit(ProgressStage::Complete, "complete");
        QueryResponse::from_answer(&answer, true, request_id)
    }

    /// The English query used for embedding and retrieval: the classifier
    /// rewrite when it produced one, otherwise a translation of the
    /// original (one retry, then `TranslationError`).
    async fn retrieval_query(
        &self,
        query: &UserQuery,
        classification: &climate_chat_core::Classification,
        decision: &LanguageDecision,
        llm: &Arc<dyn LlmClient>,
    ) -> Result<String, Error> {
        if !decision.translate_to_en_before_retrieval {
            return Ok(classification.rewrite_en.clone());
        }
        if classification.confidence > 0.0 && classification.rewrite_en != query.text {
            return Ok(classification.rewrite_en.clone());
        }
        self.translate_with_retry(llm, &query.text, "en").await
    }

    async fn generate(
        &self,
        llm: &Arc<dyn LlmClient>,
        query: &UserQuery,
        decision: &LanguageDecision,
        passages: &[Passage],
        history: &ParsedHistory,
    ) -> Result<GeneratedAnswer, Error> {
        // Generate in English and translate back afterwards; the guard
        // then compares the answer and passages in the same language.
        let answer_language = if decision.translate_answer_back {
            "en"
        } else {
            decision.code.as_str()
        };
        self.generator
            .generate(llm, &query.text, answer_language, passages, history)
            .await
    }

    async fn translate_with_retry(
        &self,
        llm: &Arc<dyn LlmClient>,
        text: &str,
        target: &str,
    ) -> Result<String, Error> {
        match llm.translate(text, target).await {
            Ok(translated) => Ok(translated),
            Err(err) => {
                tracing::warn!(error = %err, language = target, "translation failed, retrying once");
                llm.translate(text, target)
                    .await
                    .map_err(|e| Error::TranslationError(e.to_string()))
            }
        }
    }

    async fn web_passages(&self, query: &str) -> Option<Vec<Passage>> {
        let web = self.web_search.as_ref()?;
        match web.search(query).await {
            Ok(hits) => Some(
                hits.into_iter()
                    .enumerate()
                    .map(|(i, hit)| Passage {
                        id: format!("web-{i}"),
                        title: hit.title,
                        url: Some(hit.url),
                        section_title: None,
                        text: hit.snippet,
                        dense_score: 0.0,
                        rerank_score: None,
                        conversation_context: false,
                    })
                    .collect(),
            ),
            Err(err) => {
                tracing::warn!(error = %err, "web search fallback failed");
                None
            }
        }
    }

    async fn cache_get(&self, key: &str) -> Option<Answer> {
        let cache = self.cache.as_ref()?;
        match tokio::time::timeout(self.config.cache_op_timeout, cache.get(key)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "cache get failed, treating as miss");
                None
            }
            Err(_) => {
                tracing::warn!("cache get timed out, treating as miss");
                None
            }
        }
    }

    async fn cache_put(&self, key: &str, answer: &Answer) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        match tokio::time::timeout(self.config.cache_op_timeout, cache.put(key, answer)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "cache put failed, answer not stored"),
            Err(_) => tracing::warn!("cache put timed out, answer not stored"),
        }
    }

    /// Canned terminal state. Translated to the user's language when the
    /// routing decision is known; canned responses never carry citations.
    #[allow(clippy::too_many_arguments)]
    async fn canned(
        &self,
        kind: CannedKind,
        decision: Option<&LanguageDecision>,
        source: RetrievalSource,
        success: bool,
        request_id: &str,
        started: Instant,
        sink: &dyn ProgressSink,
    ) -> QueryResponse {
        let (text, language_code) = self.localized(kind.text(), decision).await;
        sink.emit(ProgressStage::Complete, "complete");

        let answer = Answer {
            text,
            language_code,
            model_family: None,
            citations: Vec::new(),
            faithfulness_score: 0.0,
            retrieval_source: source,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        QueryResponse::from_answer(&answer, success, request_id)
    }

    /// Error terminal state: a short, user-language explanation with the
    /// correlation id; provider detail stays in the logs.
    async fn failure(
        &self,
        err: Error,
        decision: Option<&LanguageDecision>,
        request_id: &str,
        started: Instant,
    ) -> QueryResponse {
        tracing::error!(request_id, kind = err.kind(), error = %err, "request failed");
        if let Some(decision) = decision {
            self.router
                .record_outcome(&decision.code, decision.family, false);
        }

        let base = match err {
            Error::GenerationError(_) => CannedKind::GenerationFailed.text(),
            _ => CannedKind::RequestFailed.text(),
        };
        let (text, language_code) = self.localized(base, decision).await;

        let answer = Answer {
            text: format!("{text} (reference: {request_id})"),
            language_code,
            model_family: None,
            citations: Vec::new(),
            faithfulness_score: 0.0,
            retrieval_source: RetrievalSource::None,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        QueryResponse::from_answer(&answer, false, request_id)
    }

    /// Best-effort translation of a canned text; falls back to English.
    async fn localized(
        &self,
        text: &str,
        decision: Option<&LanguageDecision>,
    ) -> (String, String) {
        match decision {
            Some(d) if !d.is_english() => {
                let llm = self.llms.for_family(d.family);
                match llm.translate(text, &d.code).await {
                    Ok(translated) => (translated, d.code.clone()),
                    Err(err) => {
                        tracing::warn!(error = %err, "canned translation failed, using English");
                        (text.to_string(), "en".to_string())
                    }
                }
            }
            Some(d) => (text.to_string(), d.code.clone()),
            None => (text.to_string(), "en".to_string()),
        }
    }
}

fn conversation_context_passage(content: &str) -> Passage {
    Passage {
        id: "conversation-context".to_string(),
        title: "Conversation context".to_string(),
        url: None,
        section_title: None,
        text: content.to_string(),
        dense_score: 0.0,
        rerank_score: None,
        conversation_context: true,
    }
}
