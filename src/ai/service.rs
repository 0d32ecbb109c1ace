//! AI Service Facade
//!
//! Owns the active provider, the persisted selection, and the quota state,
//! and exposes the generation operations the game calls. All multi-item
//! generation goes through one batched loop:
//!
//! - the requested count is raised to a floor of 120 and split into
//!   batches of 30, at most 4 batches per run
//! - each batch gets up to 3 attempts with a 15 s pause between attempts
//!   and a 3 s pause between batches
//! - every prompt carries the display text of everything accepted so far
//!   as a do-not-repeat list
//! - a vendor quota signal aborts the run, arms the quota block for the
//!   provider, and returns whatever was accumulated - never an error
//! - a batch that exhausts its attempts is dropped and the run moves on;
//!   a short result list is degraded success, not failure
//!
//! All waits go through the injected [`Clock`](crate::ai::clock::Clock),
//! and a cancellation flag is checked at every suspension point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ai::clock::{SharedClock, SystemClock};
use crate::ai::provider::{
    CompletionOptions, Provider, UsageSink, build_provider,
};
use crate::ai::quota::QuotaTracker;
use crate::ai::{extraction, registry, taxonomy};
use crate::config::{ConfigStore, PersistedUsageSink, StoredConfig};
use crate::constants::batch;
use crate::types::{
    CompletionError, CompletionErrorKind, Enemy, KnowledgeNode, Question, QuestionKind,
    QuizError, RawEnemy, RawQuestion, Result,
};

/// Facade over provider selection, persistence, quota state, and the
/// batched generation operations
pub struct AIService {
    provider: Option<Box<dyn Provider>>,
    config: StoredConfig,
    store: ConfigStore,
    usage_sink: Arc<dyn UsageSink>,
    quota: QuotaTracker,
    clock: SharedClock,
    cancel: Arc<AtomicBool>,
}

impl AIService {
    /// Service backed by the default config directory and the system clock
    pub fn new() -> Result<Self> {
        Self::from_store(ConfigStore::new()?, Arc::new(SystemClock))
    }

    /// Service over an explicit store and clock
    ///
    /// Reads the persisted record once, rebuilds the provider from it, and
    /// seeds the daily counter when the stored usage date is still today.
    /// A stale provider id in the record leaves the service unconfigured
    /// instead of failing startup.
    pub fn from_store(store: ConfigStore, clock: SharedClock) -> Result<Self> {
        let config = store.load_config()?;
        let usage_sink: Arc<dyn UsageSink> = Arc::new(PersistedUsageSink::new(store.clone()));

        let mut service = Self {
            provider: None,
            config,
            store,
            usage_sink,
            quota: QuotaTracker::new(clock.clone()),
            clock,
            cancel: Arc::new(AtomicBool::new(false)),
        };

        if service.config.has_provider() {
            match service.rebuild_provider() {
                Ok(()) => {
                    info!(provider = ?service.config.provider_id, "Restored provider from config");
                }
                Err(e) => {
                    warn!("Stored provider could not be restored: {}", e);
                }
            }
        }

        Ok(service)
    }

    // =========================================================================
    // Provider Selection
    // =========================================================================

    /// Switch the active provider, clearing the key/model/account of the
    /// previous one, and rewrite the persisted record
    pub fn set_provider(&mut self, provider_id: &str) -> Result<()> {
        if registry::find(provider_id).is_none() {
            return Err(QuizError::UnknownProvider(provider_id.to_string()));
        }
        self.config = StoredConfig {
            provider_id: Some(provider_id.to_string()),
            api_key: None,
            model: None,
            account_id: None,
        };
        self.store.save_config(&self.config)?;
        self.rebuild_provider()
    }

    /// Set the API key, persist it, and clear any quota block for the
    /// active provider (a fresh key is a fresh budget)
    pub fn set_api_key(&mut self, key: &str) -> Result<()> {
        self.config.api_key = Some(key.to_string());
        self.store.save_config(&self.config)?;
        if let Some(provider) = self.provider.as_mut() {
            provider.set_api_key(SecretString::from(key));
            let id = provider.id();
            self.quota.reset(id);
        }
        Ok(())
    }

    pub fn set_model(&mut self, model: &str) -> Result<()> {
        self.config.model = Some(model.to_string());
        self.store.save_config(&self.config)?;
        if let Some(provider) = self.provider.as_mut() {
            provider.set_model(model.to_string());
        }
        Ok(())
    }

    pub fn set_account_id(&mut self, account_id: Option<String>) -> Result<()> {
        self.config.account_id = account_id.clone();
        self.store.save_config(&self.config)?;
        if let Some(provider) = self.provider.as_mut() {
            provider.set_account_id(account_id);
        }
        Ok(())
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.id())
    }

    pub fn model(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.model())
    }

    pub fn is_configured(&self) -> bool {
        self.provider.as_ref().is_some_and(|p| p.is_configured())
    }

    /// Rebuild the provider from the current record: factory build, then
    /// key/model/account applied, then day counter seeded from the usage
    /// record when its date is still today
    fn rebuild_provider(&mut self) -> Result<()> {
        let id = self
            .config
            .provider_id
            .as_deref()
            .ok_or(QuizError::NoProvider)?;
        let descriptor = registry::find(id)
            .ok_or_else(|| QuizError::UnknownProvider(id.to_string()))?;

        let mut provider =
            build_provider(descriptor, self.clock.clone(), Some(self.usage_sink.clone()));
        if let Some(key) = &self.config.api_key {
            provider.set_api_key(SecretString::from(key.as_str()));
        }
        if let Some(model) = &self.config.model {
            provider.set_model(model.clone());
        }
        provider.set_account_id(self.config.account_id.clone());

        if let Some(usage) = self.store.load_usage()
            && usage.date == self.clock.now().date_naive()
        {
            debug!(count = usage.requests_today, "Seeding daily counter from usage record");
            provider.core().seed_day(usage.date, usage.requests_today);
        }

        self.provider = Some(provider);
        Ok(())
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Handle the UI can use to stop a run from another task
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Request that the current run stop at its next suspension point
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Re-arm the service for a new run after a cancellation
    pub fn clear_cancellation(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Generation Operations
    // =========================================================================

    /// Generate quiz questions in bounded batches
    ///
    /// Returns at most `count.max(120)` validated questions; a shorter list
    /// (including an empty one) is degraded success. Only a missing or
    /// unconfigured provider is an error.
    pub async fn generate_questions(
        &self,
        topic: &str,
        count: usize,
        kinds: &[QuestionKind],
    ) -> Result<Vec<Question>> {
        let provider = self.require_provider()?;
        let total = count.max(batch::MIN_REQUEST_FLOOR);
        let batch_count = total.div_ceil(batch::BATCH_SIZE).min(batch::MAX_BATCHES);
        info!(topic, total, batches = batch_count, "Starting question generation run");

        let mut accepted: Vec<Question> = Vec::new();
        let mut seen_texts: Vec<String> = Vec::new();

        'batches: for batch_index in 0..batch_count {
            if batch_index > 0 {
                if self.cancelled() {
                    break;
                }
                self.clock
                    .sleep(Duration::from_secs(batch::BATCH_DELAY_SECS))
                    .await;
            }

            for attempt in 0..batch::MAX_RETRIES {
                if self.cancelled() {
                    info!(batch = batch_index, "Run cancelled, returning accumulated items");
                    break 'batches;
                }
                if self.quota.is_exhausted(provider.id()) {
                    info!(provider = provider.id(), "Quota block armed, aborting run");
                    break 'batches;
                }
                if attempt > 0 {
                    self.clock
                        .sleep(Duration::from_secs(batch::RETRY_DELAY_SECS))
                        .await;
                    if self.cancelled() {
                        break 'batches;
                    }
                }

                let prompt =
                    prompts::question_batch(topic, batch::BATCH_SIZE, kinds, &seen_texts);
                match self.attempt_questions(provider, &prompt).await {
                    Ok(questions) => {
                        let before = accepted.len();
                        for question in questions {
                            if !seen_texts.contains(&question.text) {
                                seen_texts.push(question.text.clone());
                                accepted.push(question);
                            }
                        }
                        debug!(
                            batch = batch_index,
                            accepted = accepted.len() - before,
                            "Batch accepted"
                        );
                        continue 'batches;
                    }
                    Err(e) => {
                        if self.is_quota_signal(provider.id(), &e) {
                            warn!(
                                provider = provider.id(),
                                raw = %e.message,
                                "Quota exhaustion signal, aborting run"
                            );
                            self.quota.set_exhausted(provider.id());
                            return Ok(accepted);
                        }
                        // Quota is handled above, so this is Configuration:
                        // retrying cannot fix a missing key or account id
                        if e.kind.is_terminal_for_run() {
                            return Err(QuizError::Completion(e));
                        }
                        warn!(
                            batch = batch_index,
                            attempt = attempt + 1,
                            error = %taxonomy::resolve(provider.id(), e.status, &e.message),
                            "Batch attempt failed"
                        );
                    }
                }
            }
            // Attempts exhausted without a quota signal: drop this batch
            warn!(batch = batch_index, "Batch dropped after exhausting attempts");
        }

        info!(returned = accepted.len(), "Question generation run finished");
        Ok(accepted)
    }

    /// Generate enemies for a battle theme: one batch, same retry budget
    /// and quota policy as questions
    pub async fn generate_enemies(&self, theme: &str, count: usize) -> Result<Vec<Enemy>> {
        let provider = self.require_provider()?;
        let prompt = prompts::enemies(theme, count);

        for attempt in 0..batch::MAX_RETRIES {
            if self.cancelled() {
                break;
            }
            if self.quota.is_exhausted(provider.id()) {
                break;
            }
            if attempt > 0 {
                self.clock
                    .sleep(Duration::from_secs(batch::RETRY_DELAY_SECS))
                    .await;
                if self.cancelled() {
                    break;
                }
            }

            match self.attempt_enemies(provider, &prompt).await {
                Ok(enemies) => return Ok(enemies),
                Err(e) => {
                    if self.is_quota_signal(provider.id(), &e) {
                        self.quota.set_exhausted(provider.id());
                        return Ok(Vec::new());
                    }
                    if e.kind.is_terminal_for_run() {
                        return Err(QuizError::Completion(e));
                    }
                    warn!(
                        attempt = attempt + 1,
                        error = %taxonomy::resolve(provider.id(), e.status, &e.message),
                        "Enemy generation attempt failed"
                    );
                }
            }
        }
        Ok(Vec::new())
    }

    /// Generate a knowledge map for a topic: single call, object extraction
    ///
    /// Unlike the batched operations there is no partial result to fall
    /// back on, so failures surface as classified errors.
    pub async fn generate_knowledge_map(&self, topic: &str) -> Result<KnowledgeNode> {
        let provider = self.require_provider()?;
        if self.cancelled() {
            return Err(QuizError::Cancelled);
        }
        if self.quota.is_exhausted(provider.id()) {
            return Err(CompletionError::new(
                CompletionErrorKind::QuotaExhausted,
                format!("{} is quota-blocked", provider.id()),
            )
            .provider(provider.id())
            .into());
        }

        let prompt = prompts::knowledge_map(topic);
        let text = provider
            .complete(&prompt, Some(prompts::KNOWLEDGE_SYSTEM), &CompletionOptions::default())
            .await
            .map_err(|e| self.surface(provider.id(), e))?;

        let value = extraction::extract_json(&text).map_err(|e| e.provider(provider.id()))?;
        KnowledgeNode::from_value(value)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn require_provider(&self) -> Result<&dyn Provider> {
        let provider = self.provider.as_deref().ok_or(QuizError::NoProvider)?;
        if !provider.is_configured() {
            return Err(CompletionError::configuration(format!(
                "{} is not fully configured",
                provider.id()
            ))
            .provider(provider.id())
            .into());
        }
        Ok(provider)
    }

    /// One completion attempt reduced to validated questions. Extraction
    /// and item-level failures are attempt failures; individually invalid
    /// items are dropped, not surfaced.
    async fn attempt_questions(
        &self,
        provider: &dyn Provider,
        prompt: &str,
    ) -> std::result::Result<Vec<Question>, CompletionError> {
        let text = provider
            .complete(prompt, Some(prompts::QUESTION_SYSTEM), &CompletionOptions::default())
            .await?;
        let value = extraction::extract_json(&text)?;
        let items = items_array(value)?;

        let mut questions = Vec::new();
        for item in items {
            match serde_json::from_value::<RawQuestion>(item) {
                Ok(raw) => {
                    if let Some(question) = Question::from_raw(raw) {
                        questions.push(question);
                    } else {
                        debug!("Dropping question that failed validation");
                    }
                }
                Err(e) => debug!("Dropping malformed question item: {}", e),
            }
        }
        Ok(questions)
    }

    async fn attempt_enemies(
        &self,
        provider: &dyn Provider,
        prompt: &str,
    ) -> std::result::Result<Vec<Enemy>, CompletionError> {
        let text = provider
            .complete(prompt, Some(prompts::ENEMY_SYSTEM), &CompletionOptions::default())
            .await?;
        let value = extraction::extract_json(&text)?;
        let items = items_array(value)?;

        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<RawEnemy>(item) {
                Ok(raw) => Enemy::from_raw(raw),
                Err(e) => {
                    debug!("Dropping malformed enemy item: {}", e);
                    None
                }
            })
            .collect())
    }

    fn is_quota_signal(&self, provider_id: &str, err: &CompletionError) -> bool {
        err.kind == CompletionErrorKind::QuotaExhausted
            || taxonomy::is_quota_error(provider_id, &err.message)
    }

    /// Classify a terminal completion failure: the raw vendor text is
    /// logged, the surfaced message is the taxonomy's resolution of it
    fn surface(&self, provider_id: &str, err: CompletionError) -> QuizError {
        warn!(provider = provider_id, raw = %err.message, "Completion failed");
        let mut err = err;
        if self.is_quota_signal(provider_id, &err) {
            self.quota.set_exhausted(provider_id);
            err.kind = CompletionErrorKind::QuotaExhausted;
        }
        err.message = taxonomy::resolve(provider_id, err.status, &err.message);
        QuizError::Completion(err)
    }
}

/// The extracted JSON as a list of items: a bare array, or an object
/// wrapping one under a conventional key
fn items_array(value: Value) -> std::result::Result<Vec<Value>, CompletionError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in ["questions", "enemies", "items"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return Ok(items);
                }
            }
            Err(CompletionError::parse(
                "extracted JSON object contains no item array",
            ))
        }
        other => Err(CompletionError::parse(format!(
            "expected a JSON array, got {}",
            kind_name(&other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Prompts
// =============================================================================

mod prompts {
    use crate::types::QuestionKind;

    pub(super) const QUESTION_SYSTEM: &str = "You are a quiz author for an educational game. \
        Respond with a single JSON array and nothing else. Each element must have: \
        \"text\", \"type\" (one of \"single\", \"multi\", \"true_false\"), \"options\" \
        (array of strings), \"correctOptionIndex\" (integer, or array of integers for \
        \"multi\"), \"difficulty\" (1-5), \"timeLimit\" (seconds), \"explanation\", \
        and \"tags\" (array of strings).";

    pub(super) const ENEMY_SYSTEM: &str = "You are a game designer inventing quiz-battle \
        enemies. Respond with a single JSON array and nothing else. Each element must \
        have: \"name\", \"description\", \"difficulty\" (1-5), \"health\", and \
        \"triviaDomain\".";

    pub(super) const KNOWLEDGE_SYSTEM: &str = "You are a curriculum planner. Respond with a \
        single JSON object and nothing else, shaped as a tree of {\"title\", \"summary\", \
        \"children\"} nodes.";

    fn kind_label(kind: &QuestionKind) -> &'static str {
        match kind {
            QuestionKind::Single => "single choice",
            QuestionKind::Multi => "multiple choice",
            QuestionKind::TrueFalse => "true/false",
        }
    }

    pub(super) fn question_batch(
        topic: &str,
        count: usize,
        kinds: &[QuestionKind],
        exclude: &[String],
    ) -> String {
        let mut prompt = format!("Write {} quiz questions about: {}.", count, topic);

        if !kinds.is_empty() {
            let labels: Vec<&str> = kinds.iter().map(kind_label).collect();
            prompt.push_str(&format!(" Use only these question types: {}.", labels.join(", ")));
        }

        if !exclude.is_empty() {
            prompt.push_str("\n\nDo NOT repeat any of these already-used questions:\n");
            for text in exclude {
                prompt.push_str("- ");
                prompt.push_str(text);
                prompt.push('\n');
            }
        }
        prompt
    }

    pub(super) fn enemies(theme: &str, count: usize) -> String {
        format!(
            "Invent {} quiz-battle enemies fitting the theme: {}. Vary their difficulty \
             and trivia domains.",
            count, theme
        )
    }

    pub(super) fn knowledge_map(topic: &str) -> String {
        format!(
            "Build a knowledge map for studying: {}. Break the topic into subtopics two \
             to three levels deep, each with a one-sentence summary.",
            topic
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    use crate::ai::clock::{Clock, ManualClock};
    use crate::ai::provider::ProviderCore;
    use crate::config::DailyUsage;

    type Scripted = std::result::Result<String, CompletionError>;

    /// Plays back a scripted sequence of completion results
    struct MockProvider {
        core: ProviderCore,
        responses: Mutex<VecDeque<Scripted>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn core(&self) -> &ProviderCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ProviderCore {
            &mut self.core
        }

        async fn complete(
            &self,
            _prompt: &str,
            _system_instruction: Option<&str>,
            _options: &CompletionOptions,
        ) -> std::result::Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(CompletionError::new(
                        CompletionErrorKind::Network,
                        "script exhausted",
                    ))
                })
        }
    }

    fn test_clock() -> Arc<ManualClock> {
        let start = Local.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        Arc::new(ManualClock::new(start))
    }

    fn service_with(
        responses: Vec<Scripted>,
        clock: Arc<ManualClock>,
        temp: &TempDir,
    ) -> (AIService, Arc<AtomicUsize>) {
        let shared: SharedClock = clock;
        let store = ConfigStore::at(temp.path());
        let mut service = AIService::from_store(store, shared.clone()).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let descriptor = registry::find("groq").unwrap();
        let mut mock = MockProvider {
            core: ProviderCore::new(descriptor, shared),
            responses: Mutex::new(VecDeque::from(responses)),
            calls: calls.clone(),
        };
        mock.set_api_key(SecretString::from("gsk-test"));
        service.provider = Some(Box::new(mock));
        (service, calls)
    }

    /// A batch response of `n` valid questions with distinct texts
    fn batch_json(start: usize, n: usize) -> String {
        let items: Vec<Value> = (start..start + n)
            .map(|i| {
                serde_json::json!({
                    "text": format!("Question number {}?", i),
                    "type": "single",
                    "options": ["a", "b", "c", "d"],
                    "correctOptionIndex": i % 4,
                    "difficulty": 3,
                    "timeLimit": 20,
                    "explanation": "because",
                    "tags": ["test"]
                })
            })
            .collect();
        serde_json::to_string(&Value::Array(items)).unwrap()
    }

    fn network_err() -> Scripted {
        Err(CompletionError::new(
            CompletionErrorKind::Network,
            "connection refused",
        ))
    }

    #[tokio::test]
    async fn test_all_failing_run_returns_empty_after_budget() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let responses = (0..12).map(|_| network_err()).collect();
        let (service, calls) = service_with(responses, clock.clone(), &temp);

        let questions = service.generate_questions("history", 120, &[]).await.unwrap();

        assert!(questions.is_empty());
        // MAX_BATCHES * MAX_RETRIES calls, not one more
        assert_eq!(calls.load(Ordering::SeqCst), 12);
        // 2 retry pauses per batch plus 3 inter-batch pauses
        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 11);
        assert_eq!(
            sleeps.iter().filter(|d| d.as_secs() == 15).count(),
            8
        );
        assert_eq!(sleeps.iter().filter(|d| d.as_secs() == 3).count(), 3);
    }

    #[tokio::test]
    async fn test_quota_signal_aborts_with_accumulated() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let responses = vec![
            Ok(batch_json(0, 30)),
            Err(CompletionError::new(
                CompletionErrorKind::UpstreamRateLimited,
                r#"{"error":{"type":"insufficient_quota","message":"You exceeded your current quota"}}"#,
            )
            .status(429)),
            // Anything past the abort would be a bug
            Ok(batch_json(30, 30)),
        ];
        let (service, calls) = service_with(responses, clock, &temp);

        let questions = service.generate_questions("physics", 120, &[]).await.unwrap();

        assert_eq!(questions.len(), 30);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(service.quota.is_exhausted("groq"));
    }

    #[tokio::test]
    async fn test_armed_quota_blocks_before_first_call() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let (service, calls) = service_with(vec![Ok(batch_json(0, 30))], clock, &temp);

        service.quota.set_exhausted("groq");
        let questions = service.generate_questions("art", 120, &[]).await.unwrap();

        assert!(questions.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_small_count_floors_to_same_run_shape() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let responses: Vec<Scripted> =
            (0..4).map(|i| Ok(batch_json(i * 30, 30))).collect();
        let (service, calls) = service_with(responses, clock, &temp);

        // count=10 floors to 120: four full batches, identical to count=120
        let questions = service.generate_questions("math", 10, &[]).await.unwrap();

        assert_eq!(questions.len(), 120);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_duplicate_texts_are_dropped() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let responses = vec![
            Ok(batch_json(0, 30)),
            // Second batch repeats the first batch's questions entirely
            Ok(batch_json(0, 30)),
            Ok(batch_json(30, 30)),
            Ok(batch_json(60, 30)),
        ];
        let (service, _calls) = service_with(responses, clock, &temp);

        let questions = service.generate_questions("geography", 120, &[]).await.unwrap();

        assert_eq!(questions.len(), 90);
        let mut texts: Vec<&str> = questions.iter().map(|q| q.text.as_str()).collect();
        texts.sort_unstable();
        texts.dedup();
        assert_eq!(texts.len(), 90);
    }

    #[tokio::test]
    async fn test_parse_failure_charges_attempt_budget() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let responses = vec![
            Ok("I could not produce questions this time, sorry.".to_string()),
            Ok(batch_json(0, 30)),
            Ok(batch_json(30, 30)),
            Ok(batch_json(60, 30)),
            Ok(batch_json(90, 30)),
        ];
        let (service, calls) = service_with(responses, clock, &temp);

        let questions = service.generate_questions("biology", 120, &[]).await.unwrap();

        // First attempt of batch 0 burned on unparseable output, then recovered
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(questions.len(), 120);
    }

    #[tokio::test]
    async fn test_dropped_batch_run_continues() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let mut responses: Vec<Scripted> = vec![network_err(), network_err(), network_err()];
        responses.extend((0..3).map(|i| Ok(batch_json(i * 30, 30))));
        let (service, calls) = service_with(responses, clock, &temp);

        let questions = service.generate_questions("music", 120, &[]).await.unwrap();

        // Batch 0 dropped after 3 attempts, three later batches landed
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(questions.len(), 90);
    }

    #[tokio::test]
    async fn test_mid_run_configuration_error_surfaces() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let responses = vec![Err(CompletionError::configuration("account id missing"))];
        let (service, calls) = service_with(responses, clock, &temp);

        let err = service.generate_questions("law", 120, &[]).await.unwrap_err();

        assert_eq!(
            err.completion_kind(),
            Some(CompletionErrorKind::Configuration)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_before_run_returns_empty() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let (service, calls) = service_with(vec![Ok(batch_json(0, 30))], clock.clone(), &temp);

        service.cancel();
        let questions = service.generate_questions("film", 120, &[]).await.unwrap();

        assert!(questions.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(clock.sleeps().is_empty());

        service.clear_cancellation();
        let questions = service.generate_questions("film", 120, &[]).await.unwrap();
        assert_eq!(questions.len(), 30);
    }

    #[tokio::test]
    async fn test_no_provider_and_unconfigured_errors() {
        let temp = TempDir::new().unwrap();
        let shared: SharedClock = test_clock();
        let service = AIService::from_store(ConfigStore::at(temp.path()), shared).unwrap();

        let err = service.generate_questions("x", 10, &[]).await.unwrap_err();
        assert!(matches!(err, QuizError::NoProvider));
    }

    #[tokio::test]
    async fn test_generate_enemies_single_batch() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let json = serde_json::json!([
            {"name": "Fraction Fiend", "description": "Hates whole numbers",
             "difficulty": 2, "health": 80, "triviaDomain": "math"},
            {"name": "", "description": "invalid, dropped", "difficulty": 1,
             "health": 50, "triviaDomain": "math"}
        ]);
        let (service, calls) =
            service_with(vec![Ok(json.to_string())], clock, &temp);

        let enemies = service.generate_enemies("arithmetic dungeon", 2).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(enemies.len(), 1);
        assert_eq!(enemies[0].name, "Fraction Fiend");
    }

    #[tokio::test]
    async fn test_generate_knowledge_map_object_extraction() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let text = "Here is your map:\n```json\n{\"title\": \"Rust\", \"summary\": \"a language\", \
                    \"children\": [{\"title\": \"Ownership\"}]}\n```";
        let (service, _calls) = service_with(vec![Ok(text.to_string())], clock, &temp);

        let map = service.generate_knowledge_map("Rust").await.unwrap();
        assert_eq!(map.title, "Rust");
        assert_eq!(map.size(), 2);
    }

    #[tokio::test]
    async fn test_knowledge_map_failure_is_classified() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let responses = vec![Err(CompletionError::new(
            CompletionErrorKind::UpstreamPermanent,
            "401 invalid_api_key provided",
        )
        .status(401)
        .provider("groq"))];
        let (service, _calls) = service_with(responses, clock, &temp);

        let err = service.generate_knowledge_map("Rust").await.unwrap_err();
        match err {
            QuizError::Completion(e) => {
                // Vendor table resolution replaced the raw body
                assert_ne!(e.message, "401 invalid_api_key provided");
                assert_eq!(e.status, Some(401));
            }
            other => panic!("expected completion error, got {:?}", other),
        }
    }

    #[test]
    fn test_setters_rewrite_record_whole() {
        let temp = TempDir::new().unwrap();
        let shared: SharedClock = test_clock();
        let store = ConfigStore::at(temp.path());
        let mut service = AIService::from_store(store.clone(), shared).unwrap();

        service.set_provider("gemini").unwrap();
        service.set_api_key("AIza-test").unwrap();
        service.set_model("gemini-1.5-pro").unwrap();

        let record = store.load_config().unwrap();
        assert_eq!(record.provider_id.as_deref(), Some("gemini"));
        assert_eq!(record.api_key.as_deref(), Some("AIza-test"));
        assert_eq!(record.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(service.model(), Some("gemini-1.5-pro"));

        // Switching provider drops the previous key and model from disk
        service.set_provider("cohere").unwrap();
        let record = store.load_config().unwrap();
        assert_eq!(record.provider_id.as_deref(), Some("cohere"));
        assert!(record.api_key.is_none());
        assert!(record.model.is_none());
        assert!(!service.is_configured());
    }

    #[test]
    fn test_set_unknown_provider_rejected() {
        let temp = TempDir::new().unwrap();
        let shared: SharedClock = test_clock();
        let mut service =
            AIService::from_store(ConfigStore::at(temp.path()), shared).unwrap();

        let err = service.set_provider("not-a-vendor").unwrap_err();
        assert!(matches!(err, QuizError::UnknownProvider(_)));
        assert!(service.provider_id().is_none());
    }

    #[test]
    fn test_set_api_key_resets_quota_block() {
        let temp = TempDir::new().unwrap();
        let shared: SharedClock = test_clock();
        let mut service =
            AIService::from_store(ConfigStore::at(temp.path()), shared).unwrap();

        service.set_provider("groq").unwrap();
        service.quota.set_exhausted("groq");
        service.set_api_key("gsk-fresh").unwrap();
        assert!(!service.quota.is_exhausted("groq"));
    }

    #[test]
    fn test_startup_restores_provider_and_seeds_day_counter() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let store = ConfigStore::at(temp.path());
        store
            .save_config(&StoredConfig {
                provider_id: Some("gemini".to_string()),
                api_key: Some("AIza-test".to_string()),
                model: Some("gemini-1.5-pro".to_string()),
                account_id: None,
            })
            .unwrap();
        store
            .save_usage(&DailyUsage::new(clock.now().date_naive(), 17))
            .unwrap();

        let shared: SharedClock = clock;
        let service = AIService::from_store(store, shared).unwrap();

        assert_eq!(service.provider_id(), Some("gemini"));
        assert_eq!(service.model(), Some("gemini-1.5-pro"));
        assert!(service.is_configured());
        let provider = service.provider.as_ref().unwrap();
        assert_eq!(provider.core().limiter.day_count("gemini-1.5-pro"), 17);
    }

    #[test]
    fn test_startup_ignores_stale_usage_record() {
        let temp = TempDir::new().unwrap();
        let clock = test_clock();
        let store = ConfigStore::at(temp.path());
        store
            .save_config(&StoredConfig {
                provider_id: Some("groq".to_string()),
                api_key: Some("gsk-test".to_string()),
                model: None,
                account_id: None,
            })
            .unwrap();
        // Yesterday's counter must not carry over
        let yesterday = clock.now().date_naive().pred_opt().unwrap();
        store.save_usage(&DailyUsage::new(yesterday, 99)).unwrap();

        let shared: SharedClock = clock;
        let service = AIService::from_store(store, shared).unwrap();

        let provider = service.provider.as_ref().unwrap();
        assert_eq!(
            provider.core().limiter.day_count(provider.model()),
            0
        );
    }

    #[test]
    fn test_items_array_accepts_wrapped_object() {
        let wrapped = serde_json::json!({"questions": [{"a": 1}]});
        assert_eq!(items_array(wrapped).unwrap().len(), 1);

        let bare = serde_json::json!([1, 2, 3]);
        assert_eq!(items_array(bare).unwrap().len(), 3);

        let err = items_array(serde_json::json!({"other": true})).unwrap_err();
        assert_eq!(err.kind, CompletionErrorKind::Parse);
    }

    #[test]
    fn test_question_prompt_carries_dedup_list() {
        let exclude = vec!["What is 2+2?".to_string()];
        let prompt = prompts::question_batch(
            "math",
            30,
            &[QuestionKind::Single, QuestionKind::TrueFalse],
            &exclude,
        );
        assert!(prompt.contains("30 quiz questions"));
        assert!(prompt.contains("single choice, true/false"));
        assert!(prompt.contains("Do NOT repeat"));
        assert!(prompt.contains("What is 2+2?"));

        let bare = prompts::question_batch("math", 30, &[], &[]);
        assert!(!bare.contains("Do NOT repeat"));
        assert!(!bare.contains("question types"));
    }
}
