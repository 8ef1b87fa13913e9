//! askdb LLM - text completion abstraction
//!
//! Provider-agnostic trait for text completion, a registry routing pipeline
//! stages to providers, token usage accounting, and a scriptable mock.
//! HTTP providers for Ollama and OpenAI-compatible servers live in
//! [`providers`].

pub mod providers;

use askdb_core::{
    AskConfig, AskError, AskResult, Completion, CompletionRequest, LlmError, Stage, TokenUsage,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// COMPLETION PROVIDER TRAIT
// ============================================================================

/// Trait for text completion providers.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct LocalModel { /* ... */ }
///
/// #[async_trait]
/// impl CompletionProvider for LocalModel {
///     async fn complete(&self, request: &CompletionRequest) -> AskResult<Completion> {
///         // Call the model
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete the role-tagged prompt in `request`.
    ///
    /// # Returns
    /// * `Ok(Completion)` - The completion text, model and token usage
    /// * `Err(AskError::Llm)` - If the call fails or times out
    async fn complete(&self, request: &CompletionRequest) -> AskResult<Completion>;

    /// Model identifier requests are sent to (e.g., "deepseek-r1").
    fn model_id(&self) -> &str;

    /// Provider name used in errors and logs (e.g., "ollama").
    fn provider_id(&self) -> &str;
}

// ============================================================================
// PROVIDER REGISTRY
// ============================================================================

/// Registry routing pipeline stages to completion providers.
/// Providers must be explicitly registered - no auto-discovery.
///
/// A stage without an override falls back to the default provider.
///
/// # Example
/// ```ignore
/// let mut registry = ProviderRegistry::new();
/// registry.register_default(Box::new(ollama));
/// registry.register_stage(Stage::Summary, Box::new(small_model));
///
/// let provider = registry.provider(Stage::Synthesis)?;
/// ```
pub struct ProviderRegistry {
    default: Option<Arc<dyn CompletionProvider>>,
    stages: HashMap<Stage, Arc<dyn CompletionProvider>>,
}

impl ProviderRegistry {
    /// Create a new empty provider registry.
    pub fn new() -> Self {
        Self {
            default: None,
            stages: HashMap::new(),
        }
    }

    /// Registry serving every stage from one provider.
    pub fn single(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            default: Some(provider),
            stages: HashMap::new(),
        }
    }

    /// Build the registry described by configuration: the configured
    /// provider as default, plus one provider per stage model override.
    pub fn from_config(config: &AskConfig) -> AskResult<Self> {
        let completion = &config.completion;
        let mut registry = Self::new();
        registry.register_default(providers::build_provider(completion, &completion.model)?);

        let overrides = [
            (Stage::TableSelection, &completion.stage_models.table_selection),
            (Stage::Synthesis, &completion.stage_models.synthesis),
            (Stage::Summary, &completion.stage_models.summary),
        ];
        for (stage, model) in overrides {
            if let Some(model) = model {
                registry.register_stage(stage, providers::build_provider(completion, model)?);
            }
        }
        Ok(registry)
    }

    /// Register the default provider.
    /// Replaces any previously registered default.
    pub fn register_default(&mut self, provider: Box<dyn CompletionProvider>) {
        self.default = Some(Arc::from(provider));
    }

    /// Register a provider for one stage.
    pub fn register_stage(&mut self, stage: Stage, provider: Box<dyn CompletionProvider>) {
        self.stages.insert(stage, Arc::from(provider));
    }

    /// Get the provider serving `stage`.
    ///
    /// # Returns
    /// * `Ok(Arc<dyn CompletionProvider>)` - The stage override or the default
    /// * `Err(AskError::Llm(LlmError::ProviderNotConfigured))` - If neither is registered
    pub fn provider(&self, stage: Stage) -> AskResult<Arc<dyn CompletionProvider>> {
        self.stages
            .get(&stage)
            .or(self.default.as_ref())
            .cloned()
            .ok_or(AskError::Llm(LlmError::ProviderNotConfigured))
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn has_override(&self, stage: Stage) -> bool {
        self.stages.contains_key(&stage)
    }

    /// Remove a stage override; the stage falls back to the default.
    pub fn clear_stage(&mut self, stage: Stage) {
        self.stages.remove(&stage);
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("default", &self.default.as_ref().map(|p| p.model_id().to_string()))
            .field("overrides", &self.stages.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// USAGE TRACKER
// ============================================================================

/// Tracks completion calls and token usage across the process.
/// Thread-safe via atomic operations.
pub struct UsageTracker {
    calls: AtomicI64,
    prompt_tokens: AtomicI64,
    completion_tokens: AtomicI64,
}

impl UsageTracker {
    /// Create a new tracker with zero counts.
    pub fn new() -> Self {
        Self {
            calls: AtomicI64::new(0),
            prompt_tokens: AtomicI64::new(0),
            completion_tokens: AtomicI64::new(0),
        }
    }

    /// Record one completion call and its usage, when reported.
    pub fn record(&self, usage: Option<TokenUsage>) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(usage) = usage {
            self.prompt_tokens
                .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
            self.completion_tokens
                .fetch_add(usage.completion_tokens, Ordering::Relaxed);
        }
    }

    pub fn calls(&self) -> i64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Totals recorded so far.
    pub fn usage(&self) -> TokenUsage {
        TokenUsage::new(
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
        )
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
        self.prompt_tokens.store(0, Ordering::Relaxed);
        self.completion_tokens.store(0, Ordering::Relaxed);
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker")
            .field("calls", &self.calls())
            .field("usage", &self.usage())
            .finish()
    }
}

// ============================================================================
// MOCK PROVIDER FOR TESTING
// ============================================================================

type Responder = dyn Fn(&CompletionRequest) -> AskResult<String> + Send + Sync;

/// Mock completion provider for testing.
///
/// Serves scripted responses in order, then falls back to an optional
/// responder closure. Every request is recorded for later inspection.
pub struct MockCompletionProvider {
    model_id: String,
    script: Mutex<VecDeque<AskResult<String>>>,
    responder: Option<Box<Responder>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionProvider {
    /// Create a mock serving `responses` in order.
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            model_id: "mock-model".to_string(),
            script: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock answering every request through `responder`.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> AskResult<String> + Send + Sync + 'static,
    {
        Self {
            model_id: "mock-model".to_string(),
            script: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append a scripted failure.
    pub fn then_fail(self, error: LlmError) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(AskError::Llm(error)));
        }
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, request: &CompletionRequest) -> AskResult<Completion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let text = match (scripted, &self.responder) {
            (Some(result), _) => result?,
            (None, Some(responder)) => responder(request)?,
            (None, None) => {
                return Err(AskError::Llm(LlmError::InvalidResponse {
                    provider: "mock".to_string(),
                    reason: "script exhausted".to_string(),
                }))
            }
        };

        // Rough estimate: 4 chars per token
        let usage = TokenUsage::new(
            (request.full_text().len() / 4) as i64,
            (text.len() / 4) as i64,
        );
        Ok(Completion {
            text,
            model: self.model_id.clone(),
            usage: Some(usage),
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider_id(&self) -> &str {
        "mock"
    }
}

impl std::fmt::Debug for MockCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCompletionProvider")
            .field("model_id", &self.model_id)
            .field("calls", &self.call_count())
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
