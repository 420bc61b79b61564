//! Provider registry and engine configuration.
//!
//! The registry is an explicitly constructed, immutable value handed to the
//! orchestrator at build time; there is no process-wide configuration
//! singleton. Structural validation happens once, at load time, so a review
//! call never discovers a half-formed provider.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Default per-provider request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Default review input budget, in tokens (bytes ≈ tokens × 4).
pub const DEFAULT_TOKEN_LIMIT: usize = 100_000;

/// Default normalized-message similarity threshold for consensus grouping.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Default number of providers that must agree for a consensus finding.
pub const DEFAULT_MIN_CONSENSUS: usize = 2;

// ── Provider family ──────────────────────────────────────────────

/// Transport family a provider speaks.
///
/// A closed set: each variant carries its own auth header placement,
/// endpoint finalization, and response envelope paths inside the transport
/// module. Adding a family touches only that module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderFamily {
    /// Anthropic-style messages API (`content[0].text`).
    MessageApi,
    /// OpenAI-style chat completions (`choices[0].message.content`).
    ChatCompletionApi,
    /// Google-style generateContent (`candidates[0].content.parts[0].text`).
    GenerationApi,
    /// Ollama-style local HTTP endpoint (`response`), usually unauthenticated.
    LocalHttp,
}

impl ProviderFamily {
    pub fn label(self) -> &'static str {
        match self {
            Self::MessageApi => "message-api",
            Self::ChatCompletionApi => "chat-completion-api",
            Self::GenerationApi => "generation-api",
            Self::LocalHttp => "local-http",
        }
    }
}

// ── Provider configuration ───────────────────────────────────────

/// One configured reviewer endpoint. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Unique provider identifier (e.g. "anthropic-sonnet", "local-qwen").
    pub id: String,
    /// Transport family this provider speaks.
    pub family: ProviderFamily,
    /// Endpoint URL; may embed the model id via `{{model}}`.
    pub endpoint_template: String,
    /// Environment variable holding the API secret. Absent for
    /// unauthenticated local endpoints.
    #[serde(default)]
    pub auth_env_var: Option<String>,
    /// Model identifier sent to the provider.
    pub model: String,
    /// Additional headers appended to every request.
    #[serde(default)]
    pub extra_headers: Vec<(String, String)>,
    /// Request body template with `{{model}}`, `{{prompt}}`, `{{code}}`,
    /// `{{language}}`, and `{{system_prompt}}` placeholders.
    pub request_template: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Whether this provider participates in review dispatch.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Input pricing in USD per 1k tokens.
    #[serde(default)]
    pub input_cost_per_1k: f64,
    /// Output pricing in USD per 1k tokens.
    #[serde(default)]
    pub output_cost_per_1k: f64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_enabled() -> bool {
    true
}

// ── Provider registry ────────────────────────────────────────────

/// Validated, immutable collection of provider configurations.
///
/// Registry order is the dispatch order for sequential mode.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    /// Build a registry, rejecting structurally invalid entries.
    ///
    /// An empty list is legal (a review call then returns a well-formed
    /// empty result); an entry with a blank id, endpoint, or model, or a
    /// duplicate id, is not.
    pub fn new(providers: Vec<ProviderConfig>) -> Result<Self, EngineError> {
        let mut seen = std::collections::HashSet::new();
        for p in &providers {
            let reason = if p.id.trim().is_empty() {
                Some("empty id")
            } else if p.endpoint_template.trim().is_empty() {
                Some("empty endpoint template")
            } else if p.model.trim().is_empty() {
                Some("empty model")
            } else if !seen.insert(p.id.clone()) {
                Some("duplicate id")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(EngineError::InvalidProvider {
                    id: p.id.clone(),
                    reason: reason.into(),
                });
            }
        }
        Ok(Self { providers })
    }

    /// All providers, in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter()
    }

    /// Enabled providers, in registry order.
    pub fn enabled(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    /// Look up a provider by id.
    pub fn get(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

// ── Engine configuration ─────────────────────────────────────────

/// How enabled providers are dispatched for one review call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// All enabled providers invoked concurrently, joined before aggregation.
    Parallel,
    /// Providers invoked one at a time, in registry order.
    Sequential,
}

/// Tunables for the consensus grouping pass.
///
/// The similarity threshold and the dual same-line/same-category shortcut
/// are carried over from operational experience, not re-derived; they are
/// configuration rather than literals so deployments can adjust them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Providers (including the reporter) that must agree on a finding.
    /// Values below 2 make every finding consensus; accepted as-is.
    pub min_consensus_count: usize,
    /// Normalized message similarity above which two findings agree.
    pub similarity_threshold: f64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            min_consensus_count: DEFAULT_MIN_CONSENSUS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Top-level engine configuration handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Dispatch mode for enabled providers.
    pub dispatch: DispatchMode,
    /// Input budget in tokens; code larger than `token_limit × 4` bytes is
    /// rejected before any network call.
    pub token_limit: usize,
    /// Named prompt template resolved for every provider call.
    pub prompt_template: String,
    /// System prompt substituted into provider request templates.
    pub system_prompt: String,
    /// Consensus grouping tunables.
    pub consensus: ConsensusParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Parallel,
            token_limit: DEFAULT_TOKEN_LIMIT,
            prompt_template: "review".into(),
            system_prompt: "You are an expert code reviewer.".into(),
            consensus: ConsensusParams::default(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
