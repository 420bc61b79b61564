//! Review orchestrator.
//!
//! Fans one review request out to every enabled provider, isolates each
//! provider's failures, and folds the per-provider results into a single
//! [`AggregatedReviewResult`]. The only things that fail the whole call
//! are pre-dispatch conditions: oversized input (checked before any
//! network activity) and a structurally invalid registry (checked at
//! registry construction, never here).
//!
//! In parallel mode the per-provider futures are owned and joined, not
//! spawned: dropping the `review` future cancels every in-flight provider
//! call, so a caller that gives up leaves no orphaned requests behind.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::future::join_all;

use crate::config::{DispatchMode, EngineConfig, ProviderConfig, ProviderRegistry};
use crate::error::{EngineError, TransportError};
use crate::ledger::{UsageLedger, UsageLedgerEntry, UsageTotals};
use crate::prompt::PromptResolver;
use crate::secrets::SecretResolver;
use crate::transport::{build_wire_request, TokenUsage, TransportAdapter};

use super::consensus::aggregate;
use super::normalize::normalize;
use super::types::{AggregatedReviewResult, CodeContext, ProviderReviewResult, ReviewMeta};

/// Byte-per-token heuristic shared by the size guard and the token
/// estimate for providers that do not report usage.
const BYTES_PER_TOKEN: usize = 4;

/// Entry point for multi-provider code review.
pub struct ReviewOrchestrator {
    registry: ProviderRegistry,
    config: EngineConfig,
    transport: TransportAdapter,
    ledger: UsageLedger,
    prompts: Arc<dyn PromptResolver>,
    secrets: Arc<dyn SecretResolver>,
}

impl ReviewOrchestrator {
    pub fn new(
        registry: ProviderRegistry,
        config: EngineConfig,
        ledger: UsageLedger,
        prompts: Arc<dyn PromptResolver>,
        secrets: Arc<dyn SecretResolver>,
    ) -> Self {
        Self {
            registry,
            config,
            transport: TransportAdapter::new(),
            ledger,
            prompts,
            secrets,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Review `code` with every enabled provider and aggregate the results.
    ///
    /// With zero enabled providers this still returns a well-formed empty
    /// result, so callers never need a separate "no providers" branch.
    pub async fn review(
        &self,
        code: &str,
        ctx: &CodeContext,
    ) -> Result<AggregatedReviewResult, EngineError> {
        let limit = self.config.token_limit * BYTES_PER_TOKEN;
        if code.len() > limit {
            return Err(EngineError::CodeTooLarge {
                actual: code.len(),
                limit,
                token_limit: self.config.token_limit,
            });
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let enabled: Vec<&ProviderConfig> = self.registry.enabled().collect();

        let results: Vec<ProviderReviewResult> = match self.config.dispatch {
            DispatchMode::Parallel => {
                join_all(enabled.iter().map(|p| self.review_one(p, code, ctx))).await
            }
            DispatchMode::Sequential => {
                let mut out = Vec::with_capacity(enabled.len());
                for p in &enabled {
                    out.push(self.review_one(p, code, ctx).await);
                }
                out
            }
        };

        let mut results_by_provider = BTreeMap::new();
        let mut response_times_ms = BTreeMap::new();
        let mut tokens_used = BTreeMap::new();
        let mut costs = BTreeMap::new();
        let mut llm_errors = BTreeMap::new();
        let mut total_cost = 0.0;

        for r in results {
            response_times_ms.insert(r.provider_id.clone(), r.response_time_ms);
            tokens_used.insert(r.provider_id.clone(), r.tokens_used);
            costs.insert(r.provider_id.clone(), r.estimated_cost);
            total_cost += r.estimated_cost;
            if let Some(error) = &r.error {
                llm_errors.insert(r.provider_id.clone(), error.clone());
            }
            results_by_provider.insert(r.provider_id, r.findings);
        }

        let aggregation = aggregate(&results_by_provider, &self.config.consensus);
        let finished_at = Utc::now();

        Ok(AggregatedReviewResult {
            code_context: ctx.clone(),
            results_by_provider,
            aggregation,
            meta: ReviewMeta {
                started_at,
                finished_at,
                total_duration_ms: start.elapsed().as_millis() as u64,
                response_times_ms,
                tokens_used,
                costs,
                total_cost,
                llm_errors,
            },
        })
    }

    /// Cumulative usage across all providers (reporting passthrough).
    pub fn total_usage(&self) -> anyhow::Result<UsageTotals> {
        self.ledger.total_usage()
    }

    /// Cumulative usage for one provider (reporting passthrough).
    pub fn usage_for(&self, provider_id: &str) -> anyhow::Result<Option<UsageLedgerEntry>> {
        self.ledger.usage_for(provider_id)
    }

    /// One provider's full call sequence. Infallible by design: every
    /// failure mode collapses into a failed [`ProviderReviewResult`].
    async fn review_one(
        &self,
        provider: &ProviderConfig,
        code: &str,
        ctx: &CodeContext,
    ) -> ProviderReviewResult {
        let start = Instant::now();

        let prompt = match self.prompts.resolve(&self.config.prompt_template, &prompt_vars(ctx)) {
            Ok(p) => p,
            Err(e) => {
                return self.fail(provider, format!("prompt resolution failed: {e}"), start)
            }
        };

        let wire = build_wire_request(provider, &prompt, code, ctx, &self.config.system_prompt);

        let secret = match &provider.auth_env_var {
            Some(var) => match self.secrets.lookup(var) {
                Some(s) => Some(s),
                None => {
                    let err = TransportError::MissingSecret {
                        env_var: var.clone(),
                    };
                    return self.fail(provider, err.to_string(), start);
                }
            },
            None => None,
        };

        tracing::info!(
            provider = %provider.id,
            model = %provider.model,
            family = provider.family.label(),
            "dispatching review request"
        );

        let reply = match self.transport.call(provider, &wire, secret.as_deref()).await {
            Ok(reply) => reply,
            Err(e) => return self.fail(provider, e.to_string(), start),
        };

        let (findings, warnings) = normalize(&reply.text, &provider.id, ctx);
        let usage = reply.usage.unwrap_or(TokenUsage {
            input_tokens: (wire.body.len() / BYTES_PER_TOKEN) as u64,
            output_tokens: (reply.text.len() / BYTES_PER_TOKEN) as u64,
        });
        let cost = estimate_cost(provider, usage);

        // Accounting is best-effort: a ledger write failure never fails
        // the review.
        if let Err(e) = self.ledger.record_success(&provider.id, usage.total(), cost) {
            tracing::warn!(provider = %provider.id, error = %e, "usage ledger write failed");
        }

        let response_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            provider = %provider.id,
            findings = findings.len(),
            tokens = usage.total(),
            duration_ms = response_time_ms,
            "review completed"
        );

        ProviderReviewResult {
            provider_id: provider.id.clone(),
            success: true,
            findings,
            raw_response: reply.text,
            tokens_used: usage.total(),
            estimated_cost: cost,
            response_time_ms,
            error: None,
            warnings: warnings.iter().map(ToString::to_string).collect(),
        }
    }

    fn fail(
        &self,
        provider: &ProviderConfig,
        error: String,
        start: Instant,
    ) -> ProviderReviewResult {
        tracing::warn!(provider = %provider.id, error = %error, "provider review failed");
        if let Err(e) = self.ledger.record_error(&provider.id) {
            tracing::warn!(provider = %provider.id, error = %e, "usage ledger write failed");
        }
        ProviderReviewResult::failed(&provider.id, error, start.elapsed().as_millis() as u64)
    }
}

fn prompt_vars(ctx: &CodeContext) -> HashMap<String, String> {
    let mut vars = HashMap::from([
        ("file_path".to_string(), ctx.file_path.clone()),
        ("language".to_string(), ctx.language.clone()),
        ("total_lines".to_string(), ctx.total_lines.to_string()),
    ]);
    if let Some(framework) = &ctx.framework {
        vars.insert("framework".to_string(), framework.clone());
    }
    vars
}

/// Price a call from the provider's configured rates, falling back to a
/// conservative per-id table when no rates are configured.
fn estimate_cost(provider: &ProviderConfig, usage: TokenUsage) -> f64 {
    let (input_rate, output_rate) =
        if provider.input_cost_per_1k > 0.0 || provider.output_cost_per_1k > 0.0 {
            (provider.input_cost_per_1k, provider.output_cost_per_1k)
        } else {
            fallback_rates(&provider.id)
        };
    (usage.input_tokens as f64 / 1_000.0) * input_rate
        + (usage.output_tokens as f64 / 1_000.0) * output_rate
}

/// Approximate USD per 1k tokens for well-known provider ids; anything
/// unrecognized gets a deliberately conservative default.
fn fallback_rates(provider_id: &str) -> (f64, f64) {
    let id = provider_id.to_ascii_lowercase();
    match id.as_str() {
        m if m.contains("claude") || m.contains("anthropic") => (0.003, 0.015),
        m if m.contains("gpt") || m.contains("openai") => (0.0025, 0.01),
        m if m.contains("gemini") || m.contains("google") => (0.0005, 0.0015),
        m if m.contains("local") || m.contains("ollama") => (0.0, 0.0),
        _ => (0.001, 0.003),
    }
}

// ── Tests ────────────────────────────────────────────────────────
