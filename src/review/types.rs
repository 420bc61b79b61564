//! Canonical data model for the review engine.
//!
//! Every type here is part of the serialized schema contract with report
//! generators: field names (camelCase on the wire) and nesting are stable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Severity ─────────────────────────────────────────────────────

/// Severity level for a review finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational suggestion, not a blocker.
    Low,
    /// Should be addressed but not urgent.
    Medium,
    /// Important issue that should be fixed soon.
    High,
    /// Must-fix: correctness, security, or architecture violation.
    Critical,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse a reviewer-supplied severity word, defaulting to `Medium`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Category ─────────────────────────────────────────────────────

/// Category of a review finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Security,
    Performance,
    Maintainability,
    Architecture,
    CodeSmell,
    BestPractice,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Maintainability => "maintainability",
            Self::Architecture => "architecture",
            Self::CodeSmell => "code-smell",
            Self::BestPractice => "best-practice",
        }
    }

    /// Parse a reviewer-supplied category word, defaulting to `CodeSmell`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "security" => Self::Security,
            "performance" | "efficiency" => Self::Performance,
            "maintainability" => Self::Maintainability,
            "architecture" => Self::Architecture,
            "best-practice" | "best_practice" | "bestpractice" => Self::BestPractice,
            _ => Self::CodeSmell,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Business impact ──────────────────────────────────────────────

/// Rough business impact of leaving a finding unfixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessImpact {
    Low,
    Medium,
    High,
}

impl BusinessImpact {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

// ── Code context ─────────────────────────────────────────────────

/// Project metadata attached to a review request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Value object describing the unit of code under review.
/// Constructed per call, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeContext {
    pub file_path: String,
    pub language: String,
    #[serde(default)]
    pub framework: Option<String>,
    pub total_lines: usize,
    #[serde(default)]
    pub project_meta: Option<ProjectMeta>,
    /// Unified diff, when reviewing a change rather than a whole file.
    #[serde(default)]
    pub diff_text: Option<String>,
}

// ── Finding ──────────────────────────────────────────────────────

/// A single reported issue from one provider about one piece of code.
///
/// Created exclusively by the response normalizer; immutable thereafter.
/// Every optional reviewer field has an explicit default, so a
/// partially-specified model response never yields a partially-specified
/// finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Id of the provider that reported this finding (back-reference).
    pub provider_id: String,
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub suggestion: String,
    pub file_path: String,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub line_range: Option<(u32, u32)>,
    #[serde(default)]
    pub code_snippet: Option<String>,
    /// Reviewer-reported confidence in [0, 1].
    pub confidence: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub estimated_fix_time: Option<String>,
    pub business_impact: BusinessImpact,
}

// ── Per-provider result ──────────────────────────────────────────

/// Outcome of one provider's review call.
///
/// Owned by the orchestrator for the duration of one review, then folded
/// into the aggregate. A failed provider has `success: false`, no findings,
/// and a populated `error`, never an escalated exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReviewResult {
    pub provider_id: String,
    pub success: bool,
    pub findings: Vec<Finding>,
    pub raw_response: String,
    pub tokens_used: u64,
    pub estimated_cost: f64,
    pub response_time_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    /// Non-fatal normalizer warnings (absent JSON, skipped elements).
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ProviderReviewResult {
    /// A failed result carrying only the error and timing.
    pub fn failed(provider_id: &str, error: String, response_time_ms: u64) -> Self {
        Self {
            provider_id: provider_id.into(),
            success: false,
            findings: vec![],
            raw_response: String::new(),
            tokens_used: 0,
            estimated_cost: 0.0,
            response_time_ms,
            error: Some(error),
            warnings: vec![],
        }
    }
}

// ── Aggregation summary ──────────────────────────────────────────

/// Deterministic cross-provider statistics over one review call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSummary {
    pub total_findings: usize,
    pub findings_by_severity: BTreeMap<Severity, usize>,
    pub findings_by_category: BTreeMap<Category, usize>,
    /// Findings that met the agreement quorum, one entry per agreeing
    /// provider: each reviewer's phrasing of the shared issue is kept.
    pub consensus_findings: Vec<Finding>,
    /// Per provider, the findings not similar to any consensus finding.
    pub unique_findings_by_provider: BTreeMap<String, Vec<Finding>>,
    /// Fraction of all findings that participate in some consensus group.
    pub agreement_score: f64,
}

// ── Review metadata ──────────────────────────────────────────────

/// Timing, token, cost, and error accounting for one review call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMeta {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub response_times_ms: BTreeMap<String, u64>,
    pub tokens_used: BTreeMap<String, u64>,
    pub costs: BTreeMap<String, f64>,
    pub total_cost: f64,
    /// Per-provider failure messages. A provider present here failed; a
    /// provider with an empty finding list and no entry here found nothing.
    pub llm_errors: BTreeMap<String, String>,
}

// ── Aggregated result ────────────────────────────────────────────

/// The sole artifact a review call returns to collaborators.
/// Not mutated after construction; serializes losslessly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedReviewResult {
    pub code_context: CodeContext,
    pub results_by_provider: BTreeMap<String, Vec<Finding>>,
    pub aggregation: AggregationSummary,
    pub meta: ReviewMeta,
}

impl AggregatedReviewResult {
    /// Render the aggregate as markdown for human consumption.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "## Review of `{}` ({} providers)\n\n",
            self.code_context.file_path,
            self.results_by_provider.len(),
        ));
        md.push_str(&format!(
            "**Findings**: {} | **Agreement**: {:.0}% | **Cost**: ${:.4} | **Duration**: {}ms\n\n",
            self.aggregation.total_findings,
            self.aggregation.agreement_score * 100.0,
            self.meta.total_cost,
            self.meta.total_duration_ms,
        ));

        if !self.aggregation.consensus_findings.is_empty() {
            md.push_str("### Consensus Findings\n\n");
            md.push_str("| Provider | Severity | Category | Message |\n");
            md.push_str("|----------|----------|----------|----------|\n");
            for f in &self.aggregation.consensus_findings {
                md.push_str(&format!(
                    "| {} | {} | {} | {}{} |\n",
                    f.provider_id,
                    f.severity,
                    f.category,
                    f.message,
                    f.line_number
                        .map(|n| format!(" (`{}:{}`)", f.file_path, n))
                        .unwrap_or_default(),
                ));
            }
            md.push('\n');
        }

        for (provider, findings) in &self.aggregation.unique_findings_by_provider {
            if findings.is_empty() {
                continue;
            }
            md.push_str(&format!("### Unique to `{provider}`\n\n"));
            for f in findings {
                md.push_str(&format!("- **{}** [{}] {}\n", f.severity, f.category, f.message));
            }
            md.push('\n');
        }

        if !self.meta.llm_errors.is_empty() {
            md.push_str("### Provider Errors\n\n");
            for (provider, error) in &self.meta.llm_errors {
                md.push_str(&format!("- `{provider}`: {error}\n"));
            }
        }

        md
    }
}

// ── Tests ────────────────────────────────────────────────────────
