//! Multi-provider review pipeline: schema, normalization, consensus,
//! and orchestration.
//!
//! ## Architecture
//!
//! ```text
//! code + ctx ─┬─▸ provider A ─▸ normalize ─▸ [Finding] ─┐
//!             ├─▸ provider B ─▸ normalize ─▸ [Finding] ─┼─▸ aggregate ─▸ AggregatedReviewResult
//!             └─▸ provider C ─▸ (failed) ──▸ []        ─┘
//! ```
//!
//! Each provider runs in isolation: a timeout, bad secret, or garbled
//! response turns into a failed per-provider result, never a failed
//! review. The aggregation pass is pure and deterministic for a fixed
//! set of per-provider finding lists.

pub mod consensus;
pub mod normalize;
pub mod orchestrator;
pub mod types;

pub use consensus::{aggregate, message_similarity, similar};
pub use normalize::{normalize, NormalizeWarning};
pub use orchestrator::ReviewOrchestrator;
pub use types::{
    AggregatedReviewResult, AggregationSummary, BusinessImpact, Category, CodeContext, Finding,
    ProjectMeta, ProviderReviewResult, ReviewMeta, Severity,
};
