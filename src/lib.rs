//! codequorum: multi-model code review orchestration.
//!
//! Sends one piece of code to any number of independently configured
//! model endpoints, normalizes their free-text answers into a common
//! finding schema, detects which findings multiple reviewers agree on,
//! and returns a single aggregated result with cost and latency
//! accounting.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use codequorum::config::{EngineConfig, ProviderRegistry};
//! use codequorum::ledger::UsageLedger;
//! use codequorum::prompt::TemplateSet;
//! use codequorum::review::{CodeContext, ReviewOrchestrator};
//! use codequorum::secrets::EnvSecrets;
//!
//! # async fn run(providers: Vec<codequorum::config::ProviderConfig>) -> anyhow::Result<()> {
//! let orchestrator = ReviewOrchestrator::new(
//!     ProviderRegistry::new(providers)?,
//!     EngineConfig::default(),
//!     UsageLedger::open(std::path::Path::new("usage.db"))?,
//!     Arc::new(TemplateSet::new()),
//!     Arc::new(EnvSecrets),
//! );
//!
//! let ctx = CodeContext {
//!     file_path: "src/db.rs".into(),
//!     language: "rust".into(),
//!     framework: None,
//!     total_lines: 120,
//!     project_meta: None,
//!     diff_text: None,
//! };
//! let result = orchestrator.review("fn main() {}", &ctx).await?;
//! println!("{}", result.to_markdown());
//! # Ok(())
//! # }
//! ```
//!
//! Failure isolation is the core contract: one provider timing out,
//! rejecting a secret, or answering with prose instead of JSON never
//! affects the others, and the call only fails outright on pre-dispatch
//! conditions (oversized input, invalid registry).

pub mod config;
pub mod error;
pub mod ledger;
pub mod prompt;
pub mod review;
pub mod secrets;
pub mod transport;

pub use config::{DispatchMode, EngineConfig, ProviderConfig, ProviderFamily, ProviderRegistry};
pub use error::{EngineError, TransportError};
pub use ledger::{UsageLedger, UsageLedgerEntry, UsageTotals};
pub use review::{AggregatedReviewResult, CodeContext, Finding, ReviewOrchestrator};
