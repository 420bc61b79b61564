//! Durable per-provider usage accounting.
//!
//! Additive counters (requests, tokens, cost, errors) in a local SQLite
//! ledger that outlives any single process run. Each increment is one
//! committed UPSERT; writes are serialized through a mutex so parallel
//! provider tasks cannot lose updates. A crash between a provider call and
//! its ledger write loses exactly that one increment; there is no
//! two-phase commit across the network call and the write.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Cumulative usage for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLedgerEntry {
    pub provider_id: String,
    pub total_requests: u64,
    pub total_tokens_used: u64,
    pub total_cost: f64,
    pub error_count: u64,
    pub last_used: DateTime<Utc>,
}

/// Cross-provider usage rollup for status displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub total_requests: u64,
    pub total_tokens_used: u64,
    pub total_cost: f64,
    pub error_count: u64,
    pub by_provider: Vec<UsageLedgerEntry>,
}

/// SQLite-backed usage ledger with serialized writes.
pub struct UsageLedger {
    conn: Mutex<Connection>,
}

impl UsageLedger {
    /// Open (or create) the ledger at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening usage ledger at {}", path.display()))?;
        Self::init(conn)
    }

    /// In-memory ledger for tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS usage_ledger (
                provider_id TEXT PRIMARY KEY,
                total_requests INTEGER NOT NULL DEFAULT 0,
                total_tokens INTEGER NOT NULL DEFAULT 0,
                total_cost REAL NOT NULL DEFAULT 0.0,
                error_count INTEGER NOT NULL DEFAULT 0,
                last_used INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record one successful provider call.
    pub fn record_success(&self, provider_id: &str, tokens: u64, cost: f64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO usage_ledger (provider_id, total_requests, total_tokens, total_cost, error_count, last_used)
             VALUES (?1, 1, ?2, ?3, 0, ?4)
             ON CONFLICT(provider_id) DO UPDATE SET
                 total_requests = total_requests + 1,
                 total_tokens = total_tokens + excluded.total_tokens,
                 total_cost = total_cost + excluded.total_cost,
                 last_used = excluded.last_used",
            params![provider_id, tokens as i64, cost, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Record one failed provider call.
    pub fn record_error(&self, provider_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO usage_ledger (provider_id, total_requests, total_tokens, total_cost, error_count, last_used)
             VALUES (?1, 1, 0, 0.0, 1, ?2)
             ON CONFLICT(provider_id) DO UPDATE SET
                 total_requests = total_requests + 1,
                 error_count = error_count + 1,
                 last_used = excluded.last_used",
            params![provider_id, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    /// Cumulative usage for one provider, or `None` if never seen.
    pub fn usage_for(&self, provider_id: &str) -> Result<Option<UsageLedgerEntry>> {
        let conn = self.conn.lock();
        let entry = conn
            .query_row(
                "SELECT provider_id, total_requests, total_tokens, total_cost, error_count, last_used
                 FROM usage_ledger WHERE provider_id = ?1",
                params![provider_id],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Aggregate usage across all providers, ordered by cost descending.
    pub fn total_usage(&self) -> Result<UsageTotals> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT provider_id, total_requests, total_tokens, total_cost, error_count, last_used
             FROM usage_ledger ORDER BY total_cost DESC, provider_id ASC",
        )?;
        let by_provider: Vec<UsageLedgerEntry> = stmt
            .query_map([], row_to_entry)?
            .collect::<rusqlite::Result<_>>()?;

        let mut totals = UsageTotals {
            total_requests: 0,
            total_tokens_used: 0,
            total_cost: 0.0,
            error_count: 0,
            by_provider: vec![],
        };
        for entry in &by_provider {
            totals.total_requests += entry.total_requests;
            totals.total_tokens_used += entry.total_tokens_used;
            totals.total_cost += entry.total_cost;
            totals.error_count += entry.error_count;
        }
        totals.by_provider = by_provider;
        Ok(totals)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageLedgerEntry> {
    let last_used: i64 = row.get(5)?;
    Ok(UsageLedgerEntry {
        provider_id: row.get(0)?,
        total_requests: row.get::<_, i64>(1)? as u64,
        total_tokens_used: row.get::<_, i64>(2)? as u64,
        total_cost: row.get(3)?,
        error_count: row.get::<_, i64>(4)? as u64,
        last_used: DateTime::from_timestamp(last_used, 0).unwrap_or_else(Utc::now),
    })
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn success_increments_are_additive() {
        let ledger = UsageLedger::open_in_memory().unwrap();
        ledger.record_success("anthropic", 100, 0.01).unwrap();
        ledger.record_success("anthropic", 50, 0.005).unwrap();

        let entry = ledger.usage_for("anthropic").unwrap().unwrap();
        assert_eq!(entry.total_tokens_used, 150);
        assert_eq!(entry.total_requests, 2);
        assert_eq!(entry.error_count, 0);
        assert!((entry.total_cost - 0.015).abs() < 1e-9);
    }

    #[test]
    fn errors_count_requests_but_not_tokens() {
        let ledger = UsageLedger::open_in_memory().unwrap();
        ledger.record_error("flaky").unwrap();
        ledger.record_success("flaky", 10, 0.001).unwrap();
        ledger.record_error("flaky").unwrap();

        let entry = ledger.usage_for("flaky").unwrap().unwrap();
        assert_eq!(entry.total_requests, 3);
        assert_eq!(entry.error_count, 2);
        assert_eq!(entry.total_tokens_used, 10);
    }

    #[test]
    fn unknown_provider_is_none() {
        let ledger = UsageLedger::open_in_memory().unwrap();
        assert!(ledger.usage_for("never-seen").unwrap().is_none());
    }

    #[test]
    fn totals_roll_up_across_providers() {
        let ledger = UsageLedger::open_in_memory().unwrap();
        ledger.record_success("a", 100, 0.02).unwrap();
        ledger.record_success("b", 200, 0.05).unwrap();
        ledger.record_error("b").unwrap();

        let totals = ledger.total_usage().unwrap();
        assert_eq!(totals.total_requests, 3);
        assert_eq!(totals.total_tokens_used, 300);
        assert_eq!(totals.error_count, 1);
        assert!((totals.total_cost - 0.07).abs() < 1e-9);
        // Ordered by cost descending.
        assert_eq!(totals.by_provider[0].provider_id, "b");
    }

    #[test]
    fn counters_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("usage.db");

        {
            let ledger = UsageLedger::open(&path).unwrap();
            ledger.record_success("persistent", 100, 0.01).unwrap();
        }

        let ledger = UsageLedger::open(&path).unwrap();
        ledger.record_success("persistent", 50, 0.005).unwrap();
        let entry = ledger.usage_for("persistent").unwrap().unwrap();
        assert_eq!(entry.total_tokens_used, 150);
        assert_eq!(entry.total_requests, 2);
    }

    #[test]
    fn empty_ledger_totals_are_zero() {
        let ledger = UsageLedger::open_in_memory().unwrap();
        let totals = ledger.total_usage().unwrap();
        assert_eq!(totals.total_requests, 0);
        assert!(totals.by_provider.is_empty());
    }
}
