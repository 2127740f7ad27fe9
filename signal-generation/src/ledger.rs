// Signal Ledger
// Append-only per-user audit record of every generation and validation
// outcome. Also backs the generator's rate limiter via count_recent.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use common::{RiskCheck, TradeSignal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Which input was too old to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaleSource {
    Guidance,
    Holdings,
}

/// How a pipeline cycle ended. Every invocation leaves exactly one trace;
/// no signal is silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerOutcome {
    SignalGenerated {
        signal: TradeSignal,
    },
    /// Largest discrepancy stayed under the rebalance threshold
    WithinThresholds {
        max_discrepancy: Decimal,
    },
    /// Discrepancies exceed the threshold but no opposing buy/sell pair
    /// exists to trade between
    NoOpposingPair {
        max_discrepancy: Decimal,
    },
    /// A tradable pair exists but moves less value than the minimum trade
    /// size
    SuppressedDust {
        trade_value_usd: Decimal,
        minimum: Decimal,
    },
    SuppressedByRateLimit {
        recent: usize,
        cap: usize,
    },
    RejectedStale {
        source: StaleSource,
        age_seconds: i64,
    },
    RejectedLowConfidence {
        confidence: f64,
        minimum: f64,
    },
    RejectedAllocationSum {
        total: Decimal,
        tolerance: Decimal,
    },
    /// Guidance or chain adapter failed or timed out during generation
    RejectedUpstream {
        reason: String,
    },
    SignalValidated {
        signal_id: Uuid,
        validation_id: Uuid,
    },
    SignalRejected {
        signal_id: Uuid,
        check_failed: RiskCheck,
        message: String,
    },
}

impl LedgerOutcome {
    /// Short name used for stats aggregation
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerOutcome::SignalGenerated { .. } => "signal_generated",
            LedgerOutcome::WithinThresholds { .. } => "within_thresholds",
            LedgerOutcome::NoOpposingPair { .. } => "no_opposing_pair",
            LedgerOutcome::SuppressedDust { .. } => "suppressed_dust",
            LedgerOutcome::SuppressedByRateLimit { .. } => "suppressed_by_rate_limit",
            LedgerOutcome::RejectedStale { .. } => "rejected_stale",
            LedgerOutcome::RejectedLowConfidence { .. } => "rejected_low_confidence",
            LedgerOutcome::RejectedAllocationSum { .. } => "rejected_allocation_sum",
            LedgerOutcome::RejectedUpstream { .. } => "rejected_upstream",
            LedgerOutcome::SignalValidated { .. } => "signal_validated",
            LedgerOutcome::SignalRejected { .. } => "signal_rejected",
        }
    }
}

/// One immutable ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user_id: String,
    pub vault_address: String,
    pub recorded_at: DateTime<Utc>,
    pub outcome: LedgerOutcome,
}

impl LedgerEntry {
    pub fn now(user_id: &str, vault_address: &str, outcome: LedgerOutcome) -> Self {
        Self {
            user_id: user_id.to_string(),
            vault_address: vault_address.to_string(),
            recorded_at: Utc::now(),
            outcome,
        }
    }
}

/// Ledger statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_entries: usize,
    pub entries_by_outcome: HashMap<String, usize>,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Trait for ledger backends.
///
/// Entries are append-only; `clear` is an explicit administrative
/// operation, not part of normal flow.
#[async_trait::async_trait]
pub trait SignalLedger: Send + Sync {
    /// Append an entry. At-least-once semantics; entries are never mutated.
    async fn append(&self, entry: LedgerEntry) -> Result<()>;

    /// All entries for a user across their vaults, in append order
    async fn list(&self, user_id: &str) -> Result<Vec<LedgerEntry>>;

    /// Number of signals GENERATED for the user within the window.
    /// Suppressions and validation outcomes do not count against the cap.
    async fn count_recent(&self, user_id: &str, window: Duration) -> Result<usize>;

    /// Drop all entries for a user (administrative)
    async fn clear(&self, user_id: &str) -> Result<()>;

    /// Ledger statistics across all users
    async fn stats(&self) -> Result<LedgerStats>;
}

/// In-memory ledger keyed by user id.
///
/// Concurrent appends and reads are safe; swap in a persistent backend for
/// multi-instance deployments.
pub struct InMemoryLedger {
    entries: tokio::sync::RwLock<HashMap<String, Vec<LedgerEntry>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            entries: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SignalLedger for InMemoryLedger {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries
            .entry(entry.user_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(user_id).cloned().unwrap_or_default())
    }

    async fn count_recent(&self, user_id: &str, window: Duration) -> Result<usize> {
        let cutoff = Utc::now() - window;
        let entries = self.entries.read().await;
        let count = entries
            .get(user_id)
            .map(|user_entries| {
                user_entries
                    .iter()
                    .filter(|e| e.recorded_at >= cutoff)
                    .filter(|e| matches!(e.outcome, LedgerOutcome::SignalGenerated { .. }))
                    .count()
            })
            .unwrap_or(0);
        Ok(count)
    }

    async fn clear(&self, user_id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(user_id);
        Ok(())
    }

    async fn stats(&self) -> Result<LedgerStats> {
        let entries = self.entries.read().await;

        let mut entries_by_outcome = HashMap::new();
        let mut oldest_entry = None;
        let mut newest_entry = None;
        let mut total_entries = 0;

        for entry in entries.values().flatten() {
            total_entries += 1;
            *entries_by_outcome
                .entry(entry.outcome.kind().to_string())
                .or_insert(0) += 1;

            if oldest_entry.map_or(true, |t| entry.recorded_at < t) {
                oldest_entry = Some(entry.recorded_at);
            }
            if newest_entry.map_or(true, |t| entry.recorded_at > t) {
                newest_entry = Some(entry.recorded_at);
            }
        }

        Ok(LedgerStats {
            total_entries,
            entries_by_outcome,
            oldest_entry,
            newest_entry,
        })
    }
}
