// Signal Generator
// Compares a strategy's target allocation against a vault's actual
// holdings and emits at most one rebalancing signal per invocation.

use crate::ledger::{LedgerEntry, LedgerOutcome, SignalLedger, StaleSource};
use anyhow::Result;
use chrono::{Duration, Utc};
use common::{
    AssetRef, SignalMetadata, StrategicGuidance, TradeAction, TradeSignal, VaultHoldings,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How to treat guidance whose target percentages do not sum near 100.
/// Upstream never enforces the sum, so the policy is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationSumPolicy {
    Ignore,
    Warn,
    Reject,
}

/// Configuration for the signal generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Minimum absolute discrepancy (percentage points) before a rebalance
    /// is worth signalling
    pub rebalance_threshold: Decimal,
    /// Minimum guidance confidence, 0.0 to 1.0
    pub min_confidence: f64,
    /// Guidance or holdings older than this never produce a signal (seconds)
    pub staleness_threshold_secs: i64,
    /// Per-user cap on generated signals within the rate-limit window
    pub max_signals_per_window: usize,
    /// Rate-limit window length (seconds)
    pub rate_limit_window_secs: i64,
    /// Rebalances moving less value than this are suppressed as dust (USD)
    pub min_trade_value_usd: Decimal,
    pub allocation_sum_policy: AllocationSumPolicy,
    /// Allowed deviation of the allocation sum from 100 (percentage points)
    pub allocation_sum_tolerance: Decimal,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            rebalance_threshold: Decimal::from(5),
            min_confidence: 0.7,
            staleness_threshold_secs: 60,
            max_signals_per_window: 3,
            rate_limit_window_secs: 3600,
            min_trade_value_usd: Decimal::ONE,
            allocation_sum_policy: AllocationSumPolicy::Warn,
            allocation_sum_tolerance: Decimal::from(5),
        }
    }
}

/// Per-asset gap between target and current allocation
#[derive(Debug, Clone)]
struct AssetDiscrepancy {
    mint_address: String,
    symbol: String,
    target_percentage: Decimal,
    current_percentage: Decimal,
    /// target minus current, in percentage points; positive means
    /// under-allocated (buy), negative means over-allocated (sell)
    discrepancy: Decimal,
}

/// Emits candidate rebalancing signals; owns `TradeSignal` creation.
///
/// Every invocation outcome is appended to the ledger, including the
/// suppressed ones.
pub struct SignalGenerator {
    config: GeneratorConfig,
    ledger: Arc<dyn SignalLedger>,
}

impl SignalGenerator {
    pub fn new(config: GeneratorConfig, ledger: Arc<dyn SignalLedger>) -> Self {
        Self { config, ledger }
    }

    /// Compare guidance against holdings and emit zero or one signal.
    ///
    /// `None` is the normal outcome for stale inputs, low confidence,
    /// portfolios within thresholds, and rate-limited users; the reason is
    /// always recorded in the ledger, never a hard failure.
    pub async fn generate(
        &self,
        user_id: &str,
        vault_address: &str,
        guidance: &StrategicGuidance,
        holdings: &VaultHoldings,
    ) -> Result<Option<TradeSignal>> {
        let now = Utc::now();
        let staleness = Duration::seconds(self.config.staleness_threshold_secs);

        if guidance.is_stale(staleness, now) {
            let age = guidance.age_seconds(now);
            info!(
                user_id,
                target_id = %guidance.target_id,
                age_seconds = age,
                "Guidance is stale - no signal"
            );
            self.record(
                user_id,
                vault_address,
                LedgerOutcome::RejectedStale {
                    source: StaleSource::Guidance,
                    age_seconds: age,
                },
            )
            .await?;
            return Ok(None);
        }

        if holdings.is_stale(staleness, now) {
            let age = holdings.age_seconds(now);
            info!(user_id, vault_address, age_seconds = age, "Holdings are stale - no signal");
            self.record(
                user_id,
                vault_address,
                LedgerOutcome::RejectedStale {
                    source: StaleSource::Holdings,
                    age_seconds: age,
                },
            )
            .await?;
            return Ok(None);
        }

        if guidance.confidence < self.config.min_confidence {
            info!(
                user_id,
                confidence = guidance.confidence,
                minimum = self.config.min_confidence,
                "Guidance confidence below threshold - no signal"
            );
            self.record(
                user_id,
                vault_address,
                LedgerOutcome::RejectedLowConfidence {
                    confidence: guidance.confidence,
                    minimum: self.config.min_confidence,
                },
            )
            .await?;
            return Ok(None);
        }

        let allocation_total = guidance.allocation_total();
        let deviation = (allocation_total - Decimal::ONE_HUNDRED).abs();
        if deviation > self.config.allocation_sum_tolerance {
            match self.config.allocation_sum_policy {
                AllocationSumPolicy::Ignore => {}
                AllocationSumPolicy::Warn => {
                    warn!(
                        user_id,
                        target_id = %guidance.target_id,
                        allocation_total = %allocation_total,
                        "Guidance allocation does not sum near 100 - proceeding"
                    );
                }
                AllocationSumPolicy::Reject => {
                    warn!(
                        user_id,
                        target_id = %guidance.target_id,
                        allocation_total = %allocation_total,
                        "Guidance allocation does not sum near 100 - rejecting"
                    );
                    self.record(
                        user_id,
                        vault_address,
                        LedgerOutcome::RejectedAllocationSum {
                            total: allocation_total,
                            tolerance: self.config.allocation_sum_tolerance,
                        },
                    )
                    .await?;
                    return Ok(None);
                }
            }
        }

        let discrepancies = compute_discrepancies(guidance, holdings);

        let max_discrepancy = discrepancies
            .iter()
            .map(|d| d.discrepancy.abs())
            .max()
            .unwrap_or(Decimal::ZERO);

        if max_discrepancy <= self.config.rebalance_threshold {
            debug!(
                user_id,
                max_discrepancy = %max_discrepancy,
                threshold = %self.config.rebalance_threshold,
                "Portfolio within acceptable thresholds"
            );
            self.record(
                user_id,
                vault_address,
                LedgerOutcome::WithinThresholds { max_discrepancy },
            )
            .await?;
            return Ok(None);
        }

        let buy = discrepancies
            .iter()
            .filter(|d| d.discrepancy > Decimal::ZERO)
            .max_by(|a, b| a.discrepancy.cmp(&b.discrepancy));
        let sell = discrepancies
            .iter()
            .filter(|d| d.discrepancy < Decimal::ZERO)
            .min_by(|a, b| a.discrepancy.cmp(&b.discrepancy));

        let (buy, sell) = match (buy, sell) {
            (Some(buy), Some(sell)) => (buy, sell),
            // Happens when the allocation sum deviates from 100, e.g. every
            // discrepancy is positive
            _ => {
                debug!(user_id, "No opposing discrepancy pair - no signal");
                self.record(
                    user_id,
                    vault_address,
                    LedgerOutcome::NoOpposingPair { max_discrepancy },
                )
                .await?;
                return Ok(None);
            }
        };

        // The movable value is bounded by both sides of the pair
        let trade_value_usd = buy.discrepancy.min(sell.discrepancy.abs())
            / Decimal::ONE_HUNDRED
            * holdings.total_value_usd;
        if trade_value_usd < self.config.min_trade_value_usd {
            debug!(
                user_id,
                trade_value_usd = %trade_value_usd,
                "Rebalance value below minimum trade size - suppressing dust"
            );
            self.record(
                user_id,
                vault_address,
                LedgerOutcome::SuppressedDust {
                    trade_value_usd,
                    minimum: self.config.min_trade_value_usd,
                },
            )
            .await?;
            return Ok(None);
        }

        let window = Duration::seconds(self.config.rate_limit_window_secs);
        let recent = self.ledger.count_recent(user_id, window).await?;
        if recent >= self.config.max_signals_per_window {
            info!(
                user_id,
                recent,
                cap = self.config.max_signals_per_window,
                "Per-user signal cap reached - suppressing"
            );
            self.record(
                user_id,
                vault_address,
                LedgerOutcome::SuppressedByRateLimit {
                    recent,
                    cap: self.config.max_signals_per_window,
                },
            )
            .await?;
            return Ok(None);
        }

        let signal = TradeSignal {
            action: TradeAction::Rebalance,
            user_id: user_id.to_string(),
            vault_address: vault_address.to_string(),
            from_asset: AssetRef {
                mint_address: sell.mint_address.clone(),
                symbol: sell.symbol.clone(),
            },
            to_asset: AssetRef {
                mint_address: buy.mint_address.clone(),
                symbol: buy.symbol.clone(),
            },
            target_percentage: buy.target_percentage,
            metadata: SignalMetadata {
                signal_id: Uuid::new_v4(),
                discrepancy: buy.discrepancy,
                confidence: guidance.confidence,
                current_percentage: buy.current_percentage,
                timestamp: now,
            },
        };

        info!(
            user_id,
            signal_id = %signal.metadata.signal_id,
            from = %signal.from_asset.symbol,
            to = %signal.to_asset.symbol,
            discrepancy = %signal.metadata.discrepancy,
            target_percentage = %signal.target_percentage,
            "Generated rebalance signal"
        );
        self.record(
            user_id,
            vault_address,
            LedgerOutcome::SignalGenerated {
                signal: signal.clone(),
            },
        )
        .await?;

        Ok(Some(signal))
    }

    async fn record(
        &self,
        user_id: &str,
        vault_address: &str,
        outcome: LedgerOutcome,
    ) -> Result<()> {
        self.ledger
            .append(LedgerEntry::now(user_id, vault_address, outcome))
            .await
    }
}

/// Discrepancies over the union of guidance and holdings mints, ordered by
/// mint address so pair selection is deterministic. Holdings percentages
/// are recomputed from USD values, never trusted as reported.
fn compute_discrepancies(
    guidance: &StrategicGuidance,
    holdings: &VaultHoldings,
) -> Vec<AssetDiscrepancy> {
    let mints: BTreeSet<&String> = guidance
        .allocation
        .keys()
        .chain(holdings.assets.keys())
        .collect();

    mints
        .into_iter()
        .map(|mint| {
            let target_percentage = guidance.target_percentage_of(mint);
            let current_percentage = holdings.percentage_of(mint);
            let symbol = guidance
                .allocation
                .get(mint)
                .map(|t| t.symbol.clone())
                .or_else(|| holdings.assets.get(mint).map(|h| h.symbol.clone()))
                .unwrap_or_else(|| mint.clone());

            AssetDiscrepancy {
                mint_address: mint.clone(),
                symbol,
                target_percentage,
                current_percentage,
                discrepancy: target_percentage - current_percentage,
            }
        })
        .collect()
}
