use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Target allocation for a single asset within a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub symbol: String,
    /// Target share of the vault, in percentage points (e.g. 60 = 60%)
    pub target_percentage: Decimal,
}

/// Target allocation published for a strategy, keyed by mint address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategicGuidance {
    /// Strategy/trader identifier this guidance was computed for
    pub target_id: String,
    pub allocation: HashMap<String, AllocationTarget>,
    /// Upstream confidence in the allocation, 0.0 to 1.0
    pub confidence: f64,
    pub last_updated: DateTime<Utc>,
}

impl StrategicGuidance {
    /// Sum of target percentages across the allocation.
    ///
    /// Expected to approximate 100 but never assumed exact; callers decide
    /// how to treat deviation.
    pub fn allocation_total(&self) -> Decimal {
        self.allocation
            .values()
            .map(|target| target.target_percentage)
            .sum()
    }

    /// Target percentage for a mint, zero if the strategy does not hold it
    pub fn target_percentage_of(&self, mint_address: &str) -> Decimal {
        self.allocation
            .get(mint_address)
            .map(|target| target.target_percentage)
            .unwrap_or(Decimal::ZERO)
    }

    /// Whether this guidance is too old to act on safely
    pub fn is_stale(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_updated > threshold
    }

    /// Age of the guidance in seconds at `now`
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_updated).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    fn guidance_with(entries: &[(&str, &str, f64)]) -> StrategicGuidance {
        let allocation = entries
            .iter()
            .map(|(mint, symbol, pct)| {
                (
                    mint.to_string(),
                    AllocationTarget {
                        symbol: symbol.to_string(),
                        target_percentage: Decimal::from_f64(*pct).unwrap(),
                    },
                )
            })
            .collect();

        StrategicGuidance {
            target_id: "trader-1".to_string(),
            allocation,
            confidence: 0.9,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_allocation_total() {
        let guidance = guidance_with(&[("mint-a", "SOL", 60.0), ("mint-b", "JUP", 40.0)]);
        assert_eq!(guidance.allocation_total(), Decimal::from(100));
    }

    #[test]
    fn test_missing_asset_targets_zero() {
        let guidance = guidance_with(&[("mint-a", "SOL", 100.0)]);
        assert_eq!(guidance.target_percentage_of("mint-b"), Decimal::ZERO);
    }

    #[test]
    fn test_staleness_boundary() {
        let now = Utc::now();
        let mut guidance = guidance_with(&[("mint-a", "SOL", 100.0)]);
        let threshold = Duration::seconds(60);

        // Exactly at the threshold is still usable
        guidance.last_updated = now - Duration::seconds(60);
        assert!(!guidance.is_stale(threshold, now));

        // One second past the threshold is stale
        guidance.last_updated = now - Duration::seconds(61);
        assert!(guidance.is_stale(threshold, now));
    }
}
