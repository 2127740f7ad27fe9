use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One asset position inside a vault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetHolding {
    pub symbol: String,
    /// Token balance in whole units (decimals already applied)
    pub balance: Decimal,
    pub value_usd: Decimal,
    /// Share of total vault value, in percentage points. Derived, never
    /// trusted as reported by upstream; see `recompute_percentages`.
    pub percentage: Decimal,
}

/// Current on-chain composition of a custodial vault, keyed by mint address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultHoldings {
    pub vault_address: String,
    pub total_value_usd: Decimal,
    pub assets: HashMap<String, AssetHolding>,
    pub last_fetched: DateTime<Utc>,
}

impl VaultHoldings {
    /// Overwrite every stored percentage with `value_usd / total_value_usd`.
    ///
    /// Percentages reported by chain readers are informational only; the
    /// recomputed values are the ones decisions are made from.
    pub fn recompute_percentages(&mut self) {
        for holding in self.assets.values_mut() {
            holding.percentage = if self.total_value_usd > Decimal::ZERO {
                holding.value_usd / self.total_value_usd * Decimal::ONE_HUNDRED
            } else {
                Decimal::ZERO
            };
        }
    }

    /// Derived share of the vault held in a mint, zero if not held
    pub fn percentage_of(&self, mint_address: &str) -> Decimal {
        if self.total_value_usd <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.assets
            .get(mint_address)
            .map(|holding| holding.value_usd / self.total_value_usd * Decimal::ONE_HUNDRED)
            .unwrap_or(Decimal::ZERO)
    }

    /// Whether this snapshot is too old to act on safely
    pub fn is_stale(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_fetched > threshold
    }

    /// Age of the snapshot in seconds at `now`
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_fetched).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    fn holdings_with(entries: &[(&str, &str, f64, f64)]) -> VaultHoldings {
        let assets: HashMap<String, AssetHolding> = entries
            .iter()
            .map(|(mint, symbol, balance, value)| {
                (
                    mint.to_string(),
                    AssetHolding {
                        symbol: symbol.to_string(),
                        balance: Decimal::from_f64(*balance).unwrap(),
                        value_usd: Decimal::from_f64(*value).unwrap(),
                        percentage: Decimal::ZERO,
                    },
                )
            })
            .collect();

        let total_value_usd = assets
            .values()
            .fold(Decimal::ZERO, |acc, h| acc + h.value_usd);

        VaultHoldings {
            vault_address: "vault-1".to_string(),
            total_value_usd,
            assets,
            last_fetched: Utc::now(),
        }
    }

    #[test]
    fn test_percentages_are_derived_not_trusted() {
        let mut holdings = holdings_with(&[
            ("mint-a", "USDC", 750.0, 750.0),
            ("mint-b", "SOL", 5.0, 250.0),
        ]);

        // Upstream claims a bogus percentage
        holdings.assets.get_mut("mint-a").unwrap().percentage = Decimal::from(999);

        holdings.recompute_percentages();
        assert_eq!(
            holdings.assets["mint-a"].percentage,
            Decimal::from(75)
        );
        assert_eq!(holdings.percentage_of("mint-b"), Decimal::from(25));
    }

    #[test]
    fn test_empty_vault_has_zero_percentages() {
        let mut holdings = holdings_with(&[("mint-a", "USDC", 0.0, 0.0)]);
        holdings.recompute_percentages();
        assert_eq!(holdings.percentage_of("mint-a"), Decimal::ZERO);
    }

    #[test]
    fn test_unknown_mint_is_zero_percent() {
        let holdings = holdings_with(&[("mint-a", "USDC", 100.0, 100.0)]);
        assert_eq!(holdings.percentage_of("mint-z"), Decimal::ZERO);
    }
}
