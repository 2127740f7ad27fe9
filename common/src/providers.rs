// Adapter contracts consumed by the core.
// Implementations live outside the core (RPC clients, quote APIs); the
// pipeline only depends on these traits.

use crate::guidance::StrategicGuidance;
use crate::holdings::VaultHoldings;
use crate::signal::{AssetRef, ValidatedTradeSignal};
use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quote returned by the market-quoting adapter for a candidate swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Expected output amount in the destination asset
    pub expected_out: Decimal,
    /// Expected price impact of the trade, in percentage points
    pub price_impact_pct: Decimal,
    /// Worst-case slippage bound in basis points (wire convention)
    pub slippage_bps: Decimal,
}

impl Quote {
    /// Slippage bound converted from basis points to percentage points
    pub fn slippage_pct(&self) -> Decimal {
        self.slippage_bps / Decimal::ONE_HUNDRED
    }
}

/// Strategy-guidance provider: target allocations with confidence scores
#[async_trait::async_trait]
pub trait GuidanceProvider: Send + Sync {
    async fn get_guidance(&self, target_id: &str) -> Result<StrategicGuidance>;
}

/// Chain-state reader: current holdings of a vault
#[async_trait::async_trait]
pub trait ChainStateReader: Send + Sync {
    async fn get_holdings(&self, vault_address: &str) -> Result<VaultHoldings>;
}

/// Market-quoting capability for price impact and slippage bounds
#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn get_quote(
        &self,
        from_asset: &AssetRef,
        to_asset: &AssetRef,
        amount_usd: Decimal,
    ) -> Result<Quote>;
}

/// Downstream collaborator that submits authorized signals on-chain.
/// The core never signs or broadcasts transactions itself.
#[async_trait::async_trait]
pub trait ExecutionCollaborator: Send + Sync {
    async fn execute(&self, signal: &ValidatedTradeSignal) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    #[test]
    fn test_slippage_bps_to_pct() {
        let quote = Quote {
            expected_out: Decimal::from(100),
            price_impact_pct: Decimal::from_f64(0.5).unwrap(),
            slippage_bps: Decimal::from(30),
        };
        assert_eq!(quote.slippage_pct(), Decimal::from_f64(0.3).unwrap());
    }
}
