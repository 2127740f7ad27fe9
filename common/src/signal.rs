use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action a signal instructs the execution layer to take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Rebalance,
}

/// Asset reference carried on a signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub mint_address: String,
    pub symbol: String,
}

/// Context recorded at signal creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMetadata {
    pub signal_id: Uuid,
    /// Target minus current allocation for the asset being bought,
    /// in percentage points
    pub discrepancy: Decimal,
    /// Guidance confidence at generation time, 0.0 to 1.0
    pub confidence: f64,
    pub current_percentage: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// A candidate rebalancing instruction, not yet authorized.
///
/// Created only by the signal generator and immutable afterwards; the risk
/// validation engine wraps it, never edits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub action: TradeAction,
    pub user_id: String,
    pub vault_address: String,
    /// Over-allocated asset to sell down
    pub from_asset: AssetRef,
    /// Under-allocated asset to buy
    pub to_asset: AssetRef,
    /// Target share of the vault for `to_asset`, in percentage points
    pub target_percentage: Decimal,
    pub metadata: SignalMetadata,
}

/// The capital-protection checks, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCheck {
    PositionSizing,
    PortfolioDrawdown,
    PriceImpactSlippage,
}

impl RiskCheck {
    /// Audit name used in ledger entries and rejection details
    pub fn name(&self) -> &'static str {
        match self {
            RiskCheck::PositionSizing => "Position Sizing",
            RiskCheck::PortfolioDrawdown => "Portfolio Drawdown",
            RiskCheck::PriceImpactSlippage => "Price Impact & Slippage",
        }
    }
}

impl std::fmt::Display for RiskCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Measured values recorded when every check passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskValidation {
    pub validation_id: Uuid,
    pub validated_at: DateTime<Utc>,
    /// Checks that ran, in execution order
    pub checks_performed: Vec<RiskCheck>,
    pub trade_value_usd: Decimal,
    pub position_size_percentage: Decimal,
    /// Drawdown from peak vault value at validation time, in percentage points
    pub current_drawdown: Decimal,
    pub price_impact: Decimal,
    pub slippage: Decimal,
}

/// A trade signal that has passed all risk checks.
///
/// The sole artifact permitted to reach an execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedTradeSignal {
    pub signal: TradeSignal,
    pub risk_validation: RiskValidation,
}
