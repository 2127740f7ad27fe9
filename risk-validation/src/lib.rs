//! Risk Validation Engine (Layer 3)
//!
//! Mandatory capital-protection gate between signal generation and
//! execution. Every candidate `TradeSignal` passes three checks in a fixed
//! order (position sizing, portfolio drawdown, price impact & slippage)
//! and either becomes a `ValidatedTradeSignal` or a structured rejection.

mod config;
mod drawdown;
mod engine;

pub use config::{create_config_template, load_config, save_config, RiskConfig};
pub use drawdown::DrawdownMonitor;
pub use engine::{
    RiskErrorCode, RiskRejectionDetails, RiskValidationEngine, RiskValidationError,
};
