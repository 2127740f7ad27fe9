// Shared Domain Types (Layer 0)
// Types and adapter contracts shared by signal generation and risk validation

pub mod guidance;
pub mod holdings;
pub mod providers;
pub mod signal;

pub use guidance::{AllocationTarget, StrategicGuidance};
pub use holdings::{AssetHolding, VaultHoldings};
pub use providers::{
    ChainStateReader, ExecutionCollaborator, GuidanceProvider, Quote, QuoteProvider,
};
pub use signal::{
    AssetRef, RiskCheck, RiskValidation, SignalMetadata, TradeAction, TradeSignal,
    ValidatedTradeSignal,
};

pub use uuid::Uuid;
