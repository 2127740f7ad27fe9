// Signal Generation Framework (Layer 2)
// Compares strategy guidance against vault holdings and emits candidate
// rebalancing signals, with a per-user append-only ledger for audit and
// rate limiting

pub mod generator;
pub mod ledger;
pub mod pipeline;

pub use generator::{AllocationSumPolicy, GeneratorConfig, SignalGenerator};
pub use ledger::{
    InMemoryLedger, LedgerEntry, LedgerOutcome, LedgerStats, SignalLedger, StaleSource,
};
pub use pipeline::{PipelineConfig, PipelineOutcome, RebalancePipeline};
