// Rebalance Pipeline
// One run per (user, vault): fetch guidance and holdings, generate a
// candidate signal, gate it through risk validation. Adapter errors and
// timeouts during generation fail closed to "no signal".

use crate::generator::{GeneratorConfig, SignalGenerator};
use crate::ledger::{LedgerEntry, LedgerOutcome, SignalLedger};
use anyhow::Result;
use common::{
    ChainStateReader, ExecutionCollaborator, GuidanceProvider, ValidatedTradeSignal,
};
use risk_validation::{RiskValidationEngine, RiskValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for a pipeline instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub generator: GeneratorConfig,
    /// Deadline for each guidance/chain adapter call (milliseconds)
    pub adapter_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            adapter_timeout_ms: 3_000,
        }
    }
}

/// Terminal outcome of one pipeline run
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Nothing to do this cycle; the specific reason is in the ledger
    NoSignal { reason: String },
    /// All risk checks passed; the signal may reach execution
    Authorized(ValidatedTradeSignal),
    /// A risk check failed; terminal for this signal instance
    Rejected(RiskValidationError),
}

/// Wires the adapters, the generator, and the risk engine together.
///
/// Runs for different (user, vault) pairs are independent; the ledger and
/// the engine's drawdown monitor are the only shared state.
pub struct RebalancePipeline {
    guidance_provider: Arc<dyn GuidanceProvider>,
    chain_reader: Arc<dyn ChainStateReader>,
    generator: SignalGenerator,
    engine: RiskValidationEngine,
    ledger: Arc<dyn SignalLedger>,
    executor: Option<Arc<dyn ExecutionCollaborator>>,
    adapter_timeout: Duration,
}

impl RebalancePipeline {
    pub fn new(
        config: PipelineConfig,
        guidance_provider: Arc<dyn GuidanceProvider>,
        chain_reader: Arc<dyn ChainStateReader>,
        engine: RiskValidationEngine,
        ledger: Arc<dyn SignalLedger>,
    ) -> Self {
        let generator = SignalGenerator::new(config.generator.clone(), ledger.clone());
        Self {
            guidance_provider,
            chain_reader,
            generator,
            engine,
            ledger,
            executor: None,
            adapter_timeout: Duration::from_millis(config.adapter_timeout_ms),
        }
    }

    /// Forward authorized signals to an execution collaborator.
    /// The pipeline itself never signs or submits transactions.
    pub fn with_executor(mut self, executor: Arc<dyn ExecutionCollaborator>) -> Self {
        info!("Attaching execution collaborator");
        self.executor = Some(executor);
        self
    }

    /// Run one full generate-then-validate cycle.
    pub async fn run(
        &self,
        user_id: &str,
        target_id: &str,
        vault_address: &str,
    ) -> Result<PipelineOutcome> {
        let guidance = match tokio::time::timeout(
            self.adapter_timeout,
            self.guidance_provider.get_guidance(target_id),
        )
        .await
        {
            Ok(Ok(guidance)) => guidance,
            Ok(Err(e)) => {
                return self
                    .upstream_failure(user_id, vault_address, format!("guidance provider error: {e}"))
                    .await;
            }
            Err(_) => {
                return self
                    .upstream_failure(
                        user_id,
                        vault_address,
                        format!(
                            "guidance provider timed out after {}ms",
                            self.adapter_timeout.as_millis()
                        ),
                    )
                    .await;
            }
        };

        let mut holdings = match tokio::time::timeout(
            self.adapter_timeout,
            self.chain_reader.get_holdings(vault_address),
        )
        .await
        {
            Ok(Ok(holdings)) => holdings,
            Ok(Err(e)) => {
                return self
                    .upstream_failure(user_id, vault_address, format!("chain reader error: {e}"))
                    .await;
            }
            Err(_) => {
                return self
                    .upstream_failure(
                        user_id,
                        vault_address,
                        format!(
                            "chain reader timed out after {}ms",
                            self.adapter_timeout.as_millis()
                        ),
                    )
                    .await;
            }
        };
        holdings.recompute_percentages();

        let signal = match self
            .generator
            .generate(user_id, vault_address, &guidance, &holdings)
            .await?
        {
            Some(signal) => signal,
            None => {
                return Ok(PipelineOutcome::NoSignal {
                    reason: "generation produced no signal; see ledger for the outcome".to_string(),
                });
            }
        };

        match self.engine.validate(&signal, &holdings).await {
            Ok(validated) => {
                self.ledger
                    .append(LedgerEntry::now(
                        user_id,
                        vault_address,
                        LedgerOutcome::SignalValidated {
                            signal_id: validated.signal.metadata.signal_id,
                            validation_id: validated.risk_validation.validation_id,
                        },
                    ))
                    .await?;

                if let Some(executor) = &self.executor {
                    executor.execute(&validated).await?;
                }

                Ok(PipelineOutcome::Authorized(validated))
            }
            Err(rejection) => {
                warn!(
                    user_id,
                    signal_id = %rejection.signal.metadata.signal_id,
                    check_failed = %rejection.check_failed,
                    "Signal rejected by risk validation"
                );
                self.ledger
                    .append(LedgerEntry::now(
                        user_id,
                        vault_address,
                        LedgerOutcome::SignalRejected {
                            signal_id: rejection.signal.metadata.signal_id,
                            check_failed: rejection.check_failed,
                            message: rejection.details.message.clone(),
                        },
                    ))
                    .await?;

                Ok(PipelineOutcome::Rejected(rejection))
            }
        }
    }

    async fn upstream_failure(
        &self,
        user_id: &str,
        vault_address: &str,
        reason: String,
    ) -> Result<PipelineOutcome> {
        warn!(user_id, vault_address, reason = %reason, "Upstream adapter failed - no signal");
        self.ledger
            .append(LedgerEntry::now(
                user_id,
                vault_address,
                LedgerOutcome::RejectedUpstream {
                    reason: reason.clone(),
                },
            ))
            .await?;
        Ok(PipelineOutcome::NoSignal { reason })
    }
}
