// Example: Full Rebalance Cycle
// Demonstrates one generate-then-validate pipeline run against in-memory
// adapters: a vault holding 100% USDC, guidance targeting a 65/35
// USDC/JUP split.

use anyhow::Result;
use chrono::Utc;
use common::{
    AllocationTarget, AssetHolding, AssetRef, ChainStateReader, GuidanceProvider, Quote,
    QuoteProvider, StrategicGuidance, VaultHoldings,
};
use risk_validation::{RiskConfig, RiskValidationEngine};
use rust_decimal::prelude::*;
use signal_generation::{
    InMemoryLedger, PipelineConfig, PipelineOutcome, RebalancePipeline, SignalLedger,
};
use std::collections::HashMap;
use std::sync::Arc;

const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const JUP_MINT: &str = "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN";

struct StaticGuidance;

#[async_trait::async_trait]
impl GuidanceProvider for StaticGuidance {
    async fn get_guidance(&self, target_id: &str) -> Result<StrategicGuidance> {
        let mut allocation = HashMap::new();
        allocation.insert(
            USDC_MINT.to_string(),
            AllocationTarget {
                symbol: "USDC".to_string(),
                target_percentage: Decimal::from(65),
            },
        );
        allocation.insert(
            JUP_MINT.to_string(),
            AllocationTarget {
                symbol: "JUP".to_string(),
                target_percentage: Decimal::from(35),
            },
        );
        Ok(StrategicGuidance {
            target_id: target_id.to_string(),
            allocation,
            confidence: 0.92,
            last_updated: Utc::now(),
        })
    }
}

struct StaticChain;

#[async_trait::async_trait]
impl ChainStateReader for StaticChain {
    async fn get_holdings(&self, vault_address: &str) -> Result<VaultHoldings> {
        let mut assets = HashMap::new();
        assets.insert(
            USDC_MINT.to_string(),
            AssetHolding {
                symbol: "USDC".to_string(),
                balance: Decimal::from(2500),
                value_usd: Decimal::from(2500),
                percentage: Decimal::from(100),
            },
        );
        Ok(VaultHoldings {
            vault_address: vault_address.to_string(),
            total_value_usd: Decimal::from(2500),
            assets,
            last_fetched: Utc::now(),
        })
    }
}

struct StaticQuotes;

#[async_trait::async_trait]
impl QuoteProvider for StaticQuotes {
    async fn get_quote(
        &self,
        _from_asset: &AssetRef,
        _to_asset: &AssetRef,
        amount_usd: Decimal,
    ) -> Result<Quote> {
        Ok(Quote {
            expected_out: amount_usd * Decimal::from_f64(0.995).unwrap(),
            price_impact_pct: Decimal::from_f64(0.5).unwrap(),
            slippage_bps: Decimal::from(30),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== Vault Rebalancing - Full Cycle Example ===\n");

    let ledger = Arc::new(InMemoryLedger::new());
    let engine = RiskValidationEngine::new(RiskConfig::default(), Arc::new(StaticQuotes));
    let pipeline = RebalancePipeline::new(
        PipelineConfig::default(),
        Arc::new(StaticGuidance),
        Arc::new(StaticChain),
        engine,
        ledger.clone(),
    );

    let outcome = pipeline.run("user-1", "trader-1", "vault-1").await?;

    match outcome {
        PipelineOutcome::Authorized(validated) => {
            println!("Signal AUTHORIZED");
            println!(
                "  {} -> {} targeting {}% of vault",
                validated.signal.from_asset.symbol,
                validated.signal.to_asset.symbol,
                validated.signal.target_percentage
            );
            println!(
                "  trade value: ${}",
                validated.risk_validation.trade_value_usd
            );
            println!("  checks performed:");
            for check in &validated.risk_validation.checks_performed {
                println!("    - {}", check);
            }
            println!(
                "  impact {}%, slippage {}%, drawdown {}%",
                validated.risk_validation.price_impact,
                validated.risk_validation.slippage,
                validated.risk_validation.current_drawdown
            );
        }
        PipelineOutcome::Rejected(rejection) => {
            println!("Signal REJECTED: {}", rejection);
        }
        PipelineOutcome::NoSignal { reason } => {
            println!("No signal this cycle: {}", reason);
        }
    }

    println!("\nLedger trail for user-1:");
    for entry in ledger.list("user-1").await? {
        println!("  {} {}", entry.recorded_at.format("%H:%M:%S"), entry.outcome.kind());
    }

    Ok(())
}
