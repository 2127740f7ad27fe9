//! Risk Validation Engine
//!
//! The mandatory gate between a candidate `TradeSignal` and execution.
//! Three checks run in a fixed order and short-circuit on the first
//! failure: position sizing and drawdown are local, the price-impact and
//! slippage check is the only one that calls out to a quote provider.
//! A quote that errors or times out is a rejection, never a pass.

use crate::config::RiskConfig;
use crate::drawdown::DrawdownMonitor;
use chrono::Utc;
use common::{
    Quote, QuoteProvider, RiskCheck, RiskValidation, TradeSignal, ValidatedTradeSignal,
    VaultHoldings,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Rejection codes for the risk validation checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskErrorCode {
    VaultMismatch,
    PositionSizeExceeded,
    DrawdownExceeded,
    PriceImpactExceeded,
    SlippageExceeded,
    QuoteUnavailable,
}

/// Numeric context attached to every rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRejectionDetails {
    /// Configured limit the failing comparison ran against, absent when
    /// the quote never arrived
    pub threshold: Option<Decimal>,
    /// Measured value that triggered the rejection
    pub actual: Option<Decimal>,
    /// Checks that completed before the failure, in execution order
    pub checks_completed: Vec<RiskCheck>,
    pub message: String,
}

/// Structured rejection emitted by the risk validation engine.
///
/// Terminal for the carried signal instance; the same discrepancy may
/// legitimately produce a fresh candidate on a later generation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskValidationError {
    pub code: RiskErrorCode,
    pub check_failed: RiskCheck,
    /// The offending signal, unmodified
    pub signal: TradeSignal,
    pub details: RiskRejectionDetails,
}

impl RiskValidationError {
    fn new(
        code: RiskErrorCode,
        check_failed: RiskCheck,
        signal: &TradeSignal,
        threshold: Option<Decimal>,
        actual: Option<Decimal>,
        checks_completed: Vec<RiskCheck>,
        message: String,
    ) -> Self {
        Self {
            code,
            check_failed,
            signal: signal.clone(),
            details: RiskRejectionDetails {
                threshold,
                actual,
                checks_completed,
                message,
            },
        }
    }
}

impl std::fmt::Display for RiskValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} check failed for signal {}: {}",
            self.check_failed, self.signal.metadata.signal_id, self.details.message
        )
    }
}

impl std::error::Error for RiskValidationError {}

/// The mandatory gate between signal generation and execution
pub struct RiskValidationEngine {
    config: RiskConfig,
    quote_provider: Arc<dyn QuoteProvider>,
    drawdown: DrawdownMonitor,
}

impl RiskValidationEngine {
    pub fn new(config: RiskConfig, quote_provider: Arc<dyn QuoteProvider>) -> Self {
        Self {
            config,
            quote_provider,
            drawdown: DrawdownMonitor::new(),
        }
    }

    /// Access to the drawdown monitor, e.g. for seeding peaks from
    /// persisted history at startup
    pub fn drawdown_monitor(&self) -> &DrawdownMonitor {
        &self.drawdown
    }

    /// Run all three checks against a signal.
    ///
    /// Holdings come from the same pipeline run that generated the signal,
    /// so the first two checks stay local. Returns the one and only
    /// artifact permitted to reach execution, or a structured rejection.
    /// There is no partial pass.
    pub async fn validate(
        &self,
        signal: &TradeSignal,
        holdings: &VaultHoldings,
    ) -> Result<ValidatedTradeSignal, RiskValidationError> {
        let mut checks_completed: Vec<RiskCheck> = Vec::new();

        // A mismatched snapshot would poison the drawdown peak map, so it
        // never reaches any check
        if holdings.vault_address != signal.vault_address {
            warn!(
                signal_id = %signal.metadata.signal_id,
                signal_vault = %signal.vault_address,
                holdings_vault = %holdings.vault_address,
                "Holdings snapshot does not match signal vault - rejecting"
            );
            return Err(RiskValidationError::new(
                RiskErrorCode::VaultMismatch,
                RiskCheck::PositionSizing,
                signal,
                None,
                None,
                checks_completed,
                format!(
                    "holdings snapshot is for vault {} but the signal targets vault {}",
                    holdings.vault_address, signal.vault_address
                ),
            ));
        }

        // Check 1: position sizing
        let trade_value_usd =
            holdings.total_value_usd * signal.target_percentage / Decimal::ONE_HUNDRED;
        let position_size_pct = signal.target_percentage;

        if position_size_pct > self.config.max_position_size_pct {
            warn!(
                signal_id = %signal.metadata.signal_id,
                requested_pct = %position_size_pct,
                max_pct = %self.config.max_position_size_pct,
                "Position sizing check failed"
            );
            return Err(RiskValidationError::new(
                RiskErrorCode::PositionSizeExceeded,
                RiskCheck::PositionSizing,
                signal,
                Some(self.config.max_position_size_pct),
                Some(position_size_pct),
                checks_completed,
                format!(
                    "requested position {position_size_pct}% of vault (${trade_value_usd}) exceeds maximum {}%",
                    self.config.max_position_size_pct
                ),
            ));
        }
        checks_completed.push(RiskCheck::PositionSizing);
        debug!(
            signal_id = %signal.metadata.signal_id,
            trade_value_usd = %trade_value_usd,
            "Position sizing check passed"
        );

        // Check 2: portfolio drawdown
        let current_drawdown = self
            .drawdown
            .observe(&signal.vault_address, holdings.total_value_usd)
            .await;

        if current_drawdown > self.config.max_drawdown_pct {
            warn!(
                signal_id = %signal.metadata.signal_id,
                drawdown_pct = %current_drawdown,
                max_pct = %self.config.max_drawdown_pct,
                "Drawdown check failed - refusing to add risk to impaired portfolio"
            );
            return Err(RiskValidationError::new(
                RiskErrorCode::DrawdownExceeded,
                RiskCheck::PortfolioDrawdown,
                signal,
                Some(self.config.max_drawdown_pct),
                Some(current_drawdown),
                checks_completed,
                format!(
                    "vault drawdown {current_drawdown}% from peak exceeds maximum {}%",
                    self.config.max_drawdown_pct
                ),
            ));
        }
        checks_completed.push(RiskCheck::PortfolioDrawdown);
        debug!(
            signal_id = %signal.metadata.signal_id,
            drawdown_pct = %current_drawdown,
            "Drawdown check passed"
        );

        // Check 3: price impact and slippage. Only check with a network
        // round trip, so it runs last and fails closed.
        let quote = self.fetch_quote(signal, trade_value_usd, &checks_completed).await?;

        if quote.price_impact_pct > self.config.max_price_impact_pct {
            warn!(
                signal_id = %signal.metadata.signal_id,
                impact_pct = %quote.price_impact_pct,
                max_pct = %self.config.max_price_impact_pct,
                "Price impact check failed"
            );
            return Err(RiskValidationError::new(
                RiskErrorCode::PriceImpactExceeded,
                RiskCheck::PriceImpactSlippage,
                signal,
                Some(self.config.max_price_impact_pct),
                Some(quote.price_impact_pct),
                checks_completed,
                format!(
                    "quoted price impact {}% exceeds maximum {}%",
                    quote.price_impact_pct, self.config.max_price_impact_pct
                ),
            ));
        }

        let slippage_pct = quote.slippage_pct();
        if slippage_pct > self.config.max_slippage_pct {
            warn!(
                signal_id = %signal.metadata.signal_id,
                slippage_pct = %slippage_pct,
                max_pct = %self.config.max_slippage_pct,
                "Slippage check failed"
            );
            return Err(RiskValidationError::new(
                RiskErrorCode::SlippageExceeded,
                RiskCheck::PriceImpactSlippage,
                signal,
                Some(self.config.max_slippage_pct),
                Some(slippage_pct),
                checks_completed,
                format!(
                    "quoted slippage {slippage_pct}% exceeds maximum {}%",
                    self.config.max_slippage_pct
                ),
            ));
        }
        checks_completed.push(RiskCheck::PriceImpactSlippage);

        let validation = RiskValidation {
            validation_id: Uuid::new_v4(),
            validated_at: Utc::now(),
            checks_performed: checks_completed,
            trade_value_usd,
            position_size_percentage: position_size_pct,
            current_drawdown,
            price_impact: quote.price_impact_pct,
            slippage: slippage_pct,
        };

        info!(
            signal_id = %signal.metadata.signal_id,
            validation_id = %validation.validation_id,
            trade_value_usd = %trade_value_usd,
            "Signal authorized - all risk checks passed"
        );

        Ok(ValidatedTradeSignal {
            signal: signal.clone(),
            risk_validation: validation,
        })
    }

    /// Fetch a quote under the configured deadline. Unavailable quotes are
    /// rejections: favorable market conditions are never assumed.
    async fn fetch_quote(
        &self,
        signal: &TradeSignal,
        trade_value_usd: Decimal,
        checks_completed: &[RiskCheck],
    ) -> Result<Quote, RiskValidationError> {
        let deadline = Duration::from_millis(self.config.quote_timeout_ms);
        let request = self.quote_provider.get_quote(
            &signal.from_asset,
            &signal.to_asset,
            trade_value_usd,
        );

        match tokio::time::timeout(deadline, request).await {
            Ok(Ok(quote)) => Ok(quote),
            Ok(Err(e)) => {
                warn!(
                    signal_id = %signal.metadata.signal_id,
                    error = %e,
                    "Quote provider failed - rejecting signal"
                );
                Err(RiskValidationError::new(
                    RiskErrorCode::QuoteUnavailable,
                    RiskCheck::PriceImpactSlippage,
                    signal,
                    None,
                    None,
                    checks_completed.to_vec(),
                    format!("quote provider error: {e}"),
                ))
            }
            Err(_) => {
                warn!(
                    signal_id = %signal.metadata.signal_id,
                    timeout_ms = self.config.quote_timeout_ms,
                    "Quote timed out - rejecting signal"
                );
                Err(RiskValidationError::new(
                    RiskErrorCode::QuoteUnavailable,
                    RiskCheck::PriceImpactSlippage,
                    signal,
                    None,
                    None,
                    checks_completed.to_vec(),
                    format!(
                        "quote did not arrive within {}ms",
                        self.config.quote_timeout_ms
                    ),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use common::{AssetHolding, AssetRef, SignalMetadata, TradeAction};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockQuoteProvider {
        quote: Option<Quote>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockQuoteProvider {
        fn returning(quote: Quote) -> Self {
            Self {
                quote: Some(quote),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                quote: None,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl QuoteProvider for MockQuoteProvider {
        async fn get_quote(
            &self,
            _from_asset: &AssetRef,
            _to_asset: &AssetRef,
            _amount_usd: Decimal,
        ) -> Result<Quote> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.quote
                .clone()
                .ok_or_else(|| anyhow::anyhow!("quote service unreachable"))
        }
    }

    fn good_quote() -> Quote {
        Quote {
            expected_out: dec!(100),
            price_impact_pct: dec!(0.5),
            slippage_bps: dec!(30), // 0.3%
        }
    }

    fn test_signal(target_percentage: Decimal) -> TradeSignal {
        TradeSignal {
            action: TradeAction::Rebalance,
            user_id: "user-1".to_string(),
            vault_address: "vault-1".to_string(),
            from_asset: AssetRef {
                mint_address: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
                symbol: "USDC".to_string(),
            },
            to_asset: AssetRef {
                mint_address: "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN".to_string(),
                symbol: "JUP".to_string(),
            },
            target_percentage,
            metadata: SignalMetadata {
                signal_id: Uuid::new_v4(),
                discrepancy: target_percentage,
                confidence: 0.9,
                current_percentage: Decimal::ZERO,
                timestamp: Utc::now(),
            },
        }
    }

    fn test_holdings(total_value_usd: Decimal) -> VaultHoldings {
        let mut assets = HashMap::new();
        assets.insert(
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            AssetHolding {
                symbol: "USDC".to_string(),
                balance: total_value_usd,
                value_usd: total_value_usd,
                percentage: dec!(100),
            },
        );
        VaultHoldings {
            vault_address: "vault-1".to_string(),
            total_value_usd,
            assets,
            last_fetched: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_full_pass_records_checks_in_order() {
        let quotes = Arc::new(MockQuoteProvider::returning(good_quote()));
        let engine = RiskValidationEngine::new(RiskConfig::default(), quotes.clone());

        let signal = test_signal(dec!(40));
        let holdings = test_holdings(dec!(1000));

        let validated = engine.validate(&signal, &holdings).await.unwrap();

        assert_eq!(
            validated.risk_validation.checks_performed,
            vec![
                RiskCheck::PositionSizing,
                RiskCheck::PortfolioDrawdown,
                RiskCheck::PriceImpactSlippage,
            ]
        );
        assert_eq!(validated.risk_validation.trade_value_usd, dec!(400));
        assert_eq!(validated.risk_validation.position_size_percentage, dec!(40));
        assert_eq!(validated.risk_validation.price_impact, dec!(0.5));
        assert_eq!(validated.risk_validation.slippage, dec!(0.3));
        assert_eq!(validated.signal, signal);
        assert_eq!(quotes.call_count(), 1);
    }

    #[tokio::test]
    async fn test_position_size_rejection_short_circuits() {
        let quotes = Arc::new(MockQuoteProvider::returning(good_quote()));
        let engine = RiskValidationEngine::new(RiskConfig::default(), quotes.clone());

        // 75% requested against a 50% maximum
        let err = engine
            .validate(&test_signal(dec!(75)), &test_holdings(dec!(1000)))
            .await
            .unwrap_err();

        assert_eq!(err.code, RiskErrorCode::PositionSizeExceeded);
        assert_eq!(err.check_failed, RiskCheck::PositionSizing);
        assert_eq!(err.details.threshold, Some(dec!(50)));
        assert_eq!(err.details.actual, Some(dec!(75)));
        assert!(err.details.checks_completed.is_empty());

        // Short-circuit: the network call never happened
        assert_eq!(quotes.call_count(), 0);
    }

    #[tokio::test]
    async fn test_position_size_exactly_at_maximum_passes() {
        // Documented boundary policy: reject strictly above the maximum
        let quotes = Arc::new(MockQuoteProvider::returning(good_quote()));
        let engine = RiskValidationEngine::new(RiskConfig::default(), quotes);

        let result = engine
            .validate(&test_signal(dec!(50)), &test_holdings(dec!(1000)))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_mismatched_holdings_rejected_before_any_check() {
        let quotes = Arc::new(MockQuoteProvider::returning(good_quote()));
        let engine = RiskValidationEngine::new(RiskConfig::default(), quotes.clone());

        let mut holdings = test_holdings(dec!(1000));
        holdings.vault_address = "vault-2".to_string();

        let err = engine
            .validate(&test_signal(dec!(40)), &holdings)
            .await
            .unwrap_err();

        assert_eq!(err.code, RiskErrorCode::VaultMismatch);
        assert!(err.details.checks_completed.is_empty());
        assert_eq!(quotes.call_count(), 0);

        // The wrong vault's value never entered the peak map
        assert_eq!(engine.drawdown_monitor().peak_of("vault-1").await, None);
        assert_eq!(engine.drawdown_monitor().peak_of("vault-2").await, None);
    }

    #[tokio::test]
    async fn test_drawdown_rejection() {
        let quotes = Arc::new(MockQuoteProvider::returning(good_quote()));
        let engine = RiskValidationEngine::new(RiskConfig::default(), quotes.clone());

        // Seed a peak, then validate against an impaired vault: 30% down
        engine.drawdown_monitor().observe("vault-1", dec!(1000)).await;

        let err = engine
            .validate(&test_signal(dec!(40)), &test_holdings(dec!(700)))
            .await
            .unwrap_err();

        assert_eq!(err.code, RiskErrorCode::DrawdownExceeded);
        assert_eq!(err.check_failed, RiskCheck::PortfolioDrawdown);
        assert_eq!(err.details.actual, Some(dec!(30)));
        assert_eq!(err.details.checks_completed, vec![RiskCheck::PositionSizing]);
        assert_eq!(quotes.call_count(), 0);
    }

    #[tokio::test]
    async fn test_price_impact_rejection() {
        let quotes = Arc::new(MockQuoteProvider::returning(Quote {
            expected_out: dec!(100),
            price_impact_pct: dec!(2),
            slippage_bps: dec!(30),
        }));
        let engine = RiskValidationEngine::new(RiskConfig::default(), quotes);

        let err = engine
            .validate(&test_signal(dec!(40)), &test_holdings(dec!(1000)))
            .await
            .unwrap_err();

        assert_eq!(err.code, RiskErrorCode::PriceImpactExceeded);
        assert_eq!(err.check_failed, RiskCheck::PriceImpactSlippage);
        assert_eq!(
            err.details.checks_completed,
            vec![RiskCheck::PositionSizing, RiskCheck::PortfolioDrawdown]
        );
    }

    #[tokio::test]
    async fn test_slippage_rejection() {
        // 150 bps = 1.5%, above the 1% default
        let quotes = Arc::new(MockQuoteProvider::returning(Quote {
            expected_out: dec!(100),
            price_impact_pct: dec!(0.5),
            slippage_bps: dec!(150),
        }));
        let engine = RiskValidationEngine::new(RiskConfig::default(), quotes);

        let err = engine
            .validate(&test_signal(dec!(40)), &test_holdings(dec!(1000)))
            .await
            .unwrap_err();

        assert_eq!(err.code, RiskErrorCode::SlippageExceeded);
        assert_eq!(err.details.actual, Some(dec!(1.5)));
    }

    #[tokio::test]
    async fn test_quote_error_fails_closed() {
        let quotes = Arc::new(MockQuoteProvider::failing());
        let engine = RiskValidationEngine::new(RiskConfig::default(), quotes);

        let err = engine
            .validate(&test_signal(dec!(40)), &test_holdings(dec!(1000)))
            .await
            .unwrap_err();

        assert_eq!(err.code, RiskErrorCode::QuoteUnavailable);
        assert_eq!(err.check_failed, RiskCheck::PriceImpactSlippage);
        assert_eq!(
            err.details.checks_completed,
            vec![RiskCheck::PositionSizing, RiskCheck::PortfolioDrawdown]
        );
    }

    #[tokio::test]
    async fn test_quote_timeout_fails_closed() {
        let slow = MockQuoteProvider {
            quote: Some(good_quote()),
            delay: Some(Duration::from_millis(200)),
            calls: AtomicUsize::new(0),
        };
        let config = RiskConfig {
            quote_timeout_ms: 20,
            ..Default::default()
        };
        let engine = RiskValidationEngine::new(config, Arc::new(slow));

        let err = engine
            .validate(&test_signal(dec!(40)), &test_holdings(dec!(1000)))
            .await
            .unwrap_err();

        assert_eq!(err.code, RiskErrorCode::QuoteUnavailable);
        assert!(err.details.message.contains("20ms"));
    }
}
