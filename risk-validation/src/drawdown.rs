//! Per-vault drawdown tracking
//!
//! Drawdown is the percentage decline of vault value from its historical
//! peak. The monitor is shared across concurrent pipeline runs, so the peak
//! map sits behind an async RwLock.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Tracks peak vault values and reports drawdown from peak
#[derive(Debug, Default)]
pub struct DrawdownMonitor {
    peaks: RwLock<HashMap<String, Decimal>>,
}

impl DrawdownMonitor {
    pub fn new() -> Self {
        Self {
            peaks: RwLock::new(HashMap::new()),
        }
    }

    /// Record the latest vault value and return the drawdown from peak,
    /// in percentage points.
    ///
    /// A value above the recorded peak raises the peak, so a recovered
    /// vault reports zero drawdown again.
    pub async fn observe(&self, vault_address: &str, total_value_usd: Decimal) -> Decimal {
        let mut peaks = self.peaks.write().await;
        let peak = peaks
            .entry(vault_address.to_string())
            .or_insert(total_value_usd);

        if total_value_usd > *peak {
            *peak = total_value_usd;
        }

        if *peak <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        (*peak - total_value_usd) / *peak * Decimal::ONE_HUNDRED
    }

    /// Peak value recorded for a vault, if any
    pub async fn peak_of(&self, vault_address: &str) -> Option<Decimal> {
        let peaks = self.peaks.read().await;
        peaks.get(vault_address).copied()
    }

    /// Forget the recorded peak for a vault. Administrative operation,
    /// e.g. after a deliberate withdrawal.
    pub async fn reset(&self, vault_address: &str) {
        let mut peaks = self.peaks.write().await;
        peaks.remove(vault_address);
    }
}
