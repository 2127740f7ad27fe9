//! Risk validation configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Thresholds for the three capital-protection checks.
///
/// Boundary policy for every limit in this engine: a measured value is
/// rejected only when strictly greater than its maximum. Exactly-at-maximum
/// passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Maximum share of vault value a single trade may target, in
    /// percentage points
    #[serde(default = "default_max_position_size_pct")]
    pub max_position_size_pct: Decimal,

    /// Maximum drawdown from peak vault value before new risk is refused,
    /// in percentage points
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: Decimal,

    /// Maximum quoted price impact, in percentage points
    #[serde(default = "default_max_price_impact_pct")]
    pub max_price_impact_pct: Decimal,

    /// Maximum quoted slippage bound, in percentage points
    #[serde(default = "default_max_slippage_pct")]
    pub max_slippage_pct: Decimal,

    /// Deadline for the quote provider call (milliseconds). A quote that
    /// does not arrive in time is a rejection, never a pass.
    #[serde(default = "default_quote_timeout_ms")]
    pub quote_timeout_ms: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size_pct: default_max_position_size_pct(),
            max_drawdown_pct: default_max_drawdown_pct(),
            max_price_impact_pct: default_max_price_impact_pct(),
            max_slippage_pct: default_max_slippage_pct(),
            quote_timeout_ms: default_quote_timeout_ms(),
        }
    }
}

fn default_max_position_size_pct() -> Decimal {
    dec!(50)
}

fn default_max_drawdown_pct() -> Decimal {
    dec!(20)
}

fn default_max_price_impact_pct() -> Decimal {
    dec!(1)
}

fn default_max_slippage_pct() -> Decimal {
    dec!(1)
}

fn default_quote_timeout_ms() -> u64 {
    3_000
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> anyhow::Result<RiskConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: RiskConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to TOML file
pub fn save_config(config: &RiskConfig, path: &str) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Create a default configuration file template
pub fn create_config_template(path: &str) -> anyhow::Result<()> {
    let template = "# Risk Validation Configuration
# Every limit rejects strictly above its value; exactly-at-limit passes.

# Maximum share of vault value a single trade may target (percentage points)
max_position_size_pct = 50

# Maximum drawdown from peak vault value (percentage points)
max_drawdown_pct = 20

# Maximum quoted price impact (percentage points)
max_price_impact_pct = 1

# Maximum quoted slippage bound (percentage points)
max_slippage_pct = 1

# Deadline for the quote provider call (milliseconds)
quote_timeout_ms = 3000
";

    std::fs::write(path, template)?;
    Ok(())
}
