//! Engine configuration
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! config file, and `LENDERS_*` environment variables (a `.env` file is read
//! first when present).

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LendingError, Result};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LENDERS";

/// Bootstrap parameters of one engine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base rate in basis points per term
    pub base_rate: u64,
    /// Additional basis points per term at full utilization
    pub rate_slope: u64,
    /// Flat origination charge per loan, in whole asset units
    pub global_rate_factor: u64,
    /// Collateral required, in basis points of principal
    pub collateral_bps: u64,
    /// Address the factory acts under
    pub factory_address: Address,
    /// Proxy template every pool handle is cloned from
    pub proxy_template: Address,
    /// Receipt ledger implementation behind every proxy
    pub implementation: Address,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_rate: crate::DEFAULT_BASE_RATE,
            rate_slope: crate::DEFAULT_RATE_SLOPE,
            global_rate_factor: crate::DEFAULT_GLOBAL_RATE_FACTOR,
            collateral_bps: crate::DEFAULT_COLLATERAL_BPS,
            factory_address: Address::repeat_byte(0xfa),
            proxy_template: Address::repeat_byte(0xb0),
            implementation: Address::repeat_byte(0x1e),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment and an optional file
    pub fn load(path: Option<&str>) -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let cfg: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        debug!(?cfg, "Loaded engine configuration");
        Ok(cfg)
    }

    /// Reject parameter combinations the engine cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.collateral_bps > 10_000 {
            return Err(LendingError::Config(format!(
                "collateral_bps must be at most 10000, got {}",
                self.collateral_bps
            )));
        }
        if self.factory_address == Address::ZERO {
            return Err(LendingError::Config("factory_address must be set".to_string()));
        }
        Ok(())
    }
}
