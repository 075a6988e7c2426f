//! Process-wide defaults.
//!
//! Layers, lowest first: built-in defaults, an optional TOML file, then
//! `STAS_`-prefixed environment variables with `__` between nested keys
//! (`STAS_FEE_RATE__SATS=100`, `STAS_NETWORK=testnet`).

use std::path::Path;

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use stas_script::Network;
use stas_tokens::FeeRate;
use tracing::debug;

use crate::error::SdkError;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "STAS";

/// SDK settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Fee rate handed to every builder.
    pub fee_rate: FeeRate,
    /// Network addresses are rendered for.
    pub network: Network,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            fee_rate: FeeRate::default(),
            network: Network::Mainnet,
        }
    }
}

impl Settings {
    /// Load from defaults, `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SdkError> {
        let mut builder = defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        finish(builder.add_source(environment()))
    }

    /// Load from defaults and a TOML document, ignoring the environment.
    pub fn from_toml(toml: &str) -> Result<Self, SdkError> {
        finish(defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }
}

fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, SdkError> {
    let fallback = Settings::default();
    Ok(Config::builder()
        .set_default("fee_rate.sats", fallback.fee_rate.sats)?
        .set_default("fee_rate.per_byte", fallback.fee_rate.per_byte)?
        .set_default("network", "mainnet")?)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn finish(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Settings, SdkError> {
    let settings: Settings = builder.build()?.try_deserialize()?;
    if settings.fee_rate.per_byte == 0 {
        return Err(SdkError::InvalidSettings(
            "fee_rate.per_byte must be greater than zero".into(),
        ));
    }
    debug!(
        sats = settings.fee_rate.sats,
        per_byte = settings.fee_rate.per_byte,
        network = ?settings.network,
        "settings loaded"
    );
    Ok(settings)
}
