//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `PARKPAY__SECTION__KEY` environment variables.

use crate::application::orchestrator::OrchestratorSettings;
use crate::domain::money::Amount;
use crate::error::Result;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const ENV_PREFIX: &str = "PARKPAY";
/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_FILE: &str = "parkpay";

/// Parking-fee contract on Sepolia.
const DEFAULT_CONTRACT: &str = "0x166a533168a11fbfc12645c92593131ede161a2c";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub ledger: LedgerConfig,
    pub checkout: CheckoutConfig,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub contract_address: String,
    /// Sender of transactions. When unset, the node's first `eth_accounts` entry.
    pub wallet_address: Option<String>,
    pub receipt_poll_ms: u64,
    /// 0 skips waiting for the receipt.
    pub receipt_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutConfig {
    pub client_id: String,
    pub currency: String,
    /// Loopback port of the checkout page, 0 for any free port.
    pub port: u16,
    pub open_browser: bool,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentConfig {
    pub user_id: String,
    pub default_fee: Decimal,
    pub slot_rate_per_hour: Decimal,
}

impl AppConfig {
    /// Loads the configuration. An explicit `path` must exist; otherwise
    /// `parkpay.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::build(path, None)
    }

    /// Same as [`load`](Self::load) with the environment replaced by `env`.
    pub fn load_with_env(path: Option<&Path>, env: HashMap<String, String>) -> Result<Self> {
        Self::build(path, Some(env))
    }

    fn build(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let builder = Self::defaults()?;
        let builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_FILE).required(false)),
        };
        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .source(env);

        let config = builder.add_source(environment).build()?;
        Ok(config.try_deserialize()?)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("backend.base_url", "http://127.0.0.1:8000")?
            .set_default("backend.timeout_secs", 30)?
            .set_default("ledger.rpc_url", "http://127.0.0.1:8545")?
            .set_default("ledger.contract_address", DEFAULT_CONTRACT)?
            .set_default("ledger.receipt_poll_ms", 2000)?
            .set_default("ledger.receipt_timeout_secs", 300)?
            .set_default("checkout.client_id", "sb")?
            .set_default("checkout.currency", "USD")?
            .set_default("checkout.port", 0)?
            .set_default("checkout.open_browser", true)?
            .set_default("payment.user_id", "user123")?
            .set_default("payment.default_fee", "200.00")?
            .set_default("payment.slot_rate_per_hour", "10")?)
    }

    pub fn orchestrator_settings(&self) -> Result<OrchestratorSettings> {
        Ok(OrchestratorSettings {
            user_id: self.payment.user_id.clone(),
            default_fee: Amount::new(self.payment.default_fee)?,
            currency: self.checkout.currency.clone(),
        })
    }
}
