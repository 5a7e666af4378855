//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::address::AccountAddress;
use crate::entry::{EntryPoint, ModuleConfig, TaskArgs};
use crate::errors::{DappError, Result};
use crate::service::DappSettings;
use crate::tx::TxSettings;

/// Address the crowdfunding module is published under on testnet.
pub const DEFAULT_MODULE_ADDRESS: &str =
    "0x110c0e6e7192bcc4cb6b4e1dcda49d1366c44f3f0cf17e18e1cec5b93aa0ea79";

/// Where pages get their data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// A ledger node plus the wallet-adapter bridge.
    Live,
    /// The built-in fixture set plus a demo wallet.
    Demo,
}

impl FromStr for DataSource {
    type Err = DappError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "demo" | "fixture" | "fixtures" => Ok(Self::Demo),
            other => Err(DappError::Config(format!(
                "Invalid DATA_SOURCE {other:?} (expected \"live\" or \"demo\")"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_source: DataSource,
    /// Versioned REST root of the ledger node
    pub node_url: String,
    /// Module address, name and (possibly renamed) entry points
    pub module: ModuleConfig,
    /// Move type of the funding coin
    pub coin_type: String,
    pub coin_symbol: String,
    /// Decimal override; the ledger is asked when unset
    pub coin_decimals: Option<u8>,
    /// Base URL of the wallet-adapter bridge
    pub wallet_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Per-request timeout of the shared HTTP client
    pub http_timeout_secs: u64,
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    pub txn_expiration_secs: u64,
    /// Demo only: keep fixture transactions pending so confirmations time out
    pub demo_stall_confirmations: bool,
    /// Demo only: the demo wallet declines every signature request
    pub demo_decline_signatures: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_source: DataSource = var("DATA_SOURCE")
            .unwrap_or_else(|| "demo".to_string())
            .parse()?;

        let address: AccountAddress = var("MODULE_ADDRESS")
            .unwrap_or_else(|| DEFAULT_MODULE_ADDRESS.to_string())
            .parse()
            .map_err(|e| DappError::Config(format!("Invalid MODULE_ADDRESS: {e}")))?;
        // Fixture tasks are numbered per project.
        let task_args = match var("TASK_ARGS") {
            Some(raw) => raw.parse()?,
            None if data_source == DataSource::Demo => TaskArgs::ProjectAndTask,
            None => TaskArgs::TaskId,
        };
        let mut module = ModuleConfig::new(
            address,
            var("MODULE_NAME").unwrap_or_else(|| "mock_crowfunding".to_string()),
        )
        .with_task_args(task_args);
        for entry in EntryPoint::ALL {
            if let Some(name) = var(&entry.env_key()) {
                module.rename(entry, name.trim());
            }
        }

        let coin_decimals = match var("COIN_DECIMALS") {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| DappError::Config("Invalid COIN_DECIMALS".to_string()))?,
            ),
            None => None,
        };

        Ok(Config {
            data_source,
            node_url: var("NODE_URL")
                .unwrap_or_else(|| "https://fullnode.testnet.aptoslabs.com/v1".to_string()),
            coin_type: var("COIN_TYPE")
                .unwrap_or_else(|| format!("{}::test_usdc::FaucetCoin", address.to_hex_literal())),
            coin_symbol: var("COIN_SYMBOL").unwrap_or_else(|| "USDC".to_string()),
            coin_decimals,
            wallet_url: var("WALLET_URL").unwrap_or_else(|| "http://127.0.0.1:8787".to_string()),
            api_port: parsed(&var, "API_PORT", "3001")?,
            confirmation_timeout_secs: parsed(&var, "CONFIRMATION_TIMEOUT_SECS", "30")?,
            poll_interval_ms: parsed(&var, "POLL_INTERVAL_MS", "1000")?,
            http_timeout_secs: parsed(&var, "HTTP_TIMEOUT_SECS", "30")?,
            max_gas_amount: parsed(&var, "MAX_GAS_AMOUNT", "200000")?,
            gas_unit_price: parsed(&var, "GAS_UNIT_PRICE", "100")?,
            txn_expiration_secs: parsed(&var, "TXN_EXPIRATION_SECS", "60")?,
            demo_stall_confirmations: parsed(&var, "DEMO_STALL_CONFIRMATIONS", "false")?,
            demo_decline_signatures: parsed(&var, "DEMO_DECLINE_SIGNATURES", "false")?,
            module,
        })
    }

    pub fn tx_settings(&self) -> TxSettings {
        TxSettings {
            max_gas_amount: self.max_gas_amount,
            gas_unit_price: self.gas_unit_price,
            expiration: Duration::from_secs(self.txn_expiration_secs),
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn dapp_settings(&self) -> DappSettings {
        DappSettings {
            coin_type: self.coin_type.clone(),
            coin_symbol: self.coin_symbol.clone(),
            coin_decimals: self.coin_decimals,
            tx: self.tx_settings(),
        }
    }
}

fn parsed<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T> {
    var(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .map_err(|_| DappError::Config(format!("Invalid {key}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_describe_the_testnet_deployment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.data_source, DataSource::Demo);
        assert_eq!(cfg.api_port, 3001);
        assert_eq!(cfg.module.module, "mock_crowfunding");
        assert_eq!(cfg.module.address.to_hex_literal(), DEFAULT_MODULE_ADDRESS);
        assert_eq!(
            cfg.coin_type,
            format!("{DEFAULT_MODULE_ADDRESS}::test_usdc::FaucetCoin")
        );
        assert_eq!(cfg.coin_decimals, None);
        assert!(!cfg.demo_stall_confirmations);
        assert!(!cfg.demo_decline_signatures);
        assert_eq!(cfg.tx_settings().confirmation_timeout, Duration::from_secs(30));
        assert_eq!(cfg.tx_settings().poll_interval, Duration::from_millis(1000));
    }

    #[test]
    fn entry_points_can_be_renamed() {
        let cfg = config(&[
            ("MODULE_ADDRESS", "0xcafe"),
            ("FN_GET_CROWD_FUNDING", "total_raised"),
        ])
        .unwrap();
        let id = cfg.module.function(EntryPoint::GetCrowdFunding);
        assert_eq!(id.name, "total_raised");
        assert_eq!(cfg.module.function(EntryPoint::AssignTask).name, "assign_task");
    }

    #[test]
    fn task_argument_shape_depends_on_the_data_source() {
        assert_eq!(config(&[]).unwrap().module.task_args, TaskArgs::ProjectAndTask);
        let live = config(&[("DATA_SOURCE", "live")]).unwrap();
        assert_eq!(live.module.task_args, TaskArgs::TaskId);
        let overridden = config(&[("DATA_SOURCE", "live"), ("TASK_ARGS", "project_task")]).unwrap();
        assert_eq!(overridden.module.task_args, TaskArgs::ProjectAndTask);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config(&[("API_PORT", "  "), ("DATA_SOURCE", "live")]).unwrap();
        assert_eq!(cfg.api_port, 3001);
        assert_eq!(cfg.data_source, DataSource::Live);
    }

    #[test]
    fn malformed_values_are_config_errors() {
        for (key, value) in [
            ("API_PORT", "http"),
            ("COIN_DECIMALS", "-1"),
            ("DATA_SOURCE", "mainnet"),
            ("MODULE_ADDRESS", "0xnothex"),
            ("DEMO_STALL_CONFIRMATIONS", "sometimes"),
            ("TASK_ARGS", "both"),
        ] {
            let err = config(&[(key, value)]).unwrap_err();
            assert!(matches!(err, DappError::Config(_)), "{key}");
        }
    }
}
