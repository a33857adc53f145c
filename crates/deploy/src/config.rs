//! Run settings.
//!
//! Layered with figment: built-in defaults, then `Salekit.toml`, then
//! `SALEKIT_*` environment variables.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use url::Url;

use crate::{ContractKind, NetworkId, rpc::ConfirmationPolicy, sequencer::SequenceMode};

/// The default name for the salekit configuration file.
pub const CONFIG_FILENAME: &str = "Salekit.toml";

/// Prefix of the environment variables that override file settings.
pub const ENV_PREFIX: &str = "SALEKIT_";

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Everything a deployment run needs besides the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// JSON-RPC endpoint of the target chain.
    pub rpc_url: String,
    /// Node-managed account that signs every transaction. Defaults to the
    /// first account the node reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Expected chain id. The run aborts if the endpoint reports another one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkId>,
    /// Root of the per-network deployment records.
    pub deployments_dir: PathBuf,
    /// Hardhat artifacts directory.
    pub artifacts_dir: PathBuf,
    /// Registry file replacing the bundled one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<PathBuf>,
    pub mode: SequenceMode,
    /// Contracts to deploy. Always run in a fixed order.
    pub contracts: Vec<ContractKind>,
    /// Deploy fresh instances even when a matching record exists.
    pub force_redeploy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            from: None,
            network: None,
            deployments_dir: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("artifacts"),
            registry_path: None,
            mode: SequenceMode::default(),
            contracts: ContractKind::iter().collect(),
            force_redeploy: false,
            gas_limit: None,
            confirmation_timeout_secs: 300,
            poll_interval_ms: 2_000,
            request_timeout_secs: 30,
        }
    }
}

impl RunConfig {
    /// Load the layered configuration.
    ///
    /// `path` may point to a file or to a directory containing
    /// [`CONFIG_FILENAME`]. A missing file is not an error. The result is not
    /// validated, so command line overrides can still be applied; call
    /// [`RunConfig::validate`] afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            let file = if path.is_dir() {
                path.join(CONFIG_FILENAME)
            } else {
                path.to_path_buf()
            };
            tracing::debug!(path = %file.display(), exists = file.exists(), "Configuration file");
            figment = figment.merge(Toml::file(file));
        }

        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .context("Failed to load run configuration")?;

        Ok(config)
    }

    /// Save the effective configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize run config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.rpc_url()?;
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if self.confirmation_timeout_secs == 0 {
            anyhow::bail!("confirmation_timeout_secs must be greater than zero");
        }
        if self.contracts.is_empty() {
            anyhow::bail!("no contracts selected");
        }
        Ok(())
    }

    pub fn rpc_url(&self) -> Result<Url> {
        Url::parse(&self.rpc_url).with_context(|| format!("Invalid RPC URL '{}'", self.rpc_url))
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.confirmation_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();

        assert_eq!(config.rpc_url().unwrap().as_str(), "http://127.0.0.1:8545/");
        assert_eq!(config.mode, SequenceMode::Sequential);
        assert_eq!(config.contracts.len(), 4);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.confirmation_policy().timeout,
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
                rpc_url = "https://data-seed-prebsc-1-s1.binance.org:8545"
                network = 97
                mode = "concurrent"
                contracts = ["Presale"]
                "#,
            )?;
            jail.set_env("SALEKIT_FORCE_REDEPLOY", "true");
            jail.set_env("SALEKIT_MODE", "sequential");

            let config = RunConfig::load(Some(jail.directory()))
                .map_err(|e| figment::Error::from(e.to_string()))?;

            assert_eq!(config.network, Some(NetworkId(97)));
            assert_eq!(config.contracts, vec![ContractKind::Presale]);
            assert_eq!(config.mode, SequenceMode::Sequential);
            assert!(config.force_redeploy);
            assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
            Ok(())
        });
    }

    #[test]
    fn test_load_defers_validation_to_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
                rpc_url = "localhost without scheme"
                contracts = []
                "#,
            )?;

            let mut config = RunConfig::load(Some(jail.directory()))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert!(config.validate().is_err());

            config.rpc_url = "http://127.0.0.1:8545".to_string();
            config.contracts = vec![ContractKind::PrivateSale];
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_rpc_url_rejected() {
        let config = RunConfig {
            rpc_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = RunConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new("salekit-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILENAME);

        let original = RunConfig {
            from: Some(Address::with_last_byte(1)),
            mode: SequenceMode::Concurrent,
            contracts: vec![ContractKind::PrivateSaleSel],
            ..Default::default()
        };
        original.save_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("PrivateSaleSEL"));

        let loaded: RunConfig = toml::from_str(&content).unwrap();
        assert_eq!(original, loaded);
    }
}
