//! Per-network configuration registry.
//!
//! The bundled table lives in `networks.toml` and is compiled into the binary.
//! It is parsed and validated against each contract family's schema when the
//! registry is loaded, so a broken entry fails the run before any transaction
//! is submitted.

use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{ContractKind, NetworkId, error::ConfigError};

/// The registry shipped with the tool.
const BUNDLED_NETWORKS: &str = include_str!("../networks.toml");

/// Named numeric parameters applied to a sale contract.
///
/// Declaration order is the order their setters are submitted in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Threshold {
    MinInvestment,
    MaxInvestment,
}

/// An additional accepted asset and the price feed that values it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecondaryEntry {
    pub asset: Address,
    pub feed: Address,
}

/// When the sale accepts investments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawActivation", into = "RawActivation")]
pub enum Activation {
    Window { start: u64, end: u64 },
    At { at: u64 },
}

/// On-disk shape: either `{ start, end }` or `{ at }`, never a mix.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawActivation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    at: Option<u64>,
}

impl TryFrom<RawActivation> for Activation {
    type Error = String;

    fn try_from(raw: RawActivation) -> Result<Self, Self::Error> {
        match (raw.start, raw.end, raw.at) {
            (Some(start), Some(end), None) => Ok(Activation::Window { start, end }),
            (None, None, Some(at)) => Ok(Activation::At { at }),
            (None, None, None) => Err("activation needs either start and end, or at".to_string()),
            (_, _, Some(_)) => Err("activation cannot have both a window and an at".to_string()),
            _ => Err("activation window needs both start and end".to_string()),
        }
    }
}

impl From<Activation> for RawActivation {
    fn from(activation: Activation) -> Self {
        match activation {
            Activation::Window { start, end } => RawActivation {
                start: Some(start),
                end: Some(end),
                at: None,
            },
            Activation::At { at } => RawActivation {
                at: Some(at),
                ..Default::default()
            },
        }
    }
}

/// Deployment inputs for one contract on one network.
///
/// Which fields are required depends on the contract family; see
/// [`ContractKind::constructor_schema`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigurationRecord {
    #[serde(default)]
    pub primary_address: Option<Address>,
    #[serde(default)]
    pub feed_address: Option<Address>,
    #[serde(
        default,
        rename = "thresholds",
        deserialize_with = "deserialize_thresholds"
    )]
    pub scalar_thresholds: BTreeMap<Threshold, u64>,
    #[serde(default)]
    pub secondary_entries: Vec<SecondaryEntry>,
    #[serde(default)]
    pub activation: Option<Activation>,
}

impl ConfigurationRecord {
    /// Thresholds that `contract` configures through setters after deployment.
    pub fn post_deploy_thresholds(&self, contract: ContractKind) -> BTreeMap<Threshold, u64> {
        if contract.has_threshold_setters() {
            self.scalar_thresholds.clone()
        } else {
            BTreeMap::new()
        }
    }
}

/// Threshold tables are keyed by snake_case names (`min_investment = 1`).
fn deserialize_thresholds<'de, D>(deserializer: D) -> Result<BTreeMap<Threshold, u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: BTreeMap<String, u64> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, value)| {
            name.parse::<Threshold>()
                .map(|threshold| (threshold, value))
                .map_err(|_| serde::de::Error::custom(format!("unknown threshold '{}'", name)))
        })
        .collect()
}

/// On-disk shape: `[<Contract>.<chain id>]` tables.
type RawRegistry = BTreeMap<String, BTreeMap<String, ConfigurationRecord>>;

/// Validated mapping from (contract, network) to configuration.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    records: BTreeMap<(ContractKind, NetworkId), ConfigurationRecord>,
}

impl Registry {
    /// Load the registry compiled into the binary.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUNDLED_NETWORKS)
    }

    /// Load an operator-supplied registry with the same layout as the bundled one.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), records = registry.len(), "Registry loaded");
        Ok(registry)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawRegistry = toml::from_str(content)?;

        let mut records = BTreeMap::new();
        for (name, networks) in raw {
            let contract: ContractKind = name
                .parse()
                .map_err(|_| ConfigError::UnknownContract(name.clone()))?;

            for (key, record) in networks {
                let network: NetworkId = key
                    .parse::<u64>()
                    .map(NetworkId)
                    .map_err(|_| ConfigError::InvalidNetwork(key.clone()))?;

                contract.validate(network, &record)?;
                records.insert((contract, network), record);
            }
        }

        Ok(Self { records })
    }

    /// The record for `contract` on `network`, or `None` when the network is
    /// not supported for that contract.
    pub fn lookup(&self, contract: ContractKind, network: NetworkId) -> Option<&ConfigurationRecord> {
        self.records.get(&(contract, network))
    }

    /// Networks that have a record for `contract`, in ascending chain id order.
    pub fn networks(&self, contract: ContractKind) -> Vec<NetworkId> {
        self.records
            .keys()
            .filter(|(kind, _)| *kind == contract)
            .map(|(_, network)| *network)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
