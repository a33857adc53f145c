//! Network identifiers.

use std::str::FromStr;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// EIP-155 chain id of the network a run targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NetworkId(pub u64);

impl NetworkId {
    /// The known network name for this chain id, if any.
    pub fn known(&self) -> Option<KnownNetwork> {
        KnownNetwork::from_chain_id(self.0)
    }
}

impl FromStr for NetworkId {
    type Err = String;

    /// Accepts a decimal chain id (`97`) or a known network name (`bsc-testnet`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u64>() {
            return Ok(Self(id));
        }

        KnownNetwork::from_str(s)
            .map(|network| Self(network.chain_id()))
            .map_err(|_| format!("unknown network identifier: '{}'", s))
    }
}

/// Networks the tool knows by name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum KnownNetwork {
    Mainnet,
    Ropsten,
    Rinkeby,
    Goerli,
    Kovan,
    Bsc,
    BscTestnet,
    SelendraTestnet,
}

impl KnownNetwork {
    pub fn chain_id(&self) -> u64 {
        match self {
            KnownNetwork::Mainnet => 1,
            KnownNetwork::Ropsten => 3,
            KnownNetwork::Rinkeby => 4,
            KnownNetwork::Goerli => 5,
            KnownNetwork::Kovan => 42,
            KnownNetwork::Bsc => 56,
            KnownNetwork::BscTestnet => 97,
            KnownNetwork::SelendraTestnet => 222,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        use strum::IntoEnumIterator;

        Self::iter().find(|network| network.chain_id() == chain_id)
    }
}
