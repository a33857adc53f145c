use alloy_core::primitives::Address;
use clap::Parser;
use salekit_deploy::{CONFIG_FILENAME, ContractKind, NetworkId, RunConfig, SequenceMode};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "salekit")]
#[command(
    author,
    version,
    about = "Deploy and configure token sale contracts on EVM chains"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "SALEKIT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a Salekit.toml file, or to a directory containing one.
    ///
    /// Settings are layered: built-in defaults, then this file, then
    /// `SALEKIT_*` environment variables, then the flags below.
    #[arg(short, long, alias = "conf", env = "SALEKIT_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: String,

    /// The JSON-RPC endpoint of the target chain.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<String>,

    /// The expected network (chain id or name, e.g. `97` or `bsc-testnet`).
    ///
    /// The run aborts if the endpoint serves another chain.
    #[arg(short, long)]
    pub network: Option<NetworkId>,

    /// The node-managed account that sends every transaction.
    #[arg(long)]
    pub from: Option<Address>,

    /// How secondary entries are registered after deployment.
    #[arg(long)]
    pub mode: Option<SequenceMode>,

    /// Contracts to deploy, comma separated. Defaults to all of them.
    #[arg(long, value_delimiter = ',')]
    pub contracts: Option<Vec<ContractKind>>,

    /// Redeploy contracts even when a matching deployment record exists.
    #[arg(long, default_value_t = false)]
    pub redeploy: bool,

    /// A registry file replacing the bundled network table.
    #[arg(long)]
    pub registry: Option<String>,

    /// Print what would be deployed on `--network` and exit without connecting.
    #[arg(long, requires = "network")]
    pub plan: bool,

    /// Write the effective configuration to this path before deploying.
    #[arg(long)]
    pub save_config: Option<String>,
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = rpc_url.clone();
        }
        if let Some(network) = self.network {
            config.network = Some(network);
        }
        if let Some(from) = self.from {
            config.from = Some(from);
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(contracts) = &self.contracts {
            config.contracts = contracts.clone();
        }
        if let Some(registry) = &self.registry {
            config.registry_path = Some(registry.into());
        }
        config.force_redeploy |= self.redeploy;
    }
}
