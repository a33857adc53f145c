//! Sale contract families and their deployment schemas.
//!
//! Every family has a fixed constructor argument order and a fixed set of
//! post-deploy setters. Records in the registry are checked against these
//! schemas when the registry is loaded.

use serde::{Deserialize, Serialize};

use crate::{
    NetworkId,
    abi::ConstructorArg,
    error::ConfigError,
    registry::{Activation, ConfigurationRecord, Threshold},
};

/// The contract families this tool deploys.
///
/// Declaration order is the order a full run deploys them in.
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
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum ContractKind {
    Presale,
    PrivateSale,
    #[serde(rename = "PrivateSaleSEL")]
    #[strum(serialize = "PrivateSaleSEL")]
    PrivateSaleSel,
    SelendraSale,
}

/// Where a positional constructor argument comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSlot {
    Primary,
    Feed,
    Threshold(Threshold),
    ActivationStart,
    ActivationEnd,
    ActivationAt,
}

impl ArgSlot {
    fn field(&self) -> &'static str {
        match self {
            ArgSlot::Primary => "primary_address",
            ArgSlot::Feed => "feed_address",
            ArgSlot::Threshold(Threshold::MinInvestment) => "thresholds.min_investment",
            ArgSlot::Threshold(Threshold::MaxInvestment) => "thresholds.max_investment",
            ArgSlot::ActivationStart => "activation.start",
            ArgSlot::ActivationEnd => "activation.end",
            ArgSlot::ActivationAt => "activation.at",
        }
    }
}

impl ContractKind {
    /// Name of the compiled artifact and of the persisted deployment record.
    pub fn artifact_name(&self) -> String {
        self.to_string()
    }

    pub fn constructor_schema(&self) -> &'static [ArgSlot] {
        match self {
            ContractKind::Presale => &[
                ArgSlot::Primary,
                ArgSlot::Feed,
                ArgSlot::ActivationStart,
                ArgSlot::ActivationEnd,
            ],
            ContractKind::SelendraSale => &[
                ArgSlot::Primary,
                ArgSlot::Feed,
                ArgSlot::Threshold(Threshold::MinInvestment),
                ArgSlot::Threshold(Threshold::MaxInvestment),
                ArgSlot::ActivationAt,
            ],
            ContractKind::PrivateSale => &[ArgSlot::Primary],
            ContractKind::PrivateSaleSel => &[],
        }
    }

    /// Whether thresholds are configured through setters after deployment.
    pub fn has_threshold_setters(&self) -> bool {
        matches!(self, ContractKind::Presale)
    }

    /// Whether secondary (asset, feed) entries are registered after deployment.
    pub fn has_entry_setters(&self) -> bool {
        matches!(self, ContractKind::Presale)
    }

    /// Build the ordered constructor arguments for `record`.
    pub fn constructor_args(
        &self,
        network: NetworkId,
        record: &ConfigurationRecord,
    ) -> Result<Vec<ConstructorArg>, ConfigError> {
        let missing = |slot: &ArgSlot| ConfigError::MissingField {
            contract: *self,
            network,
            field: slot.field(),
        };

        self.constructor_schema()
            .iter()
            .map(|slot| {
                let arg = match (slot, record.activation) {
                    (ArgSlot::Primary, _) => record.primary_address.map(ConstructorArg::from),
                    (ArgSlot::Feed, _) => record.feed_address.map(ConstructorArg::from),
                    (ArgSlot::Threshold(threshold), _) => record
                        .scalar_thresholds
                        .get(threshold)
                        .copied()
                        .map(ConstructorArg::from),
                    (ArgSlot::ActivationStart, Some(Activation::Window { start, .. })) => {
                        Some(start.into())
                    }
                    (ArgSlot::ActivationEnd, Some(Activation::Window { end, .. })) => {
                        Some(end.into())
                    }
                    (ArgSlot::ActivationAt, Some(Activation::At { at })) => Some(at.into()),
                    _ => None,
                };
                arg.ok_or_else(|| missing(slot))
            })
            .collect()
    }

    /// Check a record against this family's schema.
    pub fn validate(
        &self,
        network: NetworkId,
        record: &ConfigurationRecord,
    ) -> Result<(), ConfigError> {
        let unsupported = |reason: String| ConfigError::Unsupported {
            contract: *self,
            network,
            reason,
        };

        self.constructor_args(network, record)?;

        if let Some(Activation::Window { start, end }) = record.activation {
            if start >= end {
                return Err(unsupported(format!(
                    "activation window start {} is not before end {}",
                    start, end
                )));
            }
        }

        if !self.has_threshold_setters() {
            let schema = self.constructor_schema();
            if let Some(threshold) = record
                .scalar_thresholds
                .keys()
                .find(|threshold| !schema.contains(&ArgSlot::Threshold(**threshold)))
            {
                return Err(unsupported(format!(
                    "threshold '{}' is neither a constructor argument nor settable",
                    threshold
                )));
            }
        }

        if let (Some(min), Some(max)) = (
            record.scalar_thresholds.get(&Threshold::MinInvestment),
            record.scalar_thresholds.get(&Threshold::MaxInvestment),
        ) {
            if min > max {
                return Err(unsupported(format!(
                    "min investment {} exceeds max investment {}",
                    min, max
                )));
            }
        }

        if !self.has_entry_setters() && !record.secondary_entries.is_empty() {
            return Err(unsupported(
                "secondary entries are not supported by this contract".to_string(),
            ));
        }

        Ok(())
    }
}
