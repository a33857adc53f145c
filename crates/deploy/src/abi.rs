//! ABI encoding for constructor arguments and post-deploy setter calls.

use std::fmt;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes, U256},
};
use alloy_sol_types::{SolCall, sol};
use serde::{Deserialize, Serialize};

use crate::registry::{SecondaryEntry, Threshold};

sol! {
    function setMinInvestment(uint256 amount) external;
    function setMaxInvestment(uint256 amount) external;
    function setSupportedToken(address token, address priceFeed) external;
}

/// A single positional constructor argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructorArg {
    Address(Address),
    Uint(U256),
}

impl ConstructorArg {
    fn to_sol_value(&self) -> DynSolValue {
        match self {
            ConstructorArg::Address(address) => DynSolValue::Address(*address),
            ConstructorArg::Uint(value) => DynSolValue::Uint(*value, 256),
        }
    }
}

impl From<Address> for ConstructorArg {
    fn from(address: Address) -> Self {
        ConstructorArg::Address(address)
    }
}

impl From<u64> for ConstructorArg {
    fn from(value: u64) -> Self {
        ConstructorArg::Uint(U256::from(value))
    }
}

impl fmt::Display for ConstructorArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructorArg::Address(address) => write!(f, "{}", address),
            ConstructorArg::Uint(value) => write!(f, "{}", value),
        }
    }
}

/// ABI-encode constructor arguments as they follow the creation bytecode.
pub fn encode_constructor_args(args: &[ConstructorArg]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }

    DynSolValue::Tuple(args.iter().map(ConstructorArg::to_sol_value).collect()).abi_encode_params()
}

/// A state-mutating entry point invoked on a deployed sale contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetterCall {
    Threshold { threshold: Threshold, value: u64 },
    SupportedToken(SecondaryEntry),
}

impl SetterCall {
    /// Solidity method name, for logs.
    pub fn method(&self) -> &'static str {
        match self {
            SetterCall::Threshold {
                threshold: Threshold::MinInvestment,
                ..
            } => "setMinInvestment",
            SetterCall::Threshold {
                threshold: Threshold::MaxInvestment,
                ..
            } => "setMaxInvestment",
            SetterCall::SupportedToken(_) => "setSupportedToken",
        }
    }

    pub fn calldata(&self) -> Bytes {
        let encoded = match self {
            SetterCall::Threshold {
                threshold: Threshold::MinInvestment,
                value,
            } => setMinInvestmentCall {
                amount: U256::from(*value),
            }
            .abi_encode(),
            SetterCall::Threshold {
                threshold: Threshold::MaxInvestment,
                value,
            } => setMaxInvestmentCall {
                amount: U256::from(*value),
            }
            .abi_encode(),
            SetterCall::SupportedToken(entry) => setSupportedTokenCall {
                token: entry.asset,
                priceFeed: entry.feed,
            }
            .abi_encode(),
        };

        Bytes::from(encoded)
    }
}

impl fmt::Display for SetterCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetterCall::Threshold { value, .. } => write!(f, "{}({})", self.method(), value),
            SetterCall::SupportedToken(entry) => {
                write!(f, "{}({}, {})", self.method(), entry.asset, entry.feed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_no_args_is_empty() {
        assert!(encode_constructor_args(&[]).is_empty());
    }

    #[test]
    fn test_encode_static_args_one_word_each() {
        let args = vec![
            ConstructorArg::Address(Address::with_last_byte(1)),
            ConstructorArg::Address(Address::with_last_byte(2)),
            ConstructorArg::from(1635686100u64),
            ConstructorArg::from(1640969999u64),
        ];

        let encoded = encode_constructor_args(&args);
        assert_eq!(encoded.len(), 4 * 32);

        // Addresses are left-padded into their word
        assert_eq!(encoded[31], 1);
        assert_eq!(encoded[63], 2);
        assert_eq!(
            U256::from_be_slice(&encoded[64..96]),
            U256::from(1635686100u64)
        );
    }

    #[test]
    fn test_threshold_calldata() {
        let call = SetterCall::Threshold {
            threshold: Threshold::MinInvestment,
            value: 1000,
        };
        let data = call.calldata();

        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], setMinInvestmentCall::SELECTOR.as_slice());
        assert_eq!(U256::from_be_slice(&data[4..]), U256::from(1000u64));
        assert_eq!(call.to_string(), "setMinInvestment(1000)");
    }

    #[test]
    fn test_supported_token_calldata() {
        let entry = SecondaryEntry {
            asset: Address::with_last_byte(0xaa),
            feed: Address::with_last_byte(0xbb),
        };
        let data = SetterCall::SupportedToken(entry).calldata();

        assert_eq!(data.len(), 4 + 2 * 32);
        assert_eq!(&data[..4], setSupportedTokenCall::SELECTOR.as_slice());
        assert_eq!(data[4 + 31], 0xaa);
        assert_eq!(data[4 + 63], 0xbb);
    }

    #[test]
    fn test_max_investment_uses_its_own_selector() {
        let min = SetterCall::Threshold {
            threshold: Threshold::MinInvestment,
            value: 1,
        };
        let max = SetterCall::Threshold {
            threshold: Threshold::MaxInvestment,
            value: 1,
        };

        assert_ne!(min.calldata()[..4], max.calldata()[..4]);
        assert_eq!(max.method(), "setMaxInvestment");
    }
}
