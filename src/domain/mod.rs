//! Core domain types for the invoice gateway.
//!
//! An invoice is never stored by this service: its lifecycle state is derived
//! at read time from the balance the ledger collaborator observed on-chain.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A `symbol-chain` currency pair, e.g. `ETH-sepolia`.
///
/// Each deployment supports exactly one pair; creation requests carrying any
/// other value are rejected before the ledger is contacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    /// Asset symbol, e.g. `ETH`.
    pub symbol: String,
    /// Payment chain identifier, e.g. `sepolia`.
    pub chain: String,
}

/// Error parsing a currency pair.
#[derive(Debug, Error)]
#[error("currency must be of the form SYMBOL-chain, got {0:?}")]
pub struct InvalidCurrency(pub String);

impl FromStr for Currency {
    type Err = InvalidCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (symbol, chain) = s.split_once('-').ok_or_else(|| InvalidCurrency(s.into()))?;
        if symbol.is_empty() || chain.is_empty() {
            return Err(InvalidCurrency(s.into()));
        }
        Ok(Self {
            symbol: symbol.to_string(),
            chain: chain.to_string(),
        })
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.symbol, self.chain)
    }
}

impl Serialize for Currency {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Derived invoice lifecycle state.
///
/// There are no intermediate or persisted states: `paid` holds iff a balance
/// has been observed and it covers the expected amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Open,
    Paid,
}

impl InvoiceStatus {
    /// Classify an invoice from its observed balance.
    ///
    /// Exact unsigned integer comparison; `balance == expected` is `Paid`.
    pub fn derive(balance: Option<U256>, expected: U256) -> Self {
        match balance {
            Some(observed) if observed >= expected => InvoiceStatus::Paid,
            _ => InvoiceStatus::Open,
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Open => write!(f, "open"),
            InvoiceStatus::Paid => write!(f, "paid"),
        }
    }
}

/// Payee identity fixed at process start from the configured signing key.
///
/// One instance per process, shared immutably by every invoice it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayeeIdentity {
    /// Ethereum address derived from the signing key.
    pub address: Address,
}

impl PayeeIdentity {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

/// Fee-proxy fee recipient policy.
///
/// The fee amount is always zero in this deployment; which address receives
/// that zero fee is an explicit per-deployment choice, not a derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeePolicy {
    /// Route the (zero) fee to the payment address itself.
    #[default]
    PaymentAddress,
    /// Route the (zero) fee to the zero address.
    ZeroAddress,
}

impl FeePolicy {
    /// Resolve the fee address for a given payment address.
    pub fn fee_address(&self, payment_address: Address) -> Address {
        match self {
            FeePolicy::PaymentAddress => payment_address,
            FeePolicy::ZeroAddress => Address::ZERO,
        }
    }

    /// Parse from configuration. Accepts `payment-address` or `zero-address`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "payment-address" => Some(FeePolicy::PaymentAddress),
            "zero-address" | "zero" => Some(FeePolicy::ZeroAddress),
            _ => None,
        }
    }
}

/// Raw invoice creation input as received from the HTTP layer.
///
/// Fields are optional so that presence validation happens in the creator,
/// with one structured error per missing field, instead of in the JSON
/// deserializer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateInvoiceParams {
    pub currency: Option<String>,
    #[serde(rename = "expectedAmount")]
    pub expected_amount: Option<String>,
    #[serde(rename = "payerAddress")]
    pub payer_address: Option<String>,
    #[serde(rename = "paymentAddress")]
    pub payment_address: Option<String>,
    pub contentdata: Option<serde_json::Value>,
}

/// Serde adapter for `U256` as a decimal string.
///
/// Amounts cross the wire as decimal strings (`"1000000000000000000"`), never
/// as JSON numbers, so values beyond 2^53 survive round-trips losslessly.
pub mod u256_decimal {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<U256>` as an optional decimal string.
pub mod u256_decimal_opt {
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<U256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<U256>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| s.parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_parse() {
        let c: Currency = "ETH-sepolia".parse().unwrap();
        assert_eq!(c.symbol, "ETH");
        assert_eq!(c.chain, "sepolia");
        assert_eq!(c.to_string(), "ETH-sepolia");
    }

    #[test]
    fn test_currency_parse_rejects_malformed() {
        assert!("ETH".parse::<Currency>().is_err());
        assert!("-sepolia".parse::<Currency>().is_err());
        assert!("ETH-".parse::<Currency>().is_err());
    }

    #[test]
    fn test_status_open_without_balance() {
        let expected = U256::from(100u64);
        assert_eq!(InvoiceStatus::derive(None, expected), InvoiceStatus::Open);
    }

    #[test]
    fn test_status_open_below_expected() {
        let expected = U256::from(100u64);
        let balance = Some(U256::from(99u64));
        assert_eq!(InvoiceStatus::derive(balance, expected), InvoiceStatus::Open);
    }

    #[test]
    fn test_status_paid_at_exact_boundary() {
        let expected = U256::from(100u64);
        let balance = Some(U256::from(100u64));
        assert_eq!(InvoiceStatus::derive(balance, expected), InvoiceStatus::Paid);
    }

    #[test]
    fn test_status_paid_above_expected() {
        let expected = U256::from(100u64);
        let balance = Some(U256::from(101u64));
        assert_eq!(InvoiceStatus::derive(balance, expected), InvoiceStatus::Paid);
    }

    #[test]
    fn test_status_exact_beyond_u64() {
        // 1 ETH in wei exceeds u32, and 2^70 exceeds u64 entirely.
        let expected = U256::from(1u128 << 70);
        let short = expected - U256::from(1u64);
        assert_eq!(
            InvoiceStatus::derive(Some(short), expected),
            InvoiceStatus::Open
        );
        assert_eq!(
            InvoiceStatus::derive(Some(expected), expected),
            InvoiceStatus::Paid
        );
    }

    #[test]
    fn test_fee_policy_addresses() {
        let payment: Address = "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"
            .parse()
            .unwrap();
        assert_eq!(FeePolicy::PaymentAddress.fee_address(payment), payment);
        assert_eq!(FeePolicy::ZeroAddress.fee_address(payment), Address::ZERO);
    }

    #[test]
    fn test_u256_decimal_round_trip() {
        #[derive(Serialize, Deserialize)]
        struct Amount {
            #[serde(with = "u256_decimal")]
            value: U256,
        }

        // Larger than 2^63: must survive serialization without precision loss.
        let value: U256 = "18446744073709551617000".parse().unwrap();
        let json = serde_json::to_string(&Amount { value }).unwrap();
        assert_eq!(json, r#"{"value":"18446744073709551617000"}"#);

        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value, value);
    }
}
