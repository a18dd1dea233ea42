//! Request ledger collaborator.
//!
//! The decentralized request/payment protocol is an external collaborator:
//! it persists request records, confirms them on-network (issuing the salt
//! the payment reference is derived from), and detects incoming payments by
//! scanning chain data through a per-chain subgraph. This module defines the
//! trait boundary the gateway consumes, the wire-level record types, and the
//! deterministic payment-reference computation.

mod memory;
mod reference;
mod subgraph;

pub use memory::InMemoryLedger;
pub use reference::payment_reference;
pub use subgraph::SubgraphRegistry;

use std::fmt;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{u256_decimal, u256_decimal_opt, Currency};

/// Payment-network extension identifier for the ETH fee-proxy contract.
///
/// This is the only payment network this deployment creates requests under.
pub const ETH_FEE_PROXY_CONTRACT: &str = "pn-eth-fee-proxy-contract";

/// Opaque request identifier assigned by the ledger at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Fee-proxy payment-network parameters attached to a request at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNetworkParams {
    pub payment_address: Address,
    pub fee_address: Address,
    #[serde(with = "u256_decimal")]
    pub fee_amount: U256,
}

/// Protocol-level request descriptor submitted to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    pub currency: Currency,
    #[serde(with = "u256_decimal")]
    pub expected_amount: U256,
    pub payee: Address,
    pub payer: Address,
    pub payment_network: PaymentNetworkParams,
    pub content_data: serde_json::Value,
}

/// A request accepted by the ledger but not yet confirmed on-network.
///
/// The id is already assigned; the fee-proxy salt is not issued until
/// confirmation, so no payment reference can be computed from this alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: RequestId,
}

/// Fee-proxy extension state as returned by the ledger.
///
/// `salt` is optional at the type level because a malformed ledger response
/// may omit it; callers must treat that as a hard failure, never compute a
/// reference from undefined data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeProxyExtension {
    pub salt: Option<String>,
    pub payment_address: Address,
    pub fee_address: Address,
    #[serde(with = "u256_decimal")]
    pub fee_amount: U256,
}

/// Full request record as held by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    pub request_id: RequestId,
    pub currency: Currency,
    #[serde(with = "u256_decimal")]
    pub expected_amount: U256,
    pub payee: Address,
    pub payer: Address,
    pub fee_proxy: Option<FeeProxyExtension>,
    pub content_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Cumulative amount detected as paid, if the detector has observed any.
    #[serde(with = "u256_decimal_opt", skip_serializing_if = "Option::is_none", default)]
    pub balance: Option<U256>,
}

impl RequestData {
    /// Salt issued by the fee-proxy extension at confirmation.
    pub fn fee_proxy_salt(&self) -> Option<&str> {
        self.fee_proxy.as_ref()?.salt.as_deref()
    }
}

/// Errors surfaced by the ledger collaborator.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No request exists under the given id.
    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    /// Request submission was rejected or failed in transit.
    #[error("request submission failed: {0}")]
    Submission(String),

    /// The ledger did not confirm the request on-network.
    #[error("request confirmation failed: {0}")]
    Confirmation(String),

    /// Balance detection failed; the payment state is unknown, not "unpaid".
    #[error("balance refresh failed for {request_id}: {message}")]
    BalanceRefresh {
        request_id: RequestId,
        message: String,
    },

    /// No subgraph endpoint is configured for the chain.
    #[error("cannot get subgraph client for unknown chain: {0}")]
    UnknownChain(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// External request/payment ledger.
///
/// One shared instance per process; implementations must be safe for
/// concurrent use by overlapping requests. All operations are network-bound
/// and may take multi-second time to settle; callers bound them with an
/// explicit timeout.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RequestLedger: Send + Sync {
    /// Submit a new request for persistence. Assigns the request id.
    async fn create_request(&self, descriptor: RequestDescriptor) -> Result<PendingRequest>;

    /// Wait until the ledger confirms the request on-network.
    ///
    /// Confirmation issues the fee-proxy salt; the returned record is the
    /// first from which a payment reference can be derived.
    async fn wait_for_confirmation(&self, pending: &PendingRequest) -> Result<RequestData>;

    /// Fetch the stored record for a request id.
    async fn get_request(&self, request_id: &RequestId) -> Result<RequestData>;

    /// Re-scan for incoming transfers matching the request's payment
    /// reference and return the refreshed record.
    async fn refresh_balance(&self, request_id: &RequestId) -> Result<RequestData>;
}
