//! In-memory ledger backend.
//!
//! Mirrors the protocol client's mock-storage mode: requests live in process
//! memory, confirmation issues a random salt after a configurable delay, and
//! balances are injected by tests or demo tooling instead of being detected
//! on-chain. The trait surface is identical to a node-backed implementation,
//! so the gateway runs end to end without external infrastructure.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use alloy::primitives::{keccak256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::debug;

use super::{
    FeeProxyExtension, LedgerError, PendingRequest, RequestData, RequestDescriptor, RequestId,
    RequestLedger, Result, SubgraphRegistry,
};

struct StoredRequest {
    descriptor: RequestDescriptor,
    /// Issued at confirmation; `None` while the request is pending.
    salt: Option<String>,
    created_at: DateTime<Utc>,
    balance: Option<U256>,
}

impl StoredRequest {
    fn to_data(&self, request_id: &RequestId) -> RequestData {
        let d = &self.descriptor;
        RequestData {
            request_id: request_id.clone(),
            currency: d.currency.clone(),
            expected_amount: d.expected_amount,
            payee: d.payee,
            payer: d.payer,
            fee_proxy: Some(FeeProxyExtension {
                salt: self.salt.clone(),
                payment_address: d.payment_network.payment_address,
                fee_address: d.payment_network.fee_address,
                fee_amount: d.payment_network.fee_amount,
            }),
            content_data: d.content_data.clone(),
            created_at: self.created_at,
            balance: self.balance,
        }
    }
}

/// In-memory request ledger.
pub struct InMemoryLedger {
    subgraphs: SubgraphRegistry,
    confirmation_delay: Duration,
    requests: RwLock<HashMap<RequestId, StoredRequest>>,
}

impl InMemoryLedger {
    pub fn new(subgraphs: SubgraphRegistry) -> Self {
        Self {
            subgraphs,
            confirmation_delay: Duration::ZERO,
            requests: RwLock::new(HashMap::new()),
        }
    }

    /// Simulate ledger-confirmation latency.
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    /// Record a detected payment for a request.
    ///
    /// Stands in for the subgraph-backed payment detector; tests and demo
    /// tooling use it to drive the open -> paid transition.
    pub fn set_balance(&self, request_id: &RequestId, balance: U256) -> Result<()> {
        let mut requests = self.requests.write().unwrap();
        let stored = requests
            .get_mut(request_id)
            .ok_or_else(|| LedgerError::RequestNotFound(request_id.clone()))?;
        stored.balance = Some(balance);
        Ok(())
    }

    fn assign_request_id(descriptor: &RequestDescriptor) -> Result<RequestId> {
        // Content-addressed like the real protocol, salted with a nonce so
        // identical descriptors still get distinct ids.
        let mut bytes = serde_json::to_vec(descriptor)
            .map_err(|e| LedgerError::Submission(format!("unserializable descriptor: {e}")))?;
        let nonce: [u8; 8] = rand::thread_rng().gen();
        bytes.extend_from_slice(&nonce);
        Ok(RequestId::new(format!("01{}", hex::encode(keccak256(&bytes)))))
    }

    fn generate_salt() -> String {
        let bytes: [u8; 8] = rand::thread_rng().gen();
        hex::encode(bytes)
    }
}

#[async_trait]
impl RequestLedger for InMemoryLedger {
    async fn create_request(&self, descriptor: RequestDescriptor) -> Result<PendingRequest> {
        // Balance detection needs a subgraph endpoint for the chain; reject
        // at submission rather than at the first status poll.
        let subgraph_url = self.subgraphs.url_for(&descriptor.currency.chain)?;
        debug!(
            chain = %descriptor.currency.chain,
            subgraph = %subgraph_url,
            "Submitting request to mock storage"
        );

        let request_id = Self::assign_request_id(&descriptor)?;
        let stored = StoredRequest {
            descriptor,
            salt: None,
            created_at: Utc::now(),
            balance: None,
        };
        self.requests
            .write()
            .unwrap()
            .insert(request_id.clone(), stored);

        Ok(PendingRequest { request_id })
    }

    async fn wait_for_confirmation(&self, pending: &PendingRequest) -> Result<RequestData> {
        if !self.confirmation_delay.is_zero() {
            tokio::time::sleep(self.confirmation_delay).await;
        }

        let mut requests = self.requests.write().unwrap();
        let stored = requests
            .get_mut(&pending.request_id)
            .ok_or_else(|| LedgerError::Confirmation(format!(
                "request {} vanished before confirmation",
                pending.request_id
            )))?;

        if stored.salt.is_none() {
            stored.salt = Some(Self::generate_salt());
        }
        Ok(stored.to_data(&pending.request_id))
    }

    async fn get_request(&self, request_id: &RequestId) -> Result<RequestData> {
        let requests = self.requests.read().unwrap();
        requests
            .get(request_id)
            .map(|stored| stored.to_data(request_id))
            .ok_or_else(|| LedgerError::RequestNotFound(request_id.clone()))
    }

    async fn refresh_balance(&self, request_id: &RequestId) -> Result<RequestData> {
        // A real backend re-queries the chain's payment subgraph here; the
        // mock re-reads whatever balance was injected.
        let data = self.get_request(request_id).await?;
        self.subgraphs.url_for(&data.currency.chain)?;
        Ok(data)
    }
}
