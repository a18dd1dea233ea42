//! Invoice creation and status resolution.
//!
//! The write path (creator) validates input, submits a request descriptor to
//! the ledger, awaits on-network confirmation, and derives the deterministic
//! payment reference from the issued salt. The read path (status resolver)
//! refreshes the observed balance and classifies the invoice as `open` or
//! `paid` by exact integer comparison against the original expected amount.
//!
//! Both paths are stateless apart from the immutable payee identity: every
//! record lives in the ledger, and lifecycle state is derived at read time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::domain::{CreateInvoiceParams, Currency, FeePolicy, InvoiceStatus, PayeeIdentity};
use crate::ledger::{
    payment_reference, LedgerError, PaymentNetworkParams, RequestData, RequestDescriptor,
    RequestId, RequestLedger,
};

/// Errors from invoice operations.
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// A required creation field is absent or empty.
    #[error("{field} not found")]
    MissingField { field: &'static str },

    /// The requested currency is not the deployment's supported pair.
    #[error("currency must be {supported}")]
    UnsupportedCurrency {
        requested: String,
        supported: Currency,
    },

    /// A field is present but unparseable.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A ledger call exceeded the configured deadline.
    #[error("ledger operation {operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    /// The confirmed record carries no fee-proxy salt; no reference can be
    /// derived, so the creation fails loudly.
    #[error("confirmed request {request_id} carries no fee-proxy salt")]
    MissingSalt { request_id: RequestId },

    /// Collaborator failure, propagated as-is.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result of a successful invoice creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedInvoice {
    pub request_id: RequestId,
    pub payment_reference: String,
}

/// Result of a status query: derived state plus the refreshed record.
#[derive(Debug, Clone)]
pub struct InvoiceStatusReport {
    pub status: InvoiceStatus,
    pub request_data: RequestData,
}

/// Invoice service over a shared ledger collaborator.
pub struct InvoiceService {
    ledger: Arc<dyn RequestLedger>,
    payee: PayeeIdentity,
    supported_currency: Currency,
    fee_policy: FeePolicy,
    ledger_timeout: Duration,
}

impl InvoiceService {
    pub fn new(
        ledger: Arc<dyn RequestLedger>,
        payee: PayeeIdentity,
        supported_currency: Currency,
        fee_policy: FeePolicy,
        ledger_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            payee,
            supported_currency,
            fee_policy,
            ledger_timeout,
        }
    }

    pub fn supported_currency(&self) -> &Currency {
        &self.supported_currency
    }

    /// Create an invoice: validate, submit, await confirmation, derive the
    /// payment reference.
    ///
    /// Validation is fail-fast in a fixed order, and no ledger call is made
    /// until every field has passed. The response is never sent before
    /// confirmation because the reference cannot exist without the salt.
    #[instrument(skip(self, params))]
    pub async fn create_invoice(
        &self,
        params: CreateInvoiceParams,
    ) -> Result<CreatedInvoice, InvoiceError> {
        let currency = require(&params.currency, "currency")?;
        if currency != self.supported_currency.to_string() {
            return Err(InvoiceError::UnsupportedCurrency {
                requested: currency.to_string(),
                supported: self.supported_currency.clone(),
            });
        }

        let expected_amount: U256 = parse_field(require(&params.expected_amount, "expectedAmount")?, "expectedAmount")?;
        let payer: Address = parse_field(require(&params.payer_address, "payerAddress")?, "payerAddress")?;
        let payment_address: Address =
            parse_field(require(&params.payment_address, "paymentAddress")?, "paymentAddress")?;
        let content_data = match params.contentdata {
            Some(value) if !value.is_null() => value,
            _ => return Err(InvoiceError::MissingField { field: "contentdata" }),
        };

        let descriptor = RequestDescriptor {
            currency: self.supported_currency.clone(),
            expected_amount,
            payee: self.payee.address,
            payer,
            payment_network: PaymentNetworkParams {
                payment_address,
                fee_address: self.fee_policy.fee_address(payment_address),
                fee_amount: U256::ZERO,
            },
            content_data,
        };

        let pending = self
            .with_timeout("create_request", self.ledger.create_request(descriptor))
            .await?;
        debug!(request_id = %pending.request_id, "Request submitted, awaiting confirmation");

        let confirmed = self
            .with_timeout(
                "wait_for_confirmation",
                self.ledger.wait_for_confirmation(&pending),
            )
            .await?;

        let salt = confirmed
            .fee_proxy_salt()
            .ok_or_else(|| InvoiceError::MissingSalt {
                request_id: confirmed.request_id.clone(),
            })?;
        let reference = payment_reference(&confirmed.request_id, salt, &payment_address);

        info!(
            request_id = %confirmed.request_id,
            payment_reference = %reference,
            "Invoice created"
        );
        Ok(CreatedInvoice {
            request_id: confirmed.request_id.clone(),
            payment_reference: reference,
        })
    }

    /// Resolve the current lifecycle state of an invoice.
    ///
    /// Read-only and idempotent: the expected amount is read from the stored
    /// record, never from caller input, and repeated calls only re-observe
    /// the transient balance. A failed balance refresh propagates as an
    /// upstream error; it is never conflated with a genuinely unpaid
    /// invoice.
    #[instrument(skip(self))]
    pub async fn invoice_status(
        &self,
        request_id: &RequestId,
    ) -> Result<InvoiceStatusReport, InvoiceError> {
        let request = self
            .with_timeout("get_request", self.ledger.get_request(request_id))
            .await?;

        let refreshed = self
            .with_timeout("refresh_balance", self.ledger.refresh_balance(request_id))
            .await?;

        let status = InvoiceStatus::derive(refreshed.balance, request.expected_amount);
        debug!(
            request_id = %request_id,
            balance = ?refreshed.balance,
            expected = %request.expected_amount,
            status = %status,
            "Invoice status resolved"
        );
        Ok(InvoiceStatusReport {
            status,
            request_data: refreshed,
        })
    }

    /// Bound a ledger call with the configured deadline.
    ///
    /// Ledger calls are network-bound and may block for seconds; a hung call
    /// must fail the request rather than stall it indefinitely.
    async fn with_timeout<T, F>(
        &self,
        operation: &'static str,
        fut: F,
    ) -> Result<T, InvoiceError>
    where
        F: Future<Output = crate::ledger::Result<T>>,
    {
        match tokio::time::timeout(self.ledger_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(InvoiceError::Timeout {
                operation,
                seconds: self.ledger_timeout.as_secs(),
            }),
        }
    }
}

fn require<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, InvoiceError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(InvoiceError::MissingField { field }),
    }
}

fn parse_field<T>(raw: &str, field: &'static str) -> Result<T, InvoiceError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| InvoiceError::InvalidField {
        field,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        FeeProxyExtension, MockRequestLedger, PendingRequest, Result as LedgerResult,
    };
    use async_trait::async_trait;
    use chrono::Utc;

    const PAYER: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const PAYMENT: &str = "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
    const REQUEST_ID: &str =
        "011f059c1b7a2a2c49cbba8e103b4b3aeccf8ad336c8c92d563f3a15b18d7111aa";
    const SALT: &str = "0ee84db293a752c6";

    fn service(ledger: impl RequestLedger + 'static) -> InvoiceService {
        InvoiceService::new(
            Arc::new(ledger),
            PayeeIdentity::new(PAYER.parse().unwrap()),
            "ETH-sepolia".parse().unwrap(),
            FeePolicy::PaymentAddress,
            Duration::from_secs(5),
        )
    }

    fn valid_params() -> CreateInvoiceParams {
        CreateInvoiceParams {
            currency: Some("ETH-sepolia".into()),
            expected_amount: Some("1000000000000000000".into()),
            payer_address: Some(PAYER.into()),
            payment_address: Some(PAYMENT.into()),
            contentdata: Some(serde_json::json!({"invoiceNo": 42})),
        }
    }

    fn confirmed_data(salt: Option<&str>, balance: Option<U256>) -> RequestData {
        RequestData {
            request_id: RequestId::new(REQUEST_ID),
            currency: "ETH-sepolia".parse().unwrap(),
            expected_amount: "1000000000000000000".parse().unwrap(),
            payee: PAYER.parse().unwrap(),
            payer: PAYER.parse().unwrap(),
            fee_proxy: Some(FeeProxyExtension {
                salt: salt.map(String::from),
                payment_address: PAYMENT.parse().unwrap(),
                fee_address: PAYMENT.parse().unwrap(),
                fee_amount: U256::ZERO,
            }),
            content_data: serde_json::json!({"invoiceNo": 42}),
            created_at: Utc::now(),
            balance,
        }
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_returns_deterministic_reference() {
        let mut ledger = MockRequestLedger::new();
        ledger.expect_create_request().returning(|descriptor| {
            assert_eq!(descriptor.payment_network.fee_amount, U256::ZERO);
            assert_eq!(
                descriptor.payment_network.fee_address,
                descriptor.payment_network.payment_address
            );
            Ok(PendingRequest {
                request_id: RequestId::new(REQUEST_ID),
            })
        });
        ledger
            .expect_wait_for_confirmation()
            .returning(|_| Ok(confirmed_data(Some(SALT), None)));

        let created = service(ledger)
            .create_invoice(valid_params())
            .await
            .unwrap();

        assert_eq!(created.request_id.as_str(), REQUEST_ID);

        // Recompute the reference off-path from the same triple.
        let expected = payment_reference(
            &RequestId::new(REQUEST_ID),
            SALT,
            &PAYMENT.parse().unwrap(),
        );
        assert_eq!(created.payment_reference, expected);
    }

    #[tokio::test]
    async fn test_validation_order_and_no_ledger_calls() {
        // A mock with no expectations panics on any call: these cases must
        // fail before the ledger is touched.
        let cases: Vec<(&str, Box<dyn Fn(&mut CreateInvoiceParams)>)> = vec![
            ("currency", Box::new(|p| p.currency = None)),
            ("expectedAmount", Box::new(|p| p.expected_amount = None)),
            ("payerAddress", Box::new(|p| p.payer_address = None)),
            ("paymentAddress", Box::new(|p| p.payment_address = Some("  ".into()))),
            ("contentdata", Box::new(|p| p.contentdata = None)),
        ];

        for (field, mutate) in cases {
            let svc = service(MockRequestLedger::new());
            let mut params = valid_params();
            mutate(&mut params);
            let err = svc.create_invoice(params).await.unwrap_err();
            match err {
                InvoiceError::MissingField { field: f } => assert_eq!(f, field),
                other => panic!("expected MissingField({field}), got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_null_contentdata_is_missing() {
        let svc = service(MockRequestLedger::new());
        let mut params = valid_params();
        params.contentdata = Some(serde_json::Value::Null);
        let err = svc.create_invoice(params).await.unwrap_err();
        assert!(matches!(
            err,
            InvoiceError::MissingField { field: "contentdata" }
        ));
    }

    #[tokio::test]
    async fn test_unsupported_currency_is_structured() {
        let svc = service(MockRequestLedger::new());
        let mut params = valid_params();
        params.currency = Some("BTC-mainnet".into());
        let err = svc.create_invoice(params).await.unwrap_err();
        match err {
            InvoiceError::UnsupportedCurrency { requested, supported } => {
                assert_eq!(requested, "BTC-mainnet");
                assert_eq!(supported.to_string(), "ETH-sepolia");
            }
            other => panic!("expected UnsupportedCurrency, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_amount_beyond_u64_survives() {
        // 2^70, representable only with arbitrary precision.
        let big = U256::from(1u128 << 70).to_string();

        let mut ledger = MockRequestLedger::new();
        let expected = big.clone();
        ledger.expect_create_request().returning(move |descriptor| {
            assert_eq!(descriptor.expected_amount.to_string(), expected);
            Ok(PendingRequest {
                request_id: RequestId::new(REQUEST_ID),
            })
        });
        ledger
            .expect_wait_for_confirmation()
            .returning(|_| Ok(confirmed_data(Some(SALT), None)));

        let mut params = valid_params();
        params.expected_amount = Some(big);
        service(ledger).create_invoice(params).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_salt_fails_loudly() {
        let mut ledger = MockRequestLedger::new();
        ledger.expect_create_request().returning(|_| {
            Ok(PendingRequest {
                request_id: RequestId::new(REQUEST_ID),
            })
        });
        ledger
            .expect_wait_for_confirmation()
            .returning(|_| Ok(confirmed_data(None, None)));

        let err = service(ledger)
            .create_invoice(valid_params())
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::MissingSalt { .. }));
    }

    #[tokio::test]
    async fn test_submission_failure_propagates() {
        let mut ledger = MockRequestLedger::new();
        ledger
            .expect_create_request()
            .returning(|_| Err(LedgerError::Submission("node unreachable".into())));

        let err = service(ledger)
            .create_invoice(valid_params())
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::Ledger(LedgerError::Submission(_))));
    }

    // ------------------------------------------------------------------
    // Status resolution
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_status_open_then_paid() {
        for (balance, expected_status) in [
            (None, InvoiceStatus::Open),
            (Some("999999999999999999".parse().unwrap()), InvoiceStatus::Open),
            (
                Some("1000000000000000000".parse().unwrap()),
                InvoiceStatus::Paid,
            ),
        ] {
            let mut ledger = MockRequestLedger::new();
            ledger
                .expect_get_request()
                .returning(|_| Ok(confirmed_data(Some(SALT), None)));
            ledger
                .expect_refresh_balance()
                .returning(move |_| Ok(confirmed_data(Some(SALT), balance)));

            let report = service(ledger)
                .invoice_status(&RequestId::new(REQUEST_ID))
                .await
                .unwrap();
            assert_eq!(report.status, expected_status);
        }
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let mut ledger = MockRequestLedger::new();
        ledger
            .expect_get_request()
            .returning(|id| Err(LedgerError::RequestNotFound(id.clone())));

        let err = service(ledger)
            .invoice_status(&RequestId::new("01unknown"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvoiceError::Ledger(LedgerError::RequestNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_failure_is_not_open() {
        let mut ledger = MockRequestLedger::new();
        ledger
            .expect_get_request()
            .returning(|_| Ok(confirmed_data(Some(SALT), None)));
        ledger.expect_refresh_balance().returning(|id| {
            Err(LedgerError::BalanceRefresh {
                request_id: id.clone(),
                message: "subgraph unavailable".into(),
            })
        });

        let err = service(ledger)
            .invoice_status(&RequestId::new(REQUEST_ID))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvoiceError::Ledger(LedgerError::BalanceRefresh { .. })
        ));
    }

    // ------------------------------------------------------------------
    // Timeouts
    // ------------------------------------------------------------------

    /// Ledger stub whose confirmation never completes.
    struct HangingLedger;

    #[async_trait]
    impl RequestLedger for HangingLedger {
        async fn create_request(
            &self,
            _descriptor: RequestDescriptor,
        ) -> LedgerResult<PendingRequest> {
            Ok(PendingRequest {
                request_id: RequestId::new(REQUEST_ID),
            })
        }

        async fn wait_for_confirmation(
            &self,
            _pending: &PendingRequest,
        ) -> LedgerResult<RequestData> {
            std::future::pending().await
        }

        async fn get_request(&self, _request_id: &RequestId) -> LedgerResult<RequestData> {
            std::future::pending().await
        }

        async fn refresh_balance(&self, _request_id: &RequestId) -> LedgerResult<RequestData> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_confirmation_timeout_surfaces() {
        let svc = InvoiceService::new(
            Arc::new(HangingLedger),
            PayeeIdentity::new(PAYER.parse().unwrap()),
            "ETH-sepolia".parse().unwrap(),
            FeePolicy::PaymentAddress,
            Duration::from_millis(20),
        );

        let err = svc.create_invoice(valid_params()).await.unwrap_err();
        assert!(matches!(
            err,
            InvoiceError::Timeout {
                operation: "wait_for_confirmation",
                ..
            }
        ));
    }
}
