//! Invoice Gateway Library
//!
//! Minimal HTTP facade over the Request Network payment-request protocol:
//! create an invoice bound to a payer/payee pair and a payment address, then
//! poll its lifecycle state (`open` / `paid`) against the balance observed
//! on-chain for its deterministic payment reference.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (currency, amounts, invoice status)
//! - [`ledger`] - Request ledger collaborator (trait, payment reference, mock storage)
//! - [`invoice`] - Invoice creation and status resolution
//! - [`auth`] - API key authentication
//! - [`api`] - REST API routes and error responses
//! - [`server`] - HTTP server bootstrap

pub mod api;
pub mod auth;
pub mod domain;
pub mod invoice;
pub mod ledger;
pub mod server;

// Re-export commonly used types
pub use domain::{Currency, FeePolicy, InvoiceStatus, PayeeIdentity};
pub use invoice::{CreatedInvoice, InvoiceError, InvoiceService, InvoiceStatusReport};
pub use ledger::{
    payment_reference, InMemoryLedger, LedgerError, PendingRequest, RequestData,
    RequestDescriptor, RequestId, RequestLedger, Result, SubgraphRegistry,
};
