//! REST API endpoints for the invoice gateway.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::ApiError;
use crate::domain::{CreateInvoiceParams, InvoiceStatus};
use crate::ledger::{RequestData, RequestId};
use crate::server::AppState;

/// Build the invoice router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invoices", post(create_invoice))
        .route("/invoices/:id", get(get_invoice))
}

/// Response body for `POST /invoices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceResponse {
    pub id: RequestId,
    #[serde(rename = "paymentReference")]
    pub payment_reference: String,
}

/// Response body for `GET /invoices/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceStatusResponse {
    pub status: InvoiceStatus,
    #[serde(rename = "requestData")]
    pub request_data: RequestData,
}

/// Create an invoice.
///
/// Validates the body, submits a request to the ledger, waits for on-network
/// confirmation, and responds with the assigned id and the deterministic
/// payment reference. Confirmation latency is network-bound; the handler
/// never responds before the salt is issued.
#[instrument(skip(state, body))]
async fn create_invoice(
    State(state): State<AppState>,
    Json(body): Json<CreateInvoiceParams>,
) -> Result<(StatusCode, Json<CreateInvoiceResponse>), ApiError> {
    let created = state.invoices.create_invoice(body).await?;
    info!(id = %created.request_id, "Invoice created");
    Ok((
        StatusCode::CREATED,
        Json(CreateInvoiceResponse {
            id: created.request_id,
            payment_reference: created.payment_reference,
        }),
    ))
}

/// Resolve the lifecycle state of an invoice.
///
/// Idempotent read path; may be polled an unbounded number of times.
#[instrument(skip(state))]
async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InvoiceStatusResponse>, ApiError> {
    let report = state.invoices.invoice_status(&RequestId::new(id)).await?;
    Ok(Json(InvoiceStatusResponse {
        status: report.status,
        request_data: report.request_data,
    }))
}
