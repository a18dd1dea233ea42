//! Structured API error responses with error codes
//!
//! One error taxonomy for every failure path: machine-readable codes with
//! stable numeric values, human-readable messages, and the right HTTP status.
//! Collaborator failures surface as upstream errors; they are never
//! downgraded to a successful "open" classification.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::invoice::InvoiceError;
use crate::ledger::LedgerError;

/// Error codes for API responses
///
/// These codes are stable and can be used by clients for programmatic error
/// handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    /// No authentication credentials provided
    AuthRequired,
    /// Invalid API key value
    InvalidApiKey,

    // Validation errors (3xxx)
    /// Required field is missing
    MissingRequiredField,
    /// Field value is invalid
    InvalidFieldValue,
    /// Currency is not the deployment's supported pair
    UnsupportedCurrency,

    // Resource errors (4xxx)
    /// Unknown request identifier
    InvoiceNotFound,

    // Upstream/infrastructure errors (8xxx)
    /// Ledger submission or confirmation failed
    LedgerUnavailable,
    /// Balance detection failed; payment state is unknown
    BalanceUnavailable,
    /// Collaborator call exceeded its deadline
    Timeout,
    /// Internal server error (e.g. malformed collaborator response)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn numeric_code(&self) -> u32 {
        match self {
            ErrorCode::AuthRequired => 1001,
            ErrorCode::InvalidApiKey => 1002,

            ErrorCode::MissingRequiredField => 3001,
            ErrorCode::InvalidFieldValue => 3002,
            ErrorCode::UnsupportedCurrency => 3003,

            ErrorCode::InvoiceNotFound => 4001,

            ErrorCode::LedgerUnavailable => 8001,
            ErrorCode::BalanceUnavailable => 8002,
            ErrorCode::Timeout => 8003,
            ErrorCode::InternalError => 8999,
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::AuthRequired => StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidApiKey => StatusCode::UNAUTHORIZED,

            ErrorCode::MissingRequiredField => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,
            ErrorCode::UnsupportedCurrency => StatusCode::BAD_REQUEST,

            ErrorCode::InvoiceNotFound => StatusCode::NOT_FOUND,

            ErrorCode::LedgerUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::BalanceUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code_str = match self {
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::InvalidApiKey => "INVALID_API_KEY",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidFieldValue => "INVALID_FIELD_VALUE",
            ErrorCode::UnsupportedCurrency => "UNSUPPORTED_CURRENCY",
            ErrorCode::InvoiceNotFound => "INVOICE_NOT_FOUND",
            ErrorCode::LedgerUnavailable => "LEDGER_UNAVAILABLE",
            ErrorCode::BalanceUnavailable => "BALANCE_UNAVAILABLE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", code_str)
    }
}

/// Structured error response for API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error details
    pub error: ErrorDetails,
}

/// Detailed error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code for easy categorization
    pub numeric_code: u32,

    /// Human-readable error message
    pub message: String,

    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Related resource ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code,
                numeric_code: code.numeric_code(),
                message: message.into(),
                details: None,
                resource_id: None,
            },
        }
    }

    /// Set additional details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    /// Set related resource ID
    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.error.resource_id = Some(id.into());
        self
    }

    /// Get the HTTP status code
    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code_str = self.error.code.to_string();
        let mut response = (status, Json(self)).into_response();

        // Add error code header for easier debugging
        if let Ok(code_value) = axum::http::HeaderValue::from_str(&code_str) {
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-error-code"),
                code_value,
            );
        }

        response
    }
}

impl From<InvoiceError> for ApiError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::MissingField { field } => {
                ApiError::new(ErrorCode::MissingRequiredField, format!("{field} not found"))
                    .with_details(serde_json::json!({ "field": field }))
            }
            InvoiceError::UnsupportedCurrency { requested, supported } => ApiError::new(
                ErrorCode::UnsupportedCurrency,
                format!("currency must be {supported}"),
            )
            .with_details(serde_json::json!({
                "requested": requested,
                "supported": supported.to_string(),
            })),
            InvoiceError::InvalidField { field, reason } => ApiError::new(
                ErrorCode::InvalidFieldValue,
                format!("invalid {field}: {reason}"),
            )
            .with_details(serde_json::json!({ "field": field })),
            InvoiceError::Timeout { operation, seconds } => ApiError::new(
                ErrorCode::Timeout,
                format!("ledger operation timed out after {seconds}s"),
            )
            .with_details(serde_json::json!({ "operation": operation })),
            // Malformed collaborator response: fail loudly, leak nothing.
            InvoiceError::MissingSalt { request_id } => {
                ApiError::new(ErrorCode::InternalError, "unexpected ledger response shape")
                    .with_resource_id(request_id.to_string())
            }
            InvoiceError::Ledger(ledger_err) => ledger_err.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::RequestNotFound(id) => {
                ApiError::new(ErrorCode::InvoiceNotFound, format!("invoice not found: {id}"))
                    .with_resource_id(id.to_string())
            }
            LedgerError::Submission(msg) => ApiError::new(
                ErrorCode::LedgerUnavailable,
                format!("request submission failed: {msg}"),
            ),
            LedgerError::Confirmation(msg) => ApiError::new(
                ErrorCode::LedgerUnavailable,
                format!("request confirmation failed: {msg}"),
            ),
            LedgerError::BalanceRefresh { request_id, message } => ApiError::new(
                ErrorCode::BalanceUnavailable,
                format!("balance refresh failed: {message}"),
            )
            .with_resource_id(request_id.to_string()),
            LedgerError::UnknownChain(chain) => ApiError::new(
                ErrorCode::InternalError,
                format!("no subgraph endpoint configured for chain: {chain}"),
            ),
        }
    }
}
