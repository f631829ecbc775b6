//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orders::OrderError;
use payments::PaymentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Request did not carry a valid forwarded identity.
    Unauthorized,
    /// Caller may not act on this resource.
    Forbidden,
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order domain error.
    Order(OrderError),
    /// Payment domain error.
    Payment(PaymentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, String) {
    let status = match &err {
        OrderError::InvalidTransition { .. } | OrderError::NotCancellable { .. } => {
            StatusCode::CONFLICT
        }
        OrderError::NotFound(_)
        | OrderError::ProductNotFound { .. }
        | OrderError::AddressNotFound { .. } => StatusCode::NOT_FOUND,
        OrderError::NoItems
        | OrderError::InvalidQuantity { .. }
        | OrderError::InvalidAmount { .. }
        | OrderError::OutOfStock { .. } => StatusCode::BAD_REQUEST,
        OrderError::Forbidden => StatusCode::FORBIDDEN,
        OrderError::Upstream(_) => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string())
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, String) {
    let status = match &err {
        PaymentError::InvalidTransition { .. }
        | PaymentError::DuplicatePayment(_)
        | PaymentError::NotRefundable { .. } => StatusCode::CONFLICT,
        PaymentError::NotFound(_) | PaymentError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::AmountExceeded { .. }
        | PaymentError::InvalidCardNumber
        | PaymentError::InvalidCvv
        | PaymentError::MissingCardField { .. }
        | PaymentError::InvalidInstallments { .. } => StatusCode::BAD_REQUEST,
        PaymentError::Forbidden => StatusCode::FORBIDDEN,
        PaymentError::Upstream(_) => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string())
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}
