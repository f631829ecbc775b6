//! Payment error types.

use common::{OrderId, PaymentId};
use thiserror::Error;

use crate::state::PaymentStatus;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The order being paid does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order already has an approved payment.
    #[error("Order {0} already has an approved payment")]
    DuplicatePayment(OrderId),

    /// The requested status transition is not allowed.
    #[error("Invalid status transition: {from} → {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Refund requested against a payment that is not approved.
    #[error("Payment in {status} status cannot be refunded")]
    NotRefundable { status: PaymentStatus },

    /// Refund amount exceeds what is left of the captured amount.
    #[error("Refund amount {requested} exceeds remaining refundable amount {remaining}")]
    AmountExceeded {
        requested: common::Money,
        remaining: common::Money,
    },

    /// Card number failed validation.
    #[error("Invalid card number")]
    InvalidCardNumber,

    /// CVV failed validation.
    #[error("Invalid CVV")]
    InvalidCvv,

    /// Card payment is missing one of its required fields.
    #[error("Missing card field: {field}")]
    MissingCardField { field: &'static str },

    /// Installment count outside the accepted range.
    #[error("Invalid installments: {installments} (must be between 1 and 12)")]
    InvalidInstallments { installments: u32 },

    /// Payment not found.
    #[error("Payment not found: {0}")]
    NotFound(PaymentId),

    /// Caller is not allowed to act on this payment.
    #[error("Access denied")]
    Forbidden,

    /// A remote call failed or timed out.
    #[error("Upstream service unavailable: {0}")]
    Upstream(String),
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;
