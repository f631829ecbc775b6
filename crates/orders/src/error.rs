//! Order error types.

use common::{OrderId, ProductId};
use thiserror::Error;

use crate::state::OrderStatus;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requested status transition is not allowed.
    #[error("Invalid status transition: {from} → {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order is past the point where cancellation is allowed.
    #[error("Order in {status} status cannot be cancelled")]
    NotCancellable { status: OrderStatus },

    /// Order total below the minimum chargeable amount.
    #[error("Order total must be at least 0.01 (got {cents} cents)")]
    InvalidAmount { cents: i64 },

    /// Order has no items.
    #[error("Order must have at least one item")]
    NoItems,

    /// Item quantity below one.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// The catalog service does not know this product.
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    /// Not enough stock for one of the requested items.
    #[error("Product \"{product_name}\" does not have enough stock")]
    OutOfStock { product_name: String },

    /// The referenced address does not exist in the identity service.
    #[error("Address not found: {address_id}")]
    AddressNotFound { address_id: i64 },

    /// Order not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Caller is not allowed to act on this order.
    #[error("Access denied")]
    Forbidden,

    /// A remote call failed or timed out.
    #[error("Upstream service unavailable: {0}")]
    Upstream(String),
}

/// Convenience type alias for order results.
pub type Result<T> = std::result::Result<T, OrderError>;
