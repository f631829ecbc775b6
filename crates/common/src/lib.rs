//! Shared value objects for the commerce services.
//!
//! This crate provides the types that cross service boundaries:
//! - Typed identifiers (orders, payments, users, products)
//! - `Money` as integer cents
//! - Append-only status-history entries
//! - Caller identity propagated between services through gateway headers

pub mod history;
pub mod identity;
pub mod money;
pub mod types;

pub use history::StatusChange;
pub use identity::{ForwardedIdentity, UserContext, GATEWAY_HEADER, IDENTITY_HEADERS};
pub use money::Money;
pub use types::{OrderId, PaymentId, ProductId, UserId};
