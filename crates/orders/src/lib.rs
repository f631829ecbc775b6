//! Order service: aggregate, state machine, persistence and orchestration.

pub mod aggregate;
pub mod clients;
pub mod error;
pub mod service;
pub mod state;
pub mod store;

pub use aggregate::{CustomerInfo, Order, OrderItem, ShippingAddress};
pub use error::OrderError;
pub use service::{AddressInput, NewOrder, NewOrderItem, OrderService, OrderStatistics};
pub use state::OrderStatus;
pub use store::{InMemoryOrderStore, OrderStore};
