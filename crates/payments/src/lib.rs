//! Payment service: aggregate, gateway integration and refund handling.

pub mod aggregate;
pub mod error;
pub mod gateway;
pub mod method;
pub mod orders_client;
pub mod processor;
pub mod service;
pub mod state;
pub mod store;

pub use aggregate::{BoletoDetails, CardDetails, Payment, PixDetails, Refund};
pub use error::PaymentError;
pub use gateway::{GatewayDecision, PaymentGateway, SimulatedGateway};
pub use method::{CardInput, PaymentMethod};
pub use orders_client::{OrderSummary, OrdersClient};
pub use processor::{PaymentMethodProcessor, processor_for};
pub use service::{NewPayment, PaymentService, PaymentStatistics};
pub use state::{PaymentStatus, RefundStatus};
pub use store::{InMemoryPaymentStore, PaymentStore};
