//! HTTP API server with observability for the commerce backend.
//!
//! Exposes REST endpoints for orders and payments, with structured logging
//! (tracing) and Prometheus metrics. Caller identity arrives as forwarded
//! gateway headers and is enforced on every route.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::routing::{get, post};
use common::{ForwardedIdentity, OrderId};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::clients::{
    HttpAddressDirectory, HttpCatalogClient, HttpStockLedger, InMemoryAddressDirectory,
    InMemoryCatalog, InMemoryStockLedger,
};
use orders::{InMemoryOrderStore, OrderService, OrderStatus};
use payments::orders_client::{HttpOrdersClient, OrderSummary};
use payments::{
    InMemoryPaymentStore, OrdersClient, PaymentError, PaymentGateway, PaymentService,
    SimulatedGateway,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route("/orders", get(routes::orders::list))
        .route("/orders/statistics", get(routes::orders::statistics))
        .route("/orders/{id}", get(routes::orders::get))
        .route(
            "/orders/{id}/update-status",
            post(routes::orders::update_status),
        )
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/payments", post(routes::payments::create))
        .route("/payments", get(routes::payments::list))
        .route("/payments/statistics", get(routes::payments::statistics))
        .route("/payments/{id}", get(routes::payments::get))
        .route(
            "/payments/{id}/update-status",
            post(routes::payments::update_status),
        )
        .route(
            "/payments/{id}/request-refund",
            post(routes::payments::request_refund),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Order-service adapter for single-process deployments.
///
/// Lets the payment service read orders and push status callbacks without a
/// network hop when both services share the process.
pub struct LocalOrdersClient {
    orders: Arc<OrderService>,
}

impl LocalOrdersClient {
    pub fn new(orders: Arc<OrderService>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl OrdersClient for LocalOrdersClient {
    async fn fetch_order(
        &self,
        order_id: OrderId,
        _identity: &ForwardedIdentity,
    ) -> payments::error::Result<Option<OrderSummary>> {
        let order = self
            .orders
            .find_order(order_id)
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;
        Ok(order.map(|order| OrderSummary {
            id: order.id(),
            total: order.total(),
            status: order.status().to_string(),
        }))
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: &str,
        _identity: &ForwardedIdentity,
    ) -> payments::error::Result<()> {
        let status: OrderStatus = status.parse().map_err(PaymentError::Upstream)?;
        let comment = match status {
            OrderStatus::Confirmed => "payment approved",
            OrderStatus::Cancelled => "payment refunded",
            _ => "payment status callback",
        };
        self.orders
            .update_status(order_id, status, comment.to_string(), None, None)
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;
        Ok(())
    }
}

/// In-memory collaborators kept alongside the state so tests and demos can
/// seed products, stock and addresses.
pub struct DefaultState {
    pub state: Arc<AppState>,
    pub catalog: Arc<InMemoryCatalog>,
    pub stock: Arc<InMemoryStockLedger>,
    pub addresses: Arc<InMemoryAddressDirectory>,
}

/// Creates application state backed entirely by in-memory stores and the
/// given gateway.
pub fn create_default_state(gateway: Arc<dyn PaymentGateway>) -> DefaultState {
    let catalog = Arc::new(InMemoryCatalog::new());
    let stock = Arc::new(InMemoryStockLedger::new());
    let addresses = Arc::new(InMemoryAddressDirectory::new());

    let order_service = Arc::new(OrderService::new(
        Arc::new(InMemoryOrderStore::new()),
        catalog.clone(),
        stock.clone(),
        addresses.clone(),
    ));
    let payment_service = Arc::new(PaymentService::new(
        Arc::new(InMemoryPaymentStore::new()),
        gateway,
        Arc::new(LocalOrdersClient::new(order_service.clone())),
    ));

    DefaultState {
        state: Arc::new(AppState {
            orders: order_service,
            payments: payment_service,
        }),
        catalog,
        stock,
        addresses,
    }
}

/// Creates application state from configuration.
///
/// Remote services with a configured URL get an HTTP client; the rest fall
/// back to in-memory stand-ins so the server stays runnable in isolation.
pub fn create_state_from_config(config: &Config) -> Result<Arc<AppState>, String> {
    let catalog: Arc<dyn orders::clients::CatalogClient> = match &config.products_service_url {
        Some(url) => Arc::new(HttpCatalogClient::new(url.clone()).map_err(|e| e.to_string())?),
        None => Arc::new(InMemoryCatalog::new()),
    };
    let stock: Arc<dyn orders::clients::StockLedger> = match &config.products_service_url {
        Some(url) => Arc::new(HttpStockLedger::new(url.clone()).map_err(|e| e.to_string())?),
        None => Arc::new(InMemoryStockLedger::new()),
    };
    let addresses: Arc<dyn orders::clients::AddressDirectory> = match &config.users_service_url {
        Some(url) => Arc::new(HttpAddressDirectory::new(url.clone()).map_err(|e| e.to_string())?),
        None => Arc::new(InMemoryAddressDirectory::new()),
    };

    let order_service = Arc::new(OrderService::new(
        Arc::new(InMemoryOrderStore::new()),
        catalog,
        stock,
        addresses,
    ));

    let orders_client: Arc<dyn OrdersClient> = match &config.orders_service_url {
        Some(url) => Arc::new(HttpOrdersClient::new(url.clone()).map_err(|e| e.to_string())?),
        None => Arc::new(LocalOrdersClient::new(order_service.clone())),
    };
    let payment_service = Arc::new(PaymentService::new(
        Arc::new(InMemoryPaymentStore::new()),
        Arc::new(SimulatedGateway::default()),
        orders_client,
    ));

    Ok(Arc::new(AppState {
        orders: order_service,
        payments: payment_service,
    }))
}
