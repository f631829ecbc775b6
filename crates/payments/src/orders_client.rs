//! Client for the order service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{ForwardedIdentity, Money, OrderId};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};

/// The slice of an order the payment service needs.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub total: Money,
    pub status: String,
}

/// Read and callback access to the order service.
#[async_trait]
pub trait OrdersClient: Send + Sync {
    /// Fetches an order. Returns `None` when it does not exist.
    async fn fetch_order(
        &self,
        order_id: OrderId,
        identity: &ForwardedIdentity,
    ) -> Result<Option<OrderSummary>>;

    /// Pushes a status change back to the order service. Callers treat this
    /// as best-effort.
    async fn update_status(
        &self,
        order_id: OrderId,
        status: &str,
        identity: &ForwardedIdentity,
    ) -> Result<()>;
}

/// HTTP client for the order service.
pub struct HttpOrdersClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrdersClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl OrdersClient for HttpOrdersClient {
    async fn fetch_order(
        &self,
        order_id: OrderId,
        identity: &ForwardedIdentity,
    ) -> Result<Option<OrderSummary>> {
        let url = format!("{}/orders/{}", self.base_url, order_id);
        let mut request = self.client.get(&url);
        for (name, value) in identity.iter() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(PaymentError::Upstream(format!(
                "order service returned {} for order {order_id}",
                response.status()
            )));
        }

        let order = response
            .json::<OrderSummary>()
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;
        Ok(Some(order))
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: &str,
        identity: &ForwardedIdentity,
    ) -> Result<()> {
        let url = format!("{}/orders/{}/update-status", self.base_url, order_id);
        let mut request = self.client.post(&url).json(&json!({ "status": status }));
        for (name, value) in identity.iter() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::Upstream(format!(
                "status callback returned {} for order {order_id}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// In-memory order service double for tests.
#[derive(Default)]
pub struct InMemoryOrdersClient {
    state: Arc<RwLock<OrdersState>>,
}

#[derive(Default)]
struct OrdersState {
    orders: HashMap<OrderId, OrderSummary>,
    status_updates: Vec<(OrderId, String)>,
    fail_on_update: bool,
}

impl InMemoryOrdersClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_order(&self, order: OrderSummary) {
        let mut state = self.state.write().await;
        state.orders.insert(order.id, order);
    }

    pub async fn set_fail_on_update(&self, fail: bool) {
        self.state.write().await.fail_on_update = fail;
    }

    pub async fn status_updates(&self) -> Vec<(OrderId, String)> {
        self.state.read().await.status_updates.clone()
    }
}

#[async_trait]
impl OrdersClient for InMemoryOrdersClient {
    async fn fetch_order(
        &self,
        order_id: OrderId,
        _identity: &ForwardedIdentity,
    ) -> Result<Option<OrderSummary>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: &str,
        _identity: &ForwardedIdentity,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_update {
            return Err(PaymentError::Upstream("simulated callback failure".to_string()));
        }
        state.status_updates.push((order_id, status.to_string()));
        Ok(())
    }
}
