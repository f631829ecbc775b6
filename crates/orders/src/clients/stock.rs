//! Stock reservation client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{ForwardedIdentity, ProductId};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{OrderError, Result};

#[derive(Debug, Serialize)]
struct StockUpdateRequest {
    quantity: u32,
    operation: &'static str,
}

/// Stock movements against the catalog service.
///
/// Both operations are best-effort from the caller's perspective; a failed
/// reserve or release leaves catalog stock out of sync and is reconciled
/// manually.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Removes `quantity` units of a product from catalog stock.
    async fn reserve(
        &self,
        product_id: ProductId,
        quantity: u32,
        identity: &ForwardedIdentity,
    ) -> Result<()>;

    /// Returns `quantity` units of a product to catalog stock.
    async fn release(
        &self,
        product_id: ProductId,
        quantity: u32,
        identity: &ForwardedIdentity,
    ) -> Result<()>;
}

/// HTTP stock client against the catalog service.
pub struct HttpStockLedger {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStockLedger {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| OrderError::Upstream(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn update_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
        operation: &'static str,
        identity: &ForwardedIdentity,
    ) -> Result<()> {
        let url = format!("{}/products/{}/update-stock", self.base_url, product_id);
        let mut request = self
            .client
            .post(&url)
            .json(&StockUpdateRequest { quantity, operation });
        for (name, value) in identity.iter() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OrderError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OrderError::Upstream(format!(
                "stock {operation} returned {} for product {product_id}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StockLedger for HttpStockLedger {
    async fn reserve(
        &self,
        product_id: ProductId,
        quantity: u32,
        identity: &ForwardedIdentity,
    ) -> Result<()> {
        self.update_stock(product_id, quantity, "remove", identity)
            .await
    }

    async fn release(
        &self,
        product_id: ProductId,
        quantity: u32,
        identity: &ForwardedIdentity,
    ) -> Result<()> {
        self.update_stock(product_id, quantity, "add", identity)
            .await
    }
}

/// In-memory stock ledger for tests, recording every movement.
#[derive(Default)]
pub struct InMemoryStockLedger {
    state: Arc<RwLock<LedgerState>>,
}

#[derive(Default)]
struct LedgerState {
    reservations: Vec<(ProductId, u32)>,
    releases: Vec<(ProductId, u32)>,
    fail_on_reserve: bool,
    fail_on_release: bool,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_reserve(&self, fail: bool) {
        self.state.write().await.fail_on_reserve = fail;
    }

    pub async fn set_fail_on_release(&self, fail: bool) {
        self.state.write().await.fail_on_release = fail;
    }

    pub async fn reservations(&self) -> Vec<(ProductId, u32)> {
        self.state.read().await.reservations.clone()
    }

    pub async fn releases(&self) -> Vec<(ProductId, u32)> {
        self.state.read().await.releases.clone()
    }
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn reserve(
        &self,
        product_id: ProductId,
        quantity: u32,
        _identity: &ForwardedIdentity,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_reserve {
            return Err(OrderError::Upstream("simulated reserve failure".to_string()));
        }
        state.reservations.push((product_id, quantity));
        Ok(())
    }

    async fn release(
        &self,
        product_id: ProductId,
        quantity: u32,
        _identity: &ForwardedIdentity,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_release {
            return Err(OrderError::Upstream("simulated release failure".to_string()));
        }
        state.releases.push((product_id, quantity));
        Ok(())
    }
}
