//! Product catalog client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{ForwardedIdentity, ProductId};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{OrderError, Result};

/// Product data returned by the catalog service.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub main_image_url: String,
    pub price: f64,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub is_in_stock: bool,
}

/// Read access to the product catalog service.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetches a product by ID. Returns `None` when the catalog does not
    /// know the product.
    async fn get_product(
        &self,
        product_id: ProductId,
        identity: &ForwardedIdentity,
    ) -> Result<Option<ProductInfo>>;
}

/// HTTP client for the catalog service.
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
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
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn get_product(
        &self,
        product_id: ProductId,
        identity: &ForwardedIdentity,
    ) -> Result<Option<ProductInfo>> {
        let url = format!("{}/products/{}", self.base_url, product_id);
        let mut request = self.client.get(&url);
        for (name, value) in identity.iter() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OrderError::Upstream(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(OrderError::Upstream(format!(
                "catalog returned {} for product {product_id}",
                response.status()
            )));
        }

        let product = response
            .json::<ProductInfo>()
            .await
            .map_err(|e| OrderError::Upstream(e.to_string()))?;
        Ok(Some(product))
    }
}

/// In-memory catalog for tests.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, ProductInfo>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_product(&self, product: ProductInfo) {
        let mut products = self.products.write().await;
        products.insert(product.id, product);
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn get_product(
        &self,
        product_id: ProductId,
        _identity: &ForwardedIdentity,
    ) -> Result<Option<ProductInfo>> {
        let products = self.products.read().await;
        Ok(products.get(&product_id).cloned())
    }
}
