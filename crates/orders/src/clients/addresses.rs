//! User address directory client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::ForwardedIdentity;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{OrderError, Result};

/// A saved address from the identity service.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressRecord {
    pub id: i64,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: String,
    #[serde(default)]
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

/// Read access to the identity service's saved addresses.
#[async_trait]
pub trait AddressDirectory: Send + Sync {
    /// Fetches a saved address by ID. Returns `None` when the address does
    /// not exist or does not belong to the caller.
    async fn get_address(
        &self,
        address_id: i64,
        identity: &ForwardedIdentity,
    ) -> Result<Option<AddressRecord>>;
}

/// HTTP client for the identity service's address endpoints.
pub struct HttpAddressDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAddressDirectory {
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
impl AddressDirectory for HttpAddressDirectory {
    async fn get_address(
        &self,
        address_id: i64,
        identity: &ForwardedIdentity,
    ) -> Result<Option<AddressRecord>> {
        let url = format!("{}/users/addresses/{}", self.base_url, address_id);
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
                "address lookup returned {} for address {address_id}",
                response.status()
            )));
        }

        let address = response
            .json::<AddressRecord>()
            .await
            .map_err(|e| OrderError::Upstream(e.to_string()))?;
        Ok(Some(address))
    }
}

/// In-memory address directory for tests.
#[derive(Default)]
pub struct InMemoryAddressDirectory {
    addresses: Arc<RwLock<HashMap<i64, AddressRecord>>>,
}

impl InMemoryAddressDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_address(&self, address: AddressRecord) {
        let mut addresses = self.addresses.write().await;
        addresses.insert(address.id, address);
    }
}

#[async_trait]
impl AddressDirectory for InMemoryAddressDirectory {
    async fn get_address(
        &self,
        address_id: i64,
        _identity: &ForwardedIdentity,
    ) -> Result<Option<AddressRecord>> {
        let addresses = self.addresses.read().await;
        Ok(addresses.get(&address_id).cloned())
    }
}
