//! Order persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, UserId};
use tokio::sync::RwLock;

use crate::aggregate::Order;
use crate::error::{OrderError, Result};

/// Storage backend for order aggregates.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a newly placed order.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Persists the current state of an existing order.
    async fn save(&self, order: &Order) -> Result<()>;

    /// Loads an order by ID.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists all orders, newest first.
    async fn list(&self) -> Result<Vec<Order>>;

    /// Lists the orders belonging to a user, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;
}

/// In-memory order store backed by a `HashMap`.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn save(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if !orders.contains_key(&order.id()) {
            return Err(OrderError::NotFound(order.id()));
        }
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut all: Vec<Order> = orders.values().cloned().collect();
        all.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(all)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| order.customer().user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(matching)
    }
}
