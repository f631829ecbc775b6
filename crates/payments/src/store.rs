//! Payment persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, PaymentId, UserId};
use tokio::sync::RwLock;

use crate::aggregate::Payment;
use crate::error::{PaymentError, Result};

/// Storage backend for payment aggregates.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a newly created payment.
    async fn insert(&self, payment: &Payment) -> Result<()>;

    /// Persists the current state of an existing payment.
    async fn save(&self, payment: &Payment) -> Result<()>;

    /// Loads a payment by ID.
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// Finds the approved payment for an order, if any.
    async fn find_approved_for_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Lists all payments, newest first.
    async fn list(&self) -> Result<Vec<Payment>>;

    /// Lists the payments belonging to a user, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Payment>>;
}

/// In-memory payment store backed by a `HashMap`.
#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id(), payment.clone());
        Ok(())
    }

    async fn save(&self, payment: &Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        if !payments.contains_key(&payment.id()) {
            return Err(PaymentError::NotFound(payment.id()));
        }
        payments.insert(payment.id(), payment.clone());
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(&id).cloned())
    }

    async fn find_approved_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|payment| payment.order_id() == order_id && payment.is_approved())
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut all: Vec<Payment> = payments.values().cloned().collect();
        all.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(all)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut matching: Vec<Payment> = payments
            .values()
            .filter(|payment| payment.user_id() == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(matching)
    }
}
