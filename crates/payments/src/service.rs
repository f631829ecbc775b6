//! Payment orchestration service.
//!
//! Coordinates payment creation, gateway processing and refunds. Status
//! callbacks to the order service are best-effort: the payment row is the
//! source of truth, and a lost callback leaves the order to be reconciled
//! out of band.

use std::sync::Arc;

use common::{ForwardedIdentity, Money, OrderId, PaymentId, UserContext, UserId};
use serde::Deserialize;

use crate::aggregate::Payment;
use crate::error::{PaymentError, Result};
use crate::gateway::PaymentGateway;
use crate::method::{CardInput, PaymentMethod};
use crate::orders_client::OrdersClient;
use crate::processor::processor_for;
use crate::state::PaymentStatus;
use crate::store::PaymentStore;

/// Request to create a payment.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    /// PIX key the charge is issued against; the merchant default when
    /// absent.
    #[serde(default)]
    pub pix_key: Option<String>,
    #[serde(flatten)]
    pub card: CardInput,
}

/// Aggregate figures over all payments, for the back office.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentStatistics {
    pub total_payments: usize,
    pub total_captured: Money,
    pub total_refunded: Money,
    pub payments_by_status: Vec<(PaymentStatus, usize)>,
    pub payments_by_method: Vec<(PaymentMethod, usize)>,
}

/// Orchestrates payment commands against the store, gateway and order
/// service.
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrdersClient>,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrdersClient>,
    ) -> Self {
        Self {
            store,
            gateway,
            orders,
        }
    }

    /// Creates a payment for an order and runs it through the gateway.
    ///
    /// The charged amount is always the order total. Card payments get an
    /// immediate gateway decision; PIX and boleto payments stay pending
    /// until paid out of band. An approval triggers a best-effort order
    /// confirmation callback.
    #[tracing::instrument(skip(self, user, identity, request), fields(order_id = %request.order_id))]
    pub async fn create_payment(
        &self,
        user: &UserContext,
        identity: &ForwardedIdentity,
        request: NewPayment,
    ) -> Result<Payment> {
        let order = self
            .orders
            .fetch_order(request.order_id, identity)
            .await?
            .ok_or(PaymentError::OrderNotFound(request.order_id))?;

        // Best-effort duplicate check; a concurrent approval can still slip
        // through between the check and the insert.
        if self
            .store
            .find_approved_for_order(request.order_id)
            .await?
            .is_some()
        {
            return Err(PaymentError::DuplicatePayment(request.order_id));
        }

        let mut payment = Payment::create(
            PaymentId::new(),
            request.order_id,
            user.id,
            request.method,
            order.total,
        );

        processor_for(request.method)
            .process(&mut payment, &request, self.gateway.as_ref())
            .await?;

        self.store.insert(&payment).await?;
        metrics::counter!("payments_created_total").increment(1);
        tracing::info!(
            payment_id = %payment.id(),
            method = %payment.method(),
            status = %payment.status(),
            "payment created"
        );

        if payment.is_approved() {
            metrics::counter!("payments_approved_total").increment(1);
            self.confirm_order(payment.order_id(), identity).await;
        }

        Ok(payment)
    }

    /// Loads a payment, enforcing ownership.
    #[tracing::instrument(skip(self, user))]
    pub async fn get_payment(&self, user: &UserContext, id: PaymentId) -> Result<Payment> {
        let payment = self
            .store
            .get(id)
            .await?
            .ok_or(PaymentError::NotFound(id))?;
        if !user.can_access(payment.user_id()) {
            return Err(PaymentError::Forbidden);
        }
        Ok(payment)
    }

    /// Lists payments: all of them for admins, the caller's own otherwise.
    #[tracing::instrument(skip(self, user))]
    pub async fn list_payments(&self, user: &UserContext) -> Result<Vec<Payment>> {
        if user.is_admin {
            self.store.list().await
        } else {
            self.store.list_for_user(user.id).await
        }
    }

    /// Transitions a payment's status. Admin only at the API layer; used to
    /// settle PIX and boleto payments once the money arrives, or to decline
    /// them with a reason when they never get paid.
    #[tracing::instrument(skip(self, identity))]
    pub async fn update_status(
        &self,
        id: PaymentId,
        new_status: PaymentStatus,
        comment: String,
        decline_reason: Option<String>,
        changed_by: Option<UserId>,
        identity: &ForwardedIdentity,
    ) -> Result<Payment> {
        let mut payment = self
            .store
            .get(id)
            .await?
            .ok_or(PaymentError::NotFound(id))?;

        let was_approved = payment.is_approved();
        payment.transition(new_status, comment, changed_by)?;
        if new_status == PaymentStatus::Declined {
            if let Some(reason) = decline_reason {
                payment.set_decline_reason(reason);
            }
        }
        self.store.save(&payment).await?;
        tracing::info!(payment_id = %id, status = %new_status, "payment status updated");

        if payment.is_approved() && !was_approved {
            metrics::counter!("payments_approved_total").increment(1);
            self.confirm_order(payment.order_id(), identity).await;
        }

        Ok(payment)
    }

    /// Refunds part or all of an approved payment.
    ///
    /// Omitting the amount refunds whatever is left. When refunds reach the
    /// full captured amount the payment moves to `refunded` and the order
    /// gets a best-effort cancellation callback.
    #[tracing::instrument(skip(self, user, identity))]
    pub async fn request_refund(
        &self,
        user: &UserContext,
        identity: &ForwardedIdentity,
        id: PaymentId,
        amount: Option<Money>,
        reason: String,
    ) -> Result<Payment> {
        let mut payment = self
            .store
            .get(id)
            .await?
            .ok_or(PaymentError::NotFound(id))?;
        if !user.can_access(payment.user_id()) {
            return Err(PaymentError::Forbidden);
        }
        if !payment.status().is_refundable() {
            return Err(PaymentError::NotRefundable {
                status: payment.status(),
            });
        }

        let amount = amount.unwrap_or_else(|| payment.remaining_refundable());
        let transaction_id = payment.gateway_transaction_id().unwrap_or_default().to_string();
        let gateway_refund_id = self.gateway.refund(&transaction_id, amount).await?;

        payment.add_refund(amount, reason, gateway_refund_id, Some(user.id))?;
        self.store.save(&payment).await?;
        metrics::counter!("refunds_total").increment(1);
        tracing::info!(payment_id = %id, amount = %amount, "refund completed");

        if payment.status() == PaymentStatus::Refunded {
            let order_id = payment.order_id();
            if let Err(error) = self
                .orders
                .update_status(order_id, "cancelled", identity)
                .await
            {
                metrics::counter!("order_callback_failures_total").increment(1);
                tracing::warn!(%order_id, %error, "order cancellation callback failed");
            }
        }

        Ok(payment)
    }

    /// Computes back-office statistics over all payments.
    #[tracing::instrument(skip(self))]
    pub async fn statistics(&self) -> Result<PaymentStatistics> {
        let payments = self.store.list().await?;
        let total_captured = payments
            .iter()
            .filter(|p| {
                matches!(
                    p.status(),
                    PaymentStatus::Approved | PaymentStatus::Refunded
                )
            })
            .map(|p| p.amount())
            .sum();
        let total_refunded = payments.iter().map(|p| p.refunded_amount()).sum();

        let mut payments_by_status: Vec<(PaymentStatus, usize)> = Vec::new();
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            PaymentStatus::Approved,
            PaymentStatus::Declined,
            PaymentStatus::Refunded,
            PaymentStatus::Cancelled,
        ] {
            let count = payments.iter().filter(|p| p.status() == status).count();
            payments_by_status.push((status, count));
        }

        let mut payments_by_method: Vec<(PaymentMethod, usize)> = Vec::new();
        for method in [
            PaymentMethod::CreditCard,
            PaymentMethod::DebitCard,
            PaymentMethod::Pix,
            PaymentMethod::Boleto,
        ] {
            let count = payments.iter().filter(|p| p.method() == method).count();
            payments_by_method.push((method, count));
        }

        Ok(PaymentStatistics {
            total_payments: payments.len(),
            total_captured,
            total_refunded,
            payments_by_status,
            payments_by_method,
        })
    }

    async fn confirm_order(&self, order_id: OrderId, identity: &ForwardedIdentity) {
        if let Err(error) = self
            .orders
            .update_status(order_id, "confirmed", identity)
            .await
        {
            metrics::counter!("order_callback_failures_total").increment(1);
            tracing::warn!(%order_id, %error, "order confirmation callback failed");
        }
    }
}
