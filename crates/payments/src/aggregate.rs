//! Payment aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, StatusChange, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PaymentError, Result};
use crate::method::PaymentMethod;
use crate::state::{PaymentStatus, RefundStatus};

/// Card data kept after validation. The full number and CVV are never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub holder_name: String,
    pub last4: String,
    pub brand: String,
    pub installments: u32,
}

/// PIX charge data the customer needs to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixDetails {
    pub key: String,
    pub code: String,
}

/// Boleto data the customer needs to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoletoDetails {
    pub barcode: String,
    pub url: String,
    pub due_date: DateTime<Utc>,
}

/// A single refund against a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub amount: Money,
    pub reason: String,
    pub status: RefundStatus,
    pub gateway_refund_id: Option<String>,
    pub requested_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Payment aggregate root.
///
/// One payment pays one order in full; partial charges do not exist, but
/// partial refunds do. History and refunds are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    order_id: OrderId,
    user_id: UserId,
    method: PaymentMethod,
    status: PaymentStatus,
    amount: Money,
    card: Option<CardDetails>,
    pix: Option<PixDetails>,
    boleto: Option<BoletoDetails>,
    gateway_transaction_id: Option<String>,
    gateway_response: serde_json::Value,
    decline_reason: Option<String>,
    status_history: Vec<StatusChange<PaymentStatus>>,
    refunds: Vec<Refund>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
}

// Query methods
impl Payment {
    pub fn id(&self) -> PaymentId {
        self.id
    }

    /// Returns the human-facing short payment number.
    pub fn payment_number(&self) -> String {
        self.id.short_code()
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn card(&self) -> Option<&CardDetails> {
        self.card.as_ref()
    }

    pub fn pix(&self) -> Option<&PixDetails> {
        self.pix.as_ref()
    }

    pub fn boleto(&self) -> Option<&BoletoDetails> {
        self.boleto.as_ref()
    }

    pub fn gateway_transaction_id(&self) -> Option<&str> {
        self.gateway_transaction_id.as_deref()
    }

    pub fn gateway_response(&self) -> &serde_json::Value {
        &self.gateway_response
    }

    pub fn decline_reason(&self) -> Option<&str> {
        self.decline_reason.as_deref()
    }

    /// Returns the status history, oldest entry first.
    pub fn status_history(&self) -> &[StatusChange<PaymentStatus>] {
        &self.status_history
    }

    pub fn refunds(&self) -> &[Refund] {
        &self.refunds
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    /// Sum of completed refunds.
    pub fn refunded_amount(&self) -> Money {
        self.refunds
            .iter()
            .filter(|refund| refund.status == RefundStatus::Completed)
            .map(|refund| refund.amount)
            .sum()
    }

    /// What is left of the captured amount after completed refunds.
    pub fn remaining_refundable(&self) -> Money {
        self.amount - self.refunded_amount()
    }

    pub fn is_approved(&self) -> bool {
        self.status == PaymentStatus::Approved
    }
}

// Command methods
impl Payment {
    /// Creates a new pending payment for an order.
    ///
    /// The amount is always the order total; it is not caller-supplied.
    pub fn create(
        id: PaymentId,
        order_id: OrderId,
        user_id: UserId,
        method: PaymentMethod,
        amount: Money,
    ) -> Self {
        let now = Utc::now();
        let mut payment = Self {
            id,
            order_id,
            user_id,
            method,
            status: PaymentStatus::Pending,
            amount,
            card: None,
            pix: None,
            boleto: None,
            gateway_transaction_id: None,
            gateway_response: serde_json::Value::Null,
            decline_reason: None,
            status_history: Vec::new(),
            refunds: Vec::new(),
            created_at: now,
            updated_at: now,
            processed_at: None,
            approved_at: None,
            refunded_at: None,
        };

        payment.status_history.push(StatusChange::new(
            PaymentStatus::Pending,
            PaymentStatus::Pending,
            "payment created",
            Some(user_id),
            now,
        ));

        payment
    }

    pub fn set_card_details(&mut self, details: CardDetails) {
        self.card = Some(details);
    }

    pub fn set_pix_details(&mut self, details: PixDetails) {
        self.pix = Some(details);
    }

    pub fn set_boleto_details(&mut self, details: BoletoDetails) {
        self.boleto = Some(details);
    }

    /// Records why a payment was declined outside the gateway flow, e.g.
    /// by the back office expiring an unpaid boleto.
    pub fn set_decline_reason(&mut self, reason: impl Into<String>) {
        self.decline_reason = Some(reason.into());
    }

    /// Transitions the payment to a new status.
    ///
    /// Same-state transitions are accepted as no-ops and still recorded in
    /// the history. Milestone timestamps are set once.
    pub fn transition(
        &mut self,
        new_status: PaymentStatus,
        comment: impl Into<String>,
        changed_by: Option<UserId>,
    ) -> Result<()> {
        if self.status != new_status && !self.status.can_transition_to(new_status) {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }

        let now = Utc::now();
        let old_status = self.status;
        self.status = new_status;

        match new_status {
            PaymentStatus::Processing => {
                if self.processed_at.is_none() {
                    self.processed_at = Some(now);
                }
            }
            PaymentStatus::Approved => {
                if self.approved_at.is_none() {
                    self.approved_at = Some(now);
                }
            }
            PaymentStatus::Refunded => {
                if self.refunded_at.is_none() {
                    self.refunded_at = Some(now);
                }
            }
            _ => {}
        }

        self.updated_at = now;
        self.status_history.push(StatusChange::new(
            old_status, new_status, comment, changed_by, now,
        ));

        Ok(())
    }

    /// Records a gateway approval.
    pub fn approve(
        &mut self,
        transaction_id: String,
        response: serde_json::Value,
    ) -> Result<()> {
        self.gateway_transaction_id = Some(transaction_id);
        self.gateway_response = response;
        self.transition(PaymentStatus::Approved, "approved by gateway", None)
    }

    /// Records a gateway decline.
    pub fn decline(&mut self, reason: String, response: serde_json::Value) -> Result<()> {
        self.gateway_response = response;
        let comment = reason.clone();
        self.decline_reason = Some(reason);
        self.transition(PaymentStatus::Declined, comment, None)
    }

    /// Registers a completed refund.
    ///
    /// The refund must not exceed what is left of the captured amount. When
    /// refunds reach the full amount, the payment moves to `refunded`.
    pub fn add_refund(
        &mut self,
        amount: Money,
        reason: impl Into<String>,
        gateway_refund_id: String,
        requested_by: Option<UserId>,
    ) -> Result<Refund> {
        if !self.status.is_refundable() {
            return Err(PaymentError::NotRefundable {
                status: self.status,
            });
        }

        let remaining = self.remaining_refundable();
        if amount > remaining || !amount.is_positive() {
            return Err(PaymentError::AmountExceeded {
                requested: amount,
                remaining,
            });
        }

        let now = Utc::now();
        let reason = reason.into();
        let refund = Refund {
            id: Uuid::new_v4(),
            amount,
            reason: reason.clone(),
            status: RefundStatus::Completed,
            gateway_refund_id: Some(gateway_refund_id),
            requested_by,
            created_at: now,
            completed_at: Some(now),
        };
        self.refunds.push(refund.clone());
        self.updated_at = now;

        if self.remaining_refundable().is_zero() {
            let comment = format!("Refund processed: {reason}");
            self.transition(PaymentStatus::Refunded, comment, requested_by)?;
        }

        Ok(refund)
    }
}
