//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, StatusChange, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OrderError;
use crate::state::OrderStatus;

/// Customer data copied onto the order at creation time.
///
/// Snapshot fields: intentionally not kept in sync with the identity
/// service after the order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Shipping address copied onto the order at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub number: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

/// A line item with the product data snapshotted at order time.
///
/// Immutable after creation, even if the catalog price changes later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: common::ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub product_image: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl OrderItem {
    /// Creates a line item, computing its subtotal from unit price and
    /// quantity.
    pub fn new(
        product_id: common::ProductId,
        product_name: impl Into<String>,
        product_sku: impl Into<String>,
        product_image: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            product_name: product_name.into(),
            product_sku: product_sku.into(),
            product_image: product_image.into(),
            quantity,
            unit_price,
            subtotal: unit_price.multiply(quantity),
        }
    }
}

/// Order aggregate root.
///
/// Owns its line items and status history exclusively. Mutated only through
/// [`Order::update_status`] and [`Order::cancel`]; items and history entries
/// are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer: CustomerInfo,
    status: OrderStatus,
    subtotal: Money,
    shipping_cost: Money,
    discount: Money,
    total: Money,
    shipping_address: ShippingAddress,
    notes: String,
    tracking_code: Option<String>,
    items: Vec<OrderItem>,
    status_history: Vec<StatusChange<OrderStatus>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

// Query methods
impl Order {
    /// Returns the order ID.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the human-facing short order number.
    pub fn order_number(&self) -> String {
        self.id.short_code()
    }

    /// Returns the customer snapshot.
    pub fn customer(&self) -> &CustomerInfo {
        &self.customer
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the line items.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the total quantity across all line items.
    pub fn items_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Returns the status history, oldest entry first.
    pub fn status_history(&self) -> &[StatusChange<OrderStatus>] {
        &self.status_history
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    /// Returns the order total (`subtotal + shipping − discount`).
    pub fn total(&self) -> Money {
        self.total
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn tracking_code(&self) -> Option<&str> {
        self.tracking_code.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    /// Returns true if the order can still be cancelled.
    pub fn can_be_cancelled(&self) -> bool {
        self.status.can_be_cancelled()
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Delivered
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }
}

// Command methods
impl Order {
    /// Places a new order.
    ///
    /// Validates quantities and the computed total, and records the
    /// synthetic `pending → pending` creation entry in the history.
    pub fn place(
        id: OrderId,
        customer: CustomerInfo,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        shipping_cost: Money,
        discount: Money,
        notes: impl Into<String>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        if let Some(item) = items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                quantity: item.quantity,
            });
        }

        let subtotal: Money = items.iter().map(|item| item.subtotal).sum();
        let total = subtotal + shipping_cost - discount;
        if !total.is_positive() {
            return Err(OrderError::InvalidAmount {
                cents: total.cents(),
            });
        }

        let now = Utc::now();
        let creator = customer.user_id;
        let mut order = Self {
            id,
            customer,
            status: OrderStatus::Pending,
            subtotal,
            shipping_cost,
            discount,
            total,
            shipping_address,
            notes: notes.into(),
            tracking_code: None,
            items,
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
        };

        order.status_history.push(StatusChange::new(
            OrderStatus::Pending,
            OrderStatus::Pending,
            "order created",
            Some(creator),
            now,
        ));

        Ok(order)
    }

    /// Transitions the order to a new status.
    ///
    /// Rejects any transition out of `cancelled`, and any transition out of
    /// `delivered` other than the same-state no-op. Milestone timestamps are
    /// set once and never overwritten. Also invoked as a callback from the
    /// payment service (approval → `confirmed`, refund → `cancelled`).
    pub fn update_status(
        &mut self,
        new_status: OrderStatus,
        comment: impl Into<String>,
        tracking_code: Option<String>,
        changed_by: Option<UserId>,
    ) -> Result<(), OrderError> {
        if self.status == OrderStatus::Cancelled {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }

        if self.status == OrderStatus::Delivered && new_status != OrderStatus::Delivered {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }

        let now = Utc::now();
        let old_status = self.status;
        self.status = new_status;

        match new_status {
            OrderStatus::Confirmed => {
                if self.confirmed_at.is_none() {
                    self.confirmed_at = Some(now);
                }
            }
            OrderStatus::Shipped => {
                if self.shipped_at.is_none() {
                    self.shipped_at = Some(now);
                    if tracking_code.is_some() {
                        self.tracking_code = tracking_code;
                    }
                }
            }
            OrderStatus::Delivered => {
                if self.delivered_at.is_none() {
                    self.delivered_at = Some(now);
                }
            }
            OrderStatus::Cancelled => {
                if self.cancelled_at.is_none() {
                    self.cancelled_at = Some(now);
                }
            }
            _ => {}
        }

        self.recompute_total();
        self.updated_at = now;
        self.status_history.push(StatusChange::new(
            old_status, new_status, comment, changed_by, now,
        ));

        Ok(())
    }

    /// Cancels the order.
    ///
    /// Only allowed while the status is `pending` or `confirmed`. The reason
    /// is carried in the history entry comment.
    pub fn cancel(
        &mut self,
        reason: impl Into<String>,
        changed_by: Option<UserId>,
    ) -> Result<(), OrderError> {
        if !self.can_be_cancelled() {
            return Err(OrderError::NotCancellable {
                status: self.status,
            });
        }

        let now = Utc::now();
        let old_status = self.status;
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.recompute_total();
        self.updated_at = now;
        self.status_history.push(StatusChange::new(
            old_status,
            OrderStatus::Cancelled,
            reason,
            changed_by,
            now,
        ));

        Ok(())
    }

    // Total is derived, never stored independently of its inputs.
    fn recompute_total(&mut self) {
        self.total = self.subtotal + self.shipping_cost - self.discount;
    }
}
