//! Order orchestration service.
//!
//! Coordinates order creation and cancellation across the catalog and
//! identity services. There is no distributed transaction: the order row is
//! the source of truth, and stock movements are best-effort compensations
//! that are logged and counted when they fail.

use std::sync::Arc;

use common::{ForwardedIdentity, Money, OrderId, ProductId, UserContext};
use serde::Deserialize;

use crate::aggregate::{CustomerInfo, Order, OrderItem, ShippingAddress};
use crate::clients::{AddressDirectory, CatalogClient, StockLedger};
use crate::error::{OrderError, Result};
use crate::state::OrderStatus;
use crate::store::OrderStore;

/// One requested line item.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A shipping address supplied inline or referenced by ID.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddressInput {
    Saved { address_id: i64 },
    Inline(ShippingAddress),
}

/// Request to place an order.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub items: Vec<NewOrderItem>,
    pub shipping_address: AddressInput,
    #[serde(default)]
    pub shipping_cost: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub phone: String,
}

/// Aggregate figures over all orders, for the back office.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderStatistics {
    pub total_orders: usize,
    pub total_revenue: Money,
    pub orders_by_status: Vec<(OrderStatus, usize)>,
}

/// Orchestrates order commands against the store and remote services.
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogClient>,
    stock: Arc<dyn StockLedger>,
    addresses: Arc<dyn AddressDirectory>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn CatalogClient>,
        stock: Arc<dyn StockLedger>,
        addresses: Arc<dyn AddressDirectory>,
    ) -> Self {
        Self {
            store,
            catalog,
            stock,
            addresses,
        }
    }

    /// Places a new order for the caller.
    ///
    /// Resolves the shipping address and snapshots every product from the
    /// catalog before persisting. Stock is reserved after the order is
    /// saved; a failed reservation does not undo the order.
    #[tracing::instrument(skip(self, user, identity, request), fields(user_id = %user.id))]
    pub async fn create_order(
        &self,
        user: &UserContext,
        identity: &ForwardedIdentity,
        request: NewOrder,
    ) -> Result<Order> {
        let shipping_address = self.resolve_address(&request, identity).await?;

        let mut items = Vec::with_capacity(request.items.len());
        for requested in &request.items {
            if requested.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    quantity: requested.quantity,
                });
            }

            let product = self
                .catalog
                .get_product(requested.product_id, identity)
                .await?
                .ok_or(OrderError::ProductNotFound {
                    product_id: requested.product_id,
                })?;

            if !product.is_in_stock || product.stock < requested.quantity {
                return Err(OrderError::OutOfStock {
                    product_name: product.name,
                });
            }

            items.push(OrderItem::new(
                product.id,
                product.name,
                product.sku,
                product.main_image_url,
                requested.quantity,
                Money::from_decimal(product.price),
            ));
        }

        let customer = CustomerInfo {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: request.phone.clone(),
        };

        let order = Order::place(
            OrderId::new(),
            customer,
            items,
            shipping_address,
            request.shipping_cost,
            request.discount,
            request.notes.clone(),
        )?;

        self.store.insert(&order).await?;
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id(), total = %order.total(), "order created");

        // Best-effort stock reservation, one call per line item.
        for item in order.items() {
            if let Err(error) = self
                .stock
                .reserve(item.product_id, item.quantity, identity)
                .await
            {
                metrics::counter!("stock_compensation_failures_total").increment(1);
                tracing::warn!(
                    order_id = %order.id(),
                    product_id = %item.product_id,
                    %error,
                    "stock reservation failed"
                );
            }
        }

        Ok(order)
    }

    /// Loads an order, enforcing ownership.
    #[tracing::instrument(skip(self, user))]
    pub async fn get_order(&self, user: &UserContext, id: OrderId) -> Result<Order> {
        let order = self.store.get(id).await?.ok_or(OrderError::NotFound(id))?;
        if !user.can_access(order.customer().user_id) {
            return Err(OrderError::Forbidden);
        }
        Ok(order)
    }

    /// Loads an order without ownership checks. For service-internal use
    /// only; never expose this on an authenticated route.
    pub async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        self.store.get(id).await
    }

    /// Lists orders: all of them for admins, the caller's own otherwise.
    #[tracing::instrument(skip(self, user))]
    pub async fn list_orders(&self, user: &UserContext) -> Result<Vec<Order>> {
        if user.is_admin {
            self.store.list().await
        } else {
            self.store.list_for_user(user.id).await
        }
    }

    /// Transitions an order's status. Admin only at the API layer; also the
    /// entry point for payment-service callbacks.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        new_status: OrderStatus,
        comment: String,
        tracking_code: Option<String>,
        changed_by: Option<common::UserId>,
    ) -> Result<Order> {
        let mut order = self.store.get(id).await?.ok_or(OrderError::NotFound(id))?;
        order.update_status(new_status, comment, tracking_code, changed_by)?;
        self.store.save(&order).await?;
        tracing::info!(order_id = %id, status = %new_status, "order status updated");
        Ok(order)
    }

    /// Cancels an order and releases its reserved stock.
    ///
    /// Stock release is best-effort, one call per line item, exactly once.
    #[tracing::instrument(skip(self, user, identity))]
    pub async fn cancel_order(
        &self,
        user: &UserContext,
        identity: &ForwardedIdentity,
        id: OrderId,
        reason: String,
    ) -> Result<Order> {
        let mut order = self.store.get(id).await?.ok_or(OrderError::NotFound(id))?;
        if !user.can_access(order.customer().user_id) {
            return Err(OrderError::Forbidden);
        }

        order.cancel(reason, Some(user.id))?;
        self.store.save(&order).await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %id, "order cancelled");

        for item in order.items() {
            if let Err(error) = self
                .stock
                .release(item.product_id, item.quantity, identity)
                .await
            {
                metrics::counter!("stock_compensation_failures_total").increment(1);
                tracing::warn!(
                    order_id = %id,
                    product_id = %item.product_id,
                    %error,
                    "stock release failed"
                );
            }
        }

        Ok(order)
    }

    /// Computes back-office statistics over all orders.
    ///
    /// Revenue counts only paid orders; pending (unpaid) and cancelled
    /// orders are excluded.
    #[tracing::instrument(skip(self))]
    pub async fn statistics(&self) -> Result<OrderStatistics> {
        let orders = self.store.list().await?;
        let total_revenue = orders
            .iter()
            .filter(|order| {
                matches!(
                    order.status(),
                    OrderStatus::Confirmed
                        | OrderStatus::Processing
                        | OrderStatus::Shipped
                        | OrderStatus::Delivered
                )
            })
            .map(|order| order.total())
            .sum();

        let mut orders_by_status: Vec<(OrderStatus, usize)> = Vec::new();
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let count = orders.iter().filter(|o| o.status() == status).count();
            orders_by_status.push((status, count));
        }

        Ok(OrderStatistics {
            total_orders: orders.len(),
            total_revenue,
            orders_by_status,
        })
    }

    async fn resolve_address(
        &self,
        request: &NewOrder,
        identity: &ForwardedIdentity,
    ) -> Result<ShippingAddress> {
        match &request.shipping_address {
            AddressInput::Inline(address) => Ok(address.clone()),
            AddressInput::Saved { address_id } => {
                let record = self
                    .addresses
                    .get_address(*address_id, identity)
                    .await?
                    .ok_or(OrderError::AddressNotFound {
                        address_id: *address_id,
                    })?;
                Ok(ShippingAddress {
                    street: record.street,
                    number: record.number,
                    complement: record.complement,
                    neighborhood: record.neighborhood,
                    city: record.city,
                    state: record.state,
                    zip_code: record.zip_code,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{
        AddressRecord, InMemoryAddressDirectory, InMemoryCatalog, InMemoryStockLedger, ProductInfo,
    };
    use crate::store::InMemoryOrderStore;
    use common::{UserId, GATEWAY_HEADER};

    struct Fixture {
        service: OrderService,
        stock: Arc<InMemoryStockLedger>,
        catalog: Arc<InMemoryCatalog>,
        addresses: Arc<InMemoryAddressDirectory>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryOrderStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let stock = Arc::new(InMemoryStockLedger::new());
        let addresses = Arc::new(InMemoryAddressDirectory::new());
        let service = OrderService::new(
            store,
            catalog.clone(),
            stock.clone(),
            addresses.clone(),
        );
        Fixture {
            service,
            stock,
            catalog,
            addresses,
        }
    }

    fn identity() -> ForwardedIdentity {
        ForwardedIdentity::from_pairs(vec![
            (GATEWAY_HEADER.to_string(), "true".to_string()),
            ("X-User-ID".to_string(), "1".to_string()),
            ("X-User-Nome".to_string(), "Maria Silva".to_string()),
            ("X-User-Email".to_string(), "maria@example.com".to_string()),
        ])
    }

    fn user() -> UserContext {
        UserContext::from_identity(&identity()).unwrap()
    }

    fn admin() -> UserContext {
        let mut user = user();
        user.id = UserId::new(999);
        user.is_admin = true;
        user
    }

    fn inline_address() -> AddressInput {
        AddressInput::Inline(ShippingAddress {
            street: "Rua das Flores".to_string(),
            number: "100".to_string(),
            complement: String::new(),
            neighborhood: "Centro".to_string(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
            zip_code: "01000000".to_string(),
        })
    }

    async fn add_product(fixture: &Fixture, id: i64, price: f64, stock: u32) {
        fixture
            .catalog
            .add_product(ProductInfo {
                id: ProductId::new(id),
                name: format!("Product {id}"),
                sku: format!("SKU-{id:03}"),
                main_image_url: String::new(),
                price,
                stock,
                is_in_stock: stock > 0,
            })
            .await;
    }

    fn new_order(items: Vec<NewOrderItem>) -> NewOrder {
        NewOrder {
            items,
            shipping_address: inline_address(),
            shipping_cost: Money::from_cents(500),
            discount: Money::zero(),
            notes: String::new(),
            phone: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_order_snapshots_products_and_reserves_stock() {
        let fixture = fixture();
        add_product(&fixture, 1, 10.0, 5).await;

        let order = fixture
            .service
            .create_order(
                &user(),
                &identity(),
                new_order(vec![NewOrderItem {
                    product_id: ProductId::new(1),
                    quantity: 2,
                }]),
            )
            .await
            .unwrap();

        assert_eq!(order.subtotal().cents(), 2000);
        assert_eq!(order.total().cents(), 2500);
        assert_eq!(order.items()[0].product_sku, "SKU-001");

        let reservations = fixture.stock.reservations().await;
        assert_eq!(reservations, vec![(ProductId::new(1), 2)]);
    }

    #[tokio::test]
    async fn test_create_order_unknown_product_fails() {
        let fixture = fixture();
        let result = fixture
            .service
            .create_order(
                &user(),
                &identity(),
                new_order(vec![NewOrderItem {
                    product_id: ProductId::new(42),
                    quantity: 1,
                }]),
            )
            .await;
        assert!(matches!(result, Err(OrderError::ProductNotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_order_out_of_stock_fails() {
        let fixture = fixture();
        add_product(&fixture, 1, 10.0, 1).await;

        let result = fixture
            .service
            .create_order(
                &user(),
                &identity(),
                new_order(vec![NewOrderItem {
                    product_id: ProductId::new(1),
                    quantity: 3,
                }]),
            )
            .await;
        assert!(matches!(result, Err(OrderError::OutOfStock { .. })));
        assert!(fixture.stock.reservations().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_order_survives_reservation_failure() {
        let fixture = fixture();
        add_product(&fixture, 1, 10.0, 5).await;
        fixture.stock.set_fail_on_reserve(true).await;

        let order = fixture
            .service
            .create_order(
                &user(),
                &identity(),
                new_order(vec![NewOrderItem {
                    product_id: ProductId::new(1),
                    quantity: 1,
                }]),
            )
            .await
            .unwrap();

        // Order exists even though stock never moved.
        let loaded = fixture.service.get_order(&user(), order.id()).await.unwrap();
        assert_eq!(loaded.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_order_with_saved_address() {
        let fixture = fixture();
        add_product(&fixture, 1, 10.0, 5).await;
        fixture
            .addresses
            .add_address(AddressRecord {
                id: 7,
                street: "Avenida Paulista".to_string(),
                number: "1000".to_string(),
                complement: String::new(),
                neighborhood: "Bela Vista".to_string(),
                city: "São Paulo".to_string(),
                state: "SP".to_string(),
                zip_code: "01310100".to_string(),
            })
            .await;

        let mut request = new_order(vec![NewOrderItem {
            product_id: ProductId::new(1),
            quantity: 1,
        }]);
        request.shipping_address = AddressInput::Saved { address_id: 7 };

        let order = fixture
            .service
            .create_order(&user(), &identity(), request)
            .await
            .unwrap();
        assert_eq!(order.shipping_address().street, "Avenida Paulista");
    }

    #[tokio::test]
    async fn test_create_order_missing_saved_address_fails() {
        let fixture = fixture();
        add_product(&fixture, 1, 10.0, 5).await;

        let mut request = new_order(vec![NewOrderItem {
            product_id: ProductId::new(1),
            quantity: 1,
        }]);
        request.shipping_address = AddressInput::Saved { address_id: 99 };

        let result = fixture
            .service
            .create_order(&user(), &identity(), request)
            .await;
        assert!(matches!(
            result,
            Err(OrderError::AddressNotFound { address_id: 99 })
        ));
    }

    #[tokio::test]
    async fn test_get_order_enforces_ownership() {
        let fixture = fixture();
        add_product(&fixture, 1, 10.0, 5).await;
        let order = fixture
            .service
            .create_order(
                &user(),
                &identity(),
                new_order(vec![NewOrderItem {
                    product_id: ProductId::new(1),
                    quantity: 1,
                }]),
            )
            .await
            .unwrap();

        let mut stranger = user();
        stranger.id = UserId::new(2);
        let result = fixture.service.get_order(&stranger, order.id()).await;
        assert!(matches!(result, Err(OrderError::Forbidden)));

        // Admins can read any order.
        fixture.service.get_order(&admin(), order.id()).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_order_releases_stock_once_per_item() {
        let fixture = fixture();
        add_product(&fixture, 1, 10.0, 5).await;
        add_product(&fixture, 2, 7.5, 5).await;

        let order = fixture
            .service
            .create_order(
                &user(),
                &identity(),
                new_order(vec![
                    NewOrderItem {
                        product_id: ProductId::new(1),
                        quantity: 2,
                    },
                    NewOrderItem {
                        product_id: ProductId::new(2),
                        quantity: 1,
                    },
                ]),
            )
            .await
            .unwrap();

        let cancelled = fixture
            .service
            .cancel_order(&user(), &identity(), order.id(), "changed my mind".to_string())
            .await
            .unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);

        let releases = fixture.stock.releases().await;
        assert_eq!(
            releases,
            vec![(ProductId::new(1), 2), (ProductId::new(2), 1)]
        );
    }

    #[tokio::test]
    async fn test_cancel_shipped_order_fails() {
        let fixture = fixture();
        add_product(&fixture, 1, 10.0, 5).await;
        let order = fixture
            .service
            .create_order(
                &user(),
                &identity(),
                new_order(vec![NewOrderItem {
                    product_id: ProductId::new(1),
                    quantity: 1,
                }]),
            )
            .await
            .unwrap();

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ] {
            fixture
                .service
                .update_status(order.id(), status, String::new(), None, None)
                .await
                .unwrap();
        }

        let result = fixture
            .service
            .cancel_order(&user(), &identity(), order.id(), "too late".to_string())
            .await;
        assert!(matches!(result, Err(OrderError::NotCancellable { .. })));
        assert!(fixture.stock.releases().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_scoped_to_caller() {
        let fixture = fixture();
        add_product(&fixture, 1, 10.0, 50).await;
        let request = || {
            new_order(vec![NewOrderItem {
                product_id: ProductId::new(1),
                quantity: 1,
            }])
        };

        fixture
            .service
            .create_order(&user(), &identity(), request())
            .await
            .unwrap();
        let mut other = user();
        other.id = UserId::new(2);
        fixture
            .service
            .create_order(&other, &identity(), request())
            .await
            .unwrap();

        assert_eq!(fixture.service.list_orders(&user()).await.unwrap().len(), 1);
        assert_eq!(fixture.service.list_orders(&admin()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_statistics_revenue_counts_only_paid_orders() {
        let fixture = fixture();
        add_product(&fixture, 1, 10.0, 50).await;
        let request = || {
            new_order(vec![NewOrderItem {
                product_id: ProductId::new(1),
                quantity: 1,
            }])
        };

        let paid = fixture
            .service
            .create_order(&user(), &identity(), request())
            .await
            .unwrap();
        fixture
            .service
            .update_status(paid.id(), OrderStatus::Confirmed, String::new(), None, None)
            .await
            .unwrap();
        // Unpaid order: exists but earns nothing.
        fixture
            .service
            .create_order(&user(), &identity(), request())
            .await
            .unwrap();
        let dropped = fixture
            .service
            .create_order(&user(), &identity(), request())
            .await
            .unwrap();
        fixture
            .service
            .cancel_order(&user(), &identity(), dropped.id(), "no".to_string())
            .await
            .unwrap();

        let stats = fixture.service.statistics().await.unwrap();
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.total_revenue, paid.total());
    }
}
