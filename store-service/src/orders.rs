//! Order workflow: checkout, status updates and the mock payment step.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common_money::Money;
use common_security::{ensure_owner_or_admin, SecurityContext};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::metrics::StoreMetrics;
use crate::models::{Order, OrderItem, OrderStatus};
use crate::payment::PaymentGateway;
use crate::store::{LockedProduct, OrderStore};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub address: String,
    pub shipping_type: String,
}

pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentGateway>,
    metrics: StoreMetrics,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        payments: Arc<dyn PaymentGateway>,
        metrics: StoreMetrics,
    ) -> Self {
        Self {
            orders,
            payments,
            metrics,
        }
    }

    /// Converts the user's cart into a pending order.
    ///
    /// Prices are snapshotted, stock is decremented and the cart is emptied in
    /// one transaction. Any failure leaves stock, orders and the cart untouched.
    pub async fn create_order(
        &self,
        user_id: Uuid,
        req: CreateOrderRequest,
    ) -> ServiceResult<Order> {
        let address = req.address.trim().to_string();
        let shipping_type = req.shipping_type.trim().to_string();
        if address.is_empty() {
            return Err(ServiceError::validation("address is required"));
        }
        if shipping_type.is_empty() {
            return Err(ServiceError::validation("shipping_type is required"));
        }

        match self.checkout(user_id, address, shipping_type).await {
            Ok(order) => {
                self.metrics.order_created();
                info!(order_id = %order.id, %user_id, total = %order.total_amount, items = order.items.len(), "order created");
                Ok(order)
            }
            Err(err) => {
                self.metrics.checkout_failed(err.code());
                warn!(%user_id, error = %err, "checkout rejected");
                Err(err)
            }
        }
    }

    async fn checkout(
        &self,
        user_id: Uuid,
        address: String,
        shipping_type: String,
    ) -> ServiceResult<Order> {
        let mut tx = self.orders.begin_checkout().await?;

        let (cart, cart_items) = tx.cart_for_user(user_id).await?;
        if cart_items.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut product_ids: Vec<Uuid> = cart_items.iter().map(|item| item.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        let mut products: HashMap<Uuid, LockedProduct> = tx
            .lock_products(&product_ids)
            .await?
            .into_iter()
            .map(|locked| (locked.product.id, locked))
            .collect();

        let order_id = Uuid::new_v4();
        let mut items = Vec::with_capacity(cart_items.len());
        let mut total = Money::zero();

        for cart_item in &cart_items {
            let locked = products
                .get_mut(&cart_item.product_id)
                .ok_or_else(|| ServiceError::not_found("product", cart_item.product_id))?;
            if !locked.live {
                return Err(ServiceError::ProductUnavailable {
                    product: locked.product.name.clone(),
                });
            }
            let product = &mut locked.product;
            if product.stock < cart_item.quantity {
                return Err(ServiceError::InsufficientStock {
                    product: product.name.clone(),
                    requested: cart_item.quantity,
                    available: product.stock,
                });
            }

            let item = OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: product.id,
                quantity: cart_item.quantity,
                price: product.price.clone(),
            };
            total = total + item.line_total();

            product.stock -= cart_item.quantity;
            tx.set_stock(product.id, product.stock).await?;
            items.push(item);
        }

        let now = Utc::now();
        let order = Order {
            id: order_id,
            user_id,
            items,
            total_amount: total,
            status: OrderStatus::Pending,
            address,
            shipping_type,
            payment_id: None,
            payment_type: None,
            created_at: now,
            updated_at: now,
        };
        tx.insert_order(&order).await?;
        tx.clear_cart(cart.id).await?;
        tx.commit().await?;

        Ok(order)
    }

    pub async fn list_orders(&self, user_id: Uuid) -> ServiceResult<Vec<Order>> {
        Ok(self.orders.list_orders_for_user(user_id).await?)
    }

    /// Visible to the owner and to admins.
    pub async fn get_order(&self, order_id: Uuid, caller: &SecurityContext) -> ServiceResult<Order> {
        let order = self.find(order_id).await?;
        ensure_owner_or_admin(caller, order.user_id)?;
        Ok(order)
    }

    /// Overwrites the status. Any value of the closed status set is accepted.
    pub async fn update_status(&self, order_id: Uuid, status: &str) -> ServiceResult<Order> {
        let status = status
            .parse::<OrderStatus>()
            .map_err(ServiceError::Validation)?;
        if !self.orders.set_order_status(order_id, status).await? {
            return Err(ServiceError::not_found("order", order_id));
        }
        info!(%order_id, %status, "order status updated");
        self.find(order_id).await
    }

    /// Obtains a payment reference for the order total, stores it with the
    /// payment type and moves the order to `processing`.
    pub async fn process_payment(
        &self,
        order_id: Uuid,
        caller: &SecurityContext,
    ) -> ServiceResult<Order> {
        let order = self.find(order_id).await?;
        if order.user_id != caller.user_id {
            warn!(%order_id, user_id = %caller.user_id, "payment attempted by non-owner");
            return Err(ServiceError::Unauthenticated(
                "not authorized to pay for this order".into(),
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::PaymentState);
        }

        let amount_minor = order
            .total_amount
            .as_cents()
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let reference = match self.payments.create_reference(order.id, amount_minor).await {
            Ok(reference) => reference,
            Err(err) => {
                self.metrics.payment("failed");
                warn!(%order_id, error = %err, "payment reference request failed");
                return Err(ServiceError::Upstream(err.to_string()));
            }
        };

        if !self
            .orders
            .record_payment(order.id, &reference.id, &reference.method)
            .await?
        {
            self.metrics.payment("conflict");
            return Err(ServiceError::PaymentState);
        }
        self.metrics.payment("succeeded");
        info!(%order_id, payment_id = %reference.id, "order paid");
        self.find(order_id).await
    }

    async fn find(&self, order_id: Uuid) -> ServiceResult<Order> {
        self.orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order", order_id))
    }
}
