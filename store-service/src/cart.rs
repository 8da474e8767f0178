use std::sync::Arc;

use common_money::Money;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{CartLine, Product};
use crate::store::{CartStore, CatalogStore};

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
    /// Absent for lines whose product has left the catalog.
    pub subtotal: Option<Money>,
    pub available: bool,
}

/// Cart as shown to its owner, priced at current catalog prices.
/// Unavailable lines are listed so they can be removed, but do not count
/// toward the total.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub items: Vec<CartLineView>,
    pub total: Money,
}

impl CartView {
    fn from_lines(cart_id: Uuid, lines: Vec<CartLine>) -> Self {
        let items: Vec<CartLineView> = lines
            .into_iter()
            .map(|line| CartLineView {
                id: line.item.id,
                subtotal: line
                    .available
                    .then(|| line.product.price.times(line.item.quantity)),
                quantity: line.item.quantity,
                available: line.available,
                product: line.product,
            })
            .collect();
        let total: Money = items.iter().filter_map(|line| line.subtotal.as_ref()).sum();
        Self {
            id: cart_id,
            items,
            total,
        }
    }
}

pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { carts, catalog }
    }

    pub async fn view(&self, user_id: Uuid) -> ServiceResult<CartView> {
        let cart = self.carts.get_or_create_cart(user_id).await?;
        self.render(cart.id).await
    }

    /// Adds `quantity` units, merging with an existing line for the same product.
    /// Stock is checked against the requested quantity before the cart changes.
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> ServiceResult<CartView> {
        positive_quantity(quantity)?;
        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("product", product_id))?;
        if product.stock < quantity {
            return Err(ServiceError::InsufficientStock {
                product: product.name,
                requested: quantity,
                available: product.stock,
            });
        }

        let cart = self.carts.get_or_create_cart(user_id).await?;
        let held = self
            .carts
            .cart_lines(cart.id)
            .await?
            .into_iter()
            .find(|line| line.item.product_id == product_id)
            .map_or(0, |line| line.item.quantity);
        if held.checked_add(quantity).is_none() {
            return Err(ServiceError::validation("quantity is too large"));
        }
        let item = self.carts.add_cart_item(cart.id, product_id, quantity).await?;
        debug!(%user_id, item_id = %item.id, quantity = item.quantity, "cart item added");
        self.render(cart.id).await
    }

    /// Sets the quantity of one of the caller's cart items. Stock is not re-checked.
    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> ServiceResult<CartView> {
        positive_quantity(quantity)?;
        let cart = self.carts.get_or_create_cart(user_id).await?;
        self.carts
            .find_cart_item(cart.id, item_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("cart item", item_id))?;
        self.carts.set_cart_item_quantity(item_id, quantity).await?;
        self.render(cart.id).await
    }

    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> ServiceResult<CartView> {
        let cart = self.carts.get_or_create_cart(user_id).await?;
        self.carts
            .find_cart_item(cart.id, item_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("cart item", item_id))?;
        self.carts.remove_cart_item(item_id).await?;
        self.render(cart.id).await
    }

    pub async fn clear(&self, user_id: Uuid) -> ServiceResult<CartView> {
        let cart = self.carts.get_or_create_cart(user_id).await?;
        let cleared = self.carts.clear_cart(cart.id).await?;
        debug!(%user_id, cleared, "cart cleared");
        self.render(cart.id).await
    }

    async fn render(&self, cart_id: Uuid) -> ServiceResult<CartView> {
        let lines = self.carts.cart_lines(cart_id).await?;
        Ok(CartView::from_lines(cart_id, lines))
    }
}

fn positive_quantity(quantity: i32) -> ServiceResult<()> {
    if quantity <= 0 {
        return Err(ServiceError::validation("quantity must be greater than zero"));
    }
    Ok(())
}
