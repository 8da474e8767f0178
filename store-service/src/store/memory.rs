use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_auth::Role;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    CartStore, CatalogStore, CheckoutTx, LockedProduct, Maintenance, OrderStore, PurgeReport,
    StoreError, StoreResult, UserStore,
};
use crate::models::{Cart, CartItem, CartLine, Order, OrderStatus, Product, ProductFilter, User};

#[derive(Debug, Clone)]
struct Tracked<T> {
    value: T,
    deleted_at: Option<DateTime<Utc>>,
}

impl<T> Tracked<T> {
    fn live(value: T) -> Self {
        Self { value, deleted_at: None }
    }

    fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, Tracked<User>>,
    products: HashMap<Uuid, Tracked<Product>>,
    carts: HashMap<Uuid, Tracked<Cart>>,
    /// Insertion order doubles as the cart's stored item order.
    cart_items: Vec<Tracked<CartItem>>,
    orders: HashMap<Uuid, Tracked<Order>>,
}

impl MemoryState {
    fn live_user_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .values()
            .filter(|u| u.is_live())
            .map(|u| &u.value)
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn live_product(&self, id: Uuid) -> Option<&Product> {
        self.products.get(&id).filter(|p| p.is_live()).map(|p| &p.value)
    }

    fn cart_for(&mut self, user_id: Uuid) -> Cart {
        if let Some(cart) = self
            .carts
            .values()
            .find(|c| c.is_live() && c.value.user_id == user_id)
        {
            return cart.value.clone();
        }
        let cart = Cart {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
        };
        self.carts.insert(cart.id, Tracked::live(cart.clone()));
        cart
    }

    fn live_items(&self, cart_id: Uuid) -> impl Iterator<Item = &CartItem> {
        self.cart_items
            .iter()
            .filter(move |i| i.is_live() && i.value.cart_id == cart_id)
            .map(|i| &i.value)
    }

    fn clear_cart(&mut self, cart_id: Uuid) -> u64 {
        let now = Utc::now();
        let mut cleared = 0;
        for item in self
            .cart_items
            .iter_mut()
            .filter(|i| i.is_live() && i.value.cart_id == cart_id)
        {
            item.deleted_at = Some(now);
            cleared += 1;
        }
        cleared
    }
}

/// In-process store. Checkouts take the state lock for their whole duration
/// and publish a modified copy on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.live_user_by_email(&user.email).is_some() {
            return Err(StoreError::UniqueViolation("users_email_live_idx".into()));
        }
        state.users.insert(user.id, Tracked::live(user.clone()));
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .get(&id)
            .filter(|u| u.is_live())
            .map(|u| u.value.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.live_user_by_email(email).cloned())
    }

    async fn update_user(&self, user: &User) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.users.get_mut(&user.id).filter(|u| u.is_live()) {
            Some(row) => {
                row.value = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.users.get_mut(&id).filter(|u| u.is_live()) {
            Some(row) => {
                row.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state
            .products
            .insert(product.id, Tracked::live(product.clone()));
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.live_product(id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.is_live() && filter.matches(&p.value))
            .map(|p| p.value.clone())
            .collect();
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn update_product(&self, product: &Product) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.products.get_mut(&product.id).filter(|p| p.is_live()) {
            Some(row) => {
                row.value = product.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.products.get_mut(&id).filter(|p| p.is_live()) {
            Some(row) => {
                row.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get_or_create_cart(&self, user_id: Uuid) -> StoreResult<Cart> {
        let mut state = self.state.lock().await;
        Ok(state.cart_for(user_id))
    }

    async fn cart_lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLine>> {
        let state = self.state.lock().await;
        let lines = state
            .live_items(cart_id)
            .filter_map(|item| {
                state.products.get(&item.product_id).map(|product| CartLine {
                    item: item.clone(),
                    product: product.value.clone(),
                    available: product.is_live(),
                })
            })
            .collect();
        Ok(lines)
    }

    async fn add_cart_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartItem> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .cart_items
            .iter_mut()
            .find(|i| i.is_live() && i.value.cart_id == cart_id && i.value.product_id == product_id)
        {
            existing.value.quantity = existing
                .value
                .quantity
                .checked_add(quantity)
                .ok_or(StoreError::QuantityOverflow(existing.value.id))?;
            return Ok(existing.value.clone());
        }
        let item = CartItem {
            id: Uuid::new_v4(),
            cart_id,
            product_id,
            quantity,
        };
        state.cart_items.push(Tracked::live(item.clone()));
        Ok(item)
    }

    async fn find_cart_item(&self, cart_id: Uuid, item_id: Uuid) -> StoreResult<Option<CartItem>> {
        let state = self.state.lock().await;
        let item = state.live_items(cart_id).find(|i| i.id == item_id).cloned();
        Ok(item)
    }

    async fn set_cart_item_quantity(&self, item_id: Uuid, quantity: i32) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .cart_items
            .iter_mut()
            .find(|i| i.is_live() && i.value.id == item_id)
        {
            Some(item) => {
                item.value.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_cart_item(&self, item_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .cart_items
            .iter_mut()
            .find(|i| i.is_live() && i.value.id == item_id)
        {
            Some(item) => {
                item.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_cart(&self, cart_id: Uuid) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        Ok(state.clear_cart(cart_id))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn begin_checkout(&self) -> StoreResult<Box<dyn CheckoutTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryCheckout { guard, working }))
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .get(&id)
            .filter(|o| o.is_live())
            .map(|o| o.value.clone()))
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.is_live() && o.value.user_id == user_id)
            .map(|o| o.value.clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(&id).filter(|o| o.is_live()) {
            Some(row) => {
                row.value.status = status;
                row.value.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_payment(
        &self,
        id: Uuid,
        payment_id: &str,
        payment_type: &str,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .orders
            .get_mut(&id)
            .filter(|o| o.is_live() && o.value.status == OrderStatus::Pending)
        {
            Some(row) => {
                row.value.payment_id = Some(payment_id.to_string());
                row.value.payment_type = Some(payment_type.to_string());
                row.value.status = OrderStatus::Processing;
                row.value.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

struct MemoryCheckout {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl CheckoutTx for MemoryCheckout {
    async fn cart_for_user(&mut self, user_id: Uuid) -> StoreResult<(Cart, Vec<CartItem>)> {
        let cart = self.working.cart_for(user_id);
        let items: Vec<CartItem> = self.working.live_items(cart.id).cloned().collect();
        Ok((cart, items))
    }

    async fn lock_products(&mut self, ids: &[Uuid]) -> StoreResult<Vec<LockedProduct>> {
        let products = ids
            .iter()
            .filter_map(|id| self.working.products.get(id))
            .map(|row| LockedProduct {
                product: row.value.clone(),
                live: row.is_live(),
            })
            .collect();
        Ok(products)
    }

    async fn set_stock(&mut self, product_id: Uuid, stock: i32) -> StoreResult<()> {
        if let Some(row) = self.working.products.get_mut(&product_id) {
            row.value.stock = stock;
            row.value.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        self.working
            .orders
            .insert(order.id, Tracked::live(order.clone()));
        Ok(())
    }

    async fn clear_cart(&mut self, cart_id: Uuid) -> StoreResult<()> {
        self.working.clear_cart(cart_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryCheckout { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl Maintenance for MemoryStore {
    async fn promote_to_admin(&self, email: &str) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let id = match state.live_user_by_email(email) {
            Some(user) => user.id,
            None => return Ok(false),
        };
        if let Some(row) = state.users.get_mut(&id) {
            row.value.role = Role::Admin;
            row.value.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn purge_deleted(&self, before: DateTime<Utc>, dry_run: bool) -> StoreResult<PurgeReport> {
        let mut guard = self.state.lock().await;
        let mut state = guard.clone();
        let expired = |deleted_at: Option<DateTime<Utc>>| deleted_at.map_or(false, |at| at < before);

        let users: Vec<Uuid> = state
            .users
            .values()
            .filter(|u| expired(u.deleted_at))
            .map(|u| u.value.id)
            .filter(|id| !state.orders.values().any(|o| o.value.user_id == *id))
            .collect();
        let carts: Vec<Uuid> = state
            .carts
            .values()
            .filter(|c| expired(c.deleted_at) || users.contains(&c.value.user_id))
            .map(|c| c.value.id)
            .collect();

        let items_before = state.cart_items.len();
        state
            .cart_items
            .retain(|i| !expired(i.deleted_at) && !carts.contains(&i.value.cart_id));
        let cart_items = (items_before - state.cart_items.len()) as u64;

        let products: Vec<Uuid> = state
            .products
            .values()
            .filter(|p| expired(p.deleted_at))
            .map(|p| p.value.id)
            .filter(|id| {
                !state
                    .orders
                    .values()
                    .any(|o| o.value.items.iter().any(|i| i.product_id == *id))
                    && !state.cart_items.iter().any(|i| i.value.product_id == *id)
            })
            .collect();

        for id in &products {
            state.products.remove(id);
        }
        for id in &carts {
            state.carts.remove(id);
        }
        for id in &users {
            state.users.remove(id);
        }

        let report = PurgeReport {
            cart_items,
            products: products.len() as u64,
            carts: carts.len() as u64,
            users: users.len() as u64,
        };
        if !dry_run {
            *guard = state;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common_money::Money;

    fn user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Memo".into(),
            email: email.into(),
            password_hash: "x".into(),
            phone: "1".into(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    fn product(stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            name: "Widget".into(),
            description: String::new(),
            price: Money::from_cents(100),
            category: "misc".into(),
            brand: String::new(),
            image_url: String::new(),
            stock,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn dropped_checkout_discards_writes() {
        let store = MemoryStore::new();
        let widget = product(3);
        store.insert_product(&widget).await.unwrap();

        let mut tx = store.begin_checkout().await.unwrap();
        tx.set_stock(widget.id, 0).await.unwrap();
        drop(tx);

        assert_eq!(store.find_product(widget.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn concurrent_first_access_creates_one_cart() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        let (a, b) = tokio::join!(store.get_or_create_cart(owner), store.get_or_create_cart(owner));
        assert_eq!(a.unwrap().id, b.unwrap().id);
    }

    #[tokio::test]
    async fn merged_quantity_never_wraps() {
        let store = MemoryStore::new();
        let widget = product(i32::MAX);
        store.insert_product(&widget).await.unwrap();
        let cart = store.get_or_create_cart(Uuid::new_v4()).await.unwrap();

        let item = store.add_cart_item(cart.id, widget.id, i32::MAX).await.unwrap();
        assert!(matches!(
            store.add_cart_item(cart.id, widget.id, 1).await,
            Err(StoreError::QuantityOverflow(id)) if id == item.id
        ));
        let lines = store.cart_lines(cart.id).await.unwrap();
        assert_eq!(lines[0].item.quantity, i32::MAX);
    }

    #[tokio::test]
    async fn soft_deleted_products_stay_in_cart_lines() {
        let store = MemoryStore::new();
        let widget = product(2);
        store.insert_product(&widget).await.unwrap();
        let cart = store.get_or_create_cart(Uuid::new_v4()).await.unwrap();
        store.add_cart_item(cart.id, widget.id, 1).await.unwrap();
        store.soft_delete_product(widget.id).await.unwrap();

        let lines = store.cart_lines(cart.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].available);

        let mut tx = store.begin_checkout().await.unwrap();
        let locked = tx.lock_products(&[widget.id]).await.unwrap();
        assert_eq!(locked.len(), 1);
        assert!(!locked[0].live);
    }

    #[tokio::test]
    async fn emails_are_unique_among_live_users() {
        let store = MemoryStore::new();
        let first = user("a@b.io");
        store.insert_user(&first).await.unwrap();
        assert!(matches!(
            store.insert_user(&user("A@B.io")).await,
            Err(StoreError::UniqueViolation(_))
        ));

        store.soft_delete_user(first.id).await.unwrap();
        store.insert_user(&user("a@b.io")).await.unwrap();
    }

    #[tokio::test]
    async fn promote_and_purge() {
        let store = MemoryStore::new();
        let account = user("ops@b.io");
        store.insert_user(&account).await.unwrap();
        assert!(store.promote_to_admin("OPS@b.io").await.unwrap());
        assert_eq!(store.find_user(account.id).await.unwrap().unwrap().role, Role::Admin);
        assert!(!store.promote_to_admin("nobody@b.io").await.unwrap());

        let widget = product(1);
        store.insert_product(&widget).await.unwrap();
        let cart = store.get_or_create_cart(account.id).await.unwrap();
        let item = store.add_cart_item(cart.id, widget.id, 1).await.unwrap();
        store.remove_cart_item(item.id).await.unwrap();
        store.soft_delete_product(widget.id).await.unwrap();
        store.soft_delete_user(account.id).await.unwrap();

        let later = Utc::now() + Duration::seconds(1);
        let dry = store.purge_deleted(later, true).await.unwrap();
        assert_eq!(
            dry,
            PurgeReport { cart_items: 1, products: 1, carts: 1, users: 1 }
        );
        // dry runs change nothing
        assert_eq!(store.purge_deleted(later, true).await.unwrap(), dry);

        store.purge_deleted(later, false).await.unwrap();
        assert_eq!(store.purge_deleted(later, false).await.unwrap(), PurgeReport::default());
    }

    #[tokio::test]
    async fn purge_keeps_rows_newer_than_cutoff() {
        let store = MemoryStore::new();
        let account = user("keep@b.io");
        store.insert_user(&account).await.unwrap();
        store.soft_delete_user(account.id).await.unwrap();

        let report = store
            .purge_deleted(Utc::now() - Duration::days(30), false)
            .await
            .unwrap();
        assert_eq!(report.users, 0);
    }
}
