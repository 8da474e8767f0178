//! Persistence capabilities consumed by the services.
//!
//! Every read path skips rows whose `deleted_at` is set. Two backends implement
//! the traits: [`PgStore`] for production and [`MemoryStore`] for tests and
//! database-less local runs.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Cart, CartItem, CartLine, Order, OrderStatus, Product, ProductFilter, User};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unique constraint '{0}' violated")]
    UniqueViolation(String),
    #[error("quantity of cart item {0} would overflow")]
    QuantityOverflow(Uuid),
    #[error("corrupt {entity} row {id}: {reason}")]
    Corrupt {
        entity: &'static str,
        id: Uuid,
        reason: String,
    },
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::UniqueViolation`] when a live user holds the email.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, user: &User) -> StoreResult<bool>;
    async fn soft_delete_user(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_product(&self, product: &Product) -> StoreResult<()>;
    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;
    async fn update_product(&self, product: &Product) -> StoreResult<bool>;
    async fn soft_delete_product(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the live cart for `user_id`, creating it on first access.
    /// Concurrent first accesses observe the same cart.
    async fn get_or_create_cart(&self, user_id: Uuid) -> StoreResult<Cart>;
    /// Items in insertion order, joined with their products. Lines whose
    /// product was soft-deleted are kept with `available == false`.
    async fn cart_lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLine>>;
    /// Inserts the item or, when the product is already in the cart, adds to its quantity.
    async fn add_cart_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartItem>;
    async fn find_cart_item(&self, cart_id: Uuid, item_id: Uuid) -> StoreResult<Option<CartItem>>;
    async fn set_cart_item_quantity(&self, item_id: Uuid, quantity: i32) -> StoreResult<bool>;
    async fn remove_cart_item(&self, item_id: Uuid) -> StoreResult<bool>;
    async fn clear_cart(&self, cart_id: Uuid) -> StoreResult<u64>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin_checkout(&self) -> StoreResult<Box<dyn CheckoutTx>>;
    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    /// Newest first.
    async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;
    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<bool>;
    /// Writes the payment reference, the payment type and `processing` in one
    /// step, only if the order is still `pending`.
    async fn record_payment(
        &self,
        id: Uuid,
        payment_id: &str,
        payment_type: &str,
    ) -> StoreResult<bool>;
}

/// All-or-nothing unit of work for turning a cart into an order.
///
/// Nothing is visible to other callers until [`CheckoutTx::commit`]; dropping
/// the transaction discards every write made through it.
#[async_trait]
pub trait CheckoutTx: Send {
    /// The user's cart (created if absent) and its items in insertion order,
    /// locked against concurrent checkouts of the same cart.
    async fn cart_for_user(&mut self, user_id: Uuid) -> StoreResult<(Cart, Vec<CartItem>)>;
    /// Products among `ids`, soft-deleted ones included, row-locked until the
    /// transaction ends.
    async fn lock_products(&mut self, ids: &[Uuid]) -> StoreResult<Vec<LockedProduct>>;
    async fn set_stock(&mut self, product_id: Uuid, stock: i32) -> StoreResult<()>;
    /// Persists the order header and its items.
    async fn insert_order(&mut self, order: &Order) -> StoreResult<()>;
    async fn clear_cart(&mut self, cart_id: Uuid) -> StoreResult<()>;
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedProduct {
    #[sqlx(flatten)]
    pub product: Product,
    pub live: bool,
}

/// Physical removal of soft-deleted rows, used by the maintenance binary.
#[async_trait]
pub trait Maintenance: Send + Sync {
    async fn promote_to_admin(&self, email: &str) -> StoreResult<bool>;
    async fn purge_deleted(&self, before: DateTime<Utc>, dry_run: bool) -> StoreResult<PurgeReport>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub cart_items: u64,
    pub products: u64,
    pub carts: u64,
    pub users: u64,
}

/// Every capability the HTTP service needs.
pub trait Store: UserStore + CatalogStore + CartStore + OrderStore + 'static {}

impl<T> Store for T where T: UserStore + CatalogStore + CartStore + OrderStore + 'static {}
