use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_auth::Role;
use common_money::Money;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    CartStore, CatalogStore, CheckoutTx, LockedProduct, Maintenance, OrderStore, PurgeReport,
    StoreError, StoreResult, UserStore,
};
use crate::models::{
    Cart, CartItem, CartLine, Order, OrderItem, OrderStatus, Product, ProductFilter, User,
};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, phone, role, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, name, description, price, category, brand, image_url, stock, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, address, shipping_type, payment_id, payment_type, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    phone: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        let role = row.role.parse::<Role>().map_err(|reason| StoreError::Corrupt {
            entity: "user",
            id: row.id,
            reason,
        })?;
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            phone: row.phone,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CartLineRow {
    item_id: Uuid,
    cart_id: Uuid,
    quantity: i32,
    available: bool,
    #[sqlx(flatten)]
    product: Product,
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_amount: Money,
    status: String,
    address: String,
    shipping_type: String,
    payment_id: Option<String>,
    payment_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> StoreResult<Order> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|reason| StoreError::Corrupt {
                entity: "order",
                id: self.id,
                reason,
            })?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            items,
            total_amount: self.total_amount,
            status,
            address: self.address,
            shipping_type: self.shipping_type,
            payment_id: self.payment_id,
            payment_type: self.payment_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn map_unique(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::UniqueViolation(db.constraint().unwrap_or("unique").to_string())
        }
        _ => StoreError::Database(err),
    }
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn order_items(&self, order_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<OrderItem>>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, quantity, price FROM order_items WHERE order_id = ANY($1) AND deleted_at IS NULL ORDER BY order_id, position",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, phone, role, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1) AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn update_user(&self, user: &User) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET name = $2, phone = $3, password_hash = $4, role = $5, updated_at = $6 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO products (id, name, description, price, category, brand, image_url, stock, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.price)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(&product.image_url)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE deleted_at IS NULL"
        ));

        if let Some(term) = filter.search_term() {
            builder.push(" AND name ILIKE ");
            builder.push_bind(format!("%{}%", escape_like(term)));
        } else {
            if let Some(category) = filter.category() {
                builder.push(" AND category = ");
                builder.push_bind(category.to_string());
            }
            if let Some(brand) = filter.brand() {
                builder.push(" AND brand = ");
                builder.push_bind(brand.to_string());
            }
            if let Some(min) = filter.min_price() {
                builder.push(" AND price >= ");
                builder.push_bind(min.clone());
            }
            if let Some(max) = filter.max_price() {
                builder.push(" AND price <= ");
                builder.push_bind(max.clone());
            }
        }
        builder.push(" ORDER BY created_at, id");

        let products = builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;
        debug!(count = products.len(), "listed products");
        Ok(products)
    }

    async fn update_product(&self, product: &Product) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, description = $3, price = $4, category = $5, brand = $6, image_url = $7, stock = $8, updated_at = $9 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.price)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(&product.image_url)
        .bind(product.stock)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl CartStore for PgStore {
    async fn get_or_create_cart(&self, user_id: Uuid) -> StoreResult<Cart> {
        sqlx::query(
            "INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) WHERE deleted_at IS NULL DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, user_id, created_at FROM carts WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(cart)
    }

    async fn cart_lines(&self, cart_id: Uuid) -> StoreResult<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r#"SELECT ci.id AS item_id, ci.cart_id, ci.quantity, p.deleted_at IS NULL AS available,
                      p.id, p.name, p.description, p.price, p.category, p.brand, p.image_url, p.stock, p.created_at, p.updated_at
               FROM cart_items ci
               JOIN products p ON p.id = ci.product_id
               WHERE ci.cart_id = $1 AND ci.deleted_at IS NULL
               ORDER BY ci.created_at, ci.id"#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CartLine {
                item: CartItem {
                    id: row.item_id,
                    cart_id: row.cart_id,
                    product_id: row.product.id,
                    quantity: row.quantity,
                },
                product: row.product,
                available: row.available,
            })
            .collect())
    }

    async fn add_cart_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartItem> {
        let item = sqlx::query_as::<_, CartItem>(
            r#"INSERT INTO cart_items (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4)
               ON CONFLICT (cart_id, product_id) WHERE deleted_at IS NULL
               DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()
               RETURNING id, cart_id, product_id, quantity"#,
        )
        .bind(Uuid::new_v4())
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?;
        Ok(item)
    }

    async fn find_cart_item(&self, cart_id: Uuid, item_id: Uuid) -> StoreResult<Option<CartItem>> {
        let item = sqlx::query_as::<_, CartItem>(
            "SELECT id, cart_id, product_id, quantity FROM cart_items WHERE id = $1 AND cart_id = $2 AND deleted_at IS NULL",
        )
        .bind(item_id)
        .bind(cart_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn set_cart_item_quantity(&self, item_id: Uuid, quantity: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(item_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_cart_item(&self, item_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE cart_items SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, cart_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE cart_items SET deleted_at = NOW() WHERE cart_id = $1 AND deleted_at IS NULL",
        )
        .bind(cart_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn begin_checkout(&self) -> StoreResult<Box<dyn CheckoutTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCheckout { tx }))
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let mut items = self.order_items(&[row.id]).await?;
        let items = items.remove(&row.id).unwrap_or_default();
        row.into_order(items).map(Some)
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.order_items(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_payment(
        &self,
        id: Uuid,
        payment_id: &str,
        payment_type: &str,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET payment_id = $2, payment_type = $3, status = 'processing', updated_at = NOW() WHERE id = $1 AND status = 'pending' AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(payment_id)
        .bind(payment_type)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Checkout unit of work over a database transaction. Dropping it without
/// `commit` rolls back.
struct PgCheckout {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTx for PgCheckout {
    async fn cart_for_user(&mut self, user_id: Uuid) -> StoreResult<(Cart, Vec<CartItem>)> {
        sqlx::query(
            "INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) WHERE deleted_at IS NULL DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, user_id, created_at FROM carts WHERE user_id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        let items = sqlx::query_as::<_, CartItem>(
            "SELECT id, cart_id, product_id, quantity FROM cart_items WHERE cart_id = $1 AND deleted_at IS NULL ORDER BY created_at, id",
        )
        .bind(cart.id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok((cart, items))
    }

    async fn lock_products(&mut self, ids: &[Uuid]) -> StoreResult<Vec<LockedProduct>> {
        // Fixed lock order keeps concurrent checkouts from deadlocking.
        let products = sqlx::query_as::<_, LockedProduct>(&format!(
            "SELECT {PRODUCT_COLUMNS}, deleted_at IS NULL AS live FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(products)
    }

    async fn set_stock(&mut self, product_id: Uuid, stock: i32) -> StoreResult<()> {
        sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .bind(stock)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO orders (id, user_id, total_amount, status, address, shipping_type, payment_id, payment_type, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(&order.total_amount)
        .bind(order.status.as_str())
        .bind(&order.address)
        .bind(&order.shipping_type)
        .bind(order.payment_id.as_deref())
        .bind(order.payment_type.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if order.items.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price, position) ",
        );
        builder.push_values(order.items.iter().enumerate(), |mut row, (position, item)| {
            row.push_bind(item.id)
                .push_bind(item.order_id)
                .push_bind(item.product_id)
                .push_bind(item.quantity)
                .push_bind(item.price.clone())
                .push_bind(position as i32);
        });
        builder.build().execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn clear_cart(&mut self, cart_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            "UPDATE cart_items SET deleted_at = NOW() WHERE cart_id = $1 AND deleted_at IS NULL",
        )
        .bind(cart_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Maintenance for PgStore {
    async fn promote_to_admin(&self, email: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET role = 'admin', updated_at = NOW() WHERE lower(email) = lower($1) AND deleted_at IS NULL",
        )
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_deleted(&self, before: DateTime<Utc>, dry_run: bool) -> StoreResult<PurgeReport> {
        let mut tx = self.pool.begin().await?;

        let users: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM users u WHERE u.deleted_at < $1 AND NOT EXISTS (SELECT 1 FROM orders o WHERE o.user_id = u.id)",
        )
        .bind(before)
        .fetch_all(&mut *tx)
        .await?;

        let carts: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM carts WHERE deleted_at < $1 OR user_id = ANY($2)",
        )
        .bind(before)
        .bind(&users)
        .fetch_all(&mut *tx)
        .await?;

        let cart_items = sqlx::query("DELETE FROM cart_items WHERE deleted_at < $1 OR cart_id = ANY($2)")
            .bind(before)
            .bind(&carts)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let products = sqlx::query(
            r#"DELETE FROM products p WHERE p.deleted_at < $1
               AND NOT EXISTS (SELECT 1 FROM order_items oi WHERE oi.product_id = p.id)
               AND NOT EXISTS (SELECT 1 FROM cart_items ci WHERE ci.product_id = p.id)"#,
        )
        .bind(before)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let carts_removed = sqlx::query("DELETE FROM carts WHERE id = ANY($1)")
            .bind(&carts)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let users_removed = sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(&users)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let report = PurgeReport {
            cart_items,
            products,
            carts: carts_removed,
            users: users_removed,
        };

        if dry_run {
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }
        Ok(report)
    }
}
