use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use common_auth::Role;
use common_money::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category: String,
    pub brand: String,
    pub image_url: String,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable product fields, shared by create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub image_url: String,
    pub stock: i32,
}

/// Catalog query. A non-empty `search` replaces the other predicates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductFilter {
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Price bounds that are not positive are ignored.
    pub fn min_price(&self) -> Option<&Money> {
        self.min_price.as_ref().filter(|m| m.is_positive())
    }

    pub fn max_price(&self) -> Option<&Money> {
        self.max_price.as_ref().filter(|m| m.is_positive())
    }

    /// In-process form of the catalog predicate; the SQL query mirrors it.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(term) = self.search_term() {
            return product.name.to_lowercase().contains(&term.to_lowercase());
        }
        self.category().map_or(true, |c| product.category == c)
            && self.brand().map_or(true, |b| product.brand == b)
            && self.min_price().map_or(true, |min| product.price >= *min)
            && self.max_price().map_or(true, |max| product.price <= *max)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A cart item joined with the live product it refers to.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
    /// False once the product has been soft-deleted from the catalog.
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price captured at checkout.
    pub price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub address: String,
    pub shipping_type: String,
    pub payment_id: Option<String>,
    pub payment_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, category: &str, cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            price: Money::from_cents(cents),
            category: category.into(),
            brand: "acme".into(),
            image_url: String::new(),
            stock: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn search_replaces_other_filters() {
        let filter = ProductFilter {
            category: Some("books".into()),
            search: Some("LAMP".into()),
            ..Default::default()
        };
        assert!(filter.matches(&product("Desk lamp", "lighting", 2500)));
        assert!(!filter.matches(&product("Novel", "books", 900)));
    }

    #[test]
    fn non_positive_price_bounds_are_ignored() {
        let filter = ProductFilter {
            min_price: Some(Money::zero()),
            max_price: Some(Money::from_cents(1000)),
            ..Default::default()
        };
        assert!(filter.matches(&product("Cheap", "misc", 1)));
        assert!(!filter.matches(&product("Pricey", "misc", 1001)));
    }

    #[test]
    fn status_parses_known_names_only() {
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("cancelled".parse::<OrderStatus>().is_err());
    }
}
