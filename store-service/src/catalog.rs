use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Product, ProductFilter, ProductInput};
use crate::store::CatalogStore;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Listing envelope. `page` and `limit` are echoed, not applied.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, filter: ProductFilter) -> ServiceResult<ProductPage> {
        let page = filter.page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
        let limit = filter.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
        let products = self.store.list_products(&filter).await?;
        Ok(ProductPage {
            total: products.len(),
            products,
            page,
            limit,
        })
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Product> {
        self.store
            .find_product(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("product", id))
    }

    pub async fn create(&self, input: ProductInput) -> ServiceResult<Product> {
        let input = validate(input)?;
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            price: input.price,
            category: input.category,
            brand: input.brand,
            image_url: input.image_url,
            stock: input.stock,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_product(&product).await?;
        info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn update(&self, id: Uuid, input: ProductInput) -> ServiceResult<Product> {
        let input = validate(input)?;
        let mut product = self.get(id).await?;
        product.name = input.name;
        product.description = input.description;
        product.price = input.price;
        product.category = input.category;
        product.brand = input.brand;
        product.image_url = input.image_url;
        product.stock = input.stock;
        product.updated_at = Utc::now();

        if !self.store.update_product(&product).await? {
            return Err(ServiceError::not_found("product", id));
        }
        info!(product_id = %id, "product updated");
        Ok(product)
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        if !self.store.soft_delete_product(id).await? {
            return Err(ServiceError::not_found("product", id));
        }
        info!(product_id = %id, "product deleted");
        Ok(())
    }
}

fn validate(mut input: ProductInput) -> ServiceResult<ProductInput> {
    input.name = input.name.trim().to_string();
    input.category = input.category.trim().to_string();
    input.brand = input.brand.trim().to_string();
    input.image_url = input.image_url.trim().to_string();

    if input.name.is_empty() {
        return Err(ServiceError::validation("name is required"));
    }
    if input.category.is_empty() {
        return Err(ServiceError::validation("category is required"));
    }
    if !input.price.is_positive() {
        return Err(ServiceError::validation("price must be greater than zero"));
    }
    if input.stock < 0 {
        return Err(ServiceError::validation("stock cannot be negative"));
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_money::Money;

    fn input() -> ProductInput {
        ProductInput {
            name: " Desk lamp ".into(),
            description: String::new(),
            price: Money::from_cents(2500),
            category: "lighting".into(),
            brand: String::new(),
            image_url: String::new(),
            stock: 4,
        }
    }

    #[test]
    fn validation_trims_and_checks_bounds() {
        assert_eq!(validate(input()).unwrap().name, "Desk lamp");

        let mut free = input();
        free.price = Money::zero();
        assert!(matches!(validate(free), Err(ServiceError::Validation(_))));

        let mut negative = input();
        negative.stock = -1;
        assert!(validate(negative).is_err());

        let mut nameless = input();
        nameless.name = "  ".into();
        assert!(validate(nameless).is_err());
    }
}
