pub mod app;
pub mod cart;
pub mod cart_handlers;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod models;
pub mod order_handlers;
pub mod orders;
pub mod payment;
pub mod product_handlers;
pub mod store;
pub mod user_handlers;
pub mod users;

pub use app::{build_router, AppState};
pub use config::{load_store_config, StoreConfig};
pub use error::{ServiceError, ServiceResult};
pub use metrics::StoreMetrics;
