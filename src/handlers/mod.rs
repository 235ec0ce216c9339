pub mod checkouts;
pub mod health;
pub mod orders;

use std::sync::Arc;

use serde::Deserialize;
use utoipa::IntoParams;

use crate::db::DbPool;
use crate::services::{CheckoutService, OrderService};

/// Shared handler state: the service bundle plus the raw pool for health
/// probes.
#[derive(Clone)]
pub struct AppServices {
    pub db: Arc<DbPool>,
    pub checkouts: CheckoutService,
    pub orders: OrderService,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PaginationParams {
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}
