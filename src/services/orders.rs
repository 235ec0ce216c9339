use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, ModelTrait, PaginatorTrait, QueryOrder};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{order, Order, OrderItem};
use crate::errors::ServiceError;
use crate::services::checkouts::OrderResponse;

/// One row in an order listing. Line items are only loaded on the detail
/// endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: i64,
    pub email: String,
    pub total: Decimal,
    pub currency: String,
    pub status: String,
    pub payment_status: String,
    pub payment_provider: String,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderSummary {
    fn from(model: order::Model) -> Self {
        OrderSummary {
            id: model.id,
            order_number: model.order_number,
            email: model.email,
            total: model.total,
            currency: model.currency,
            status: model.status,
            payment_status: model.payment_status,
            payment_provider: model.payment_provider,
            paid_at: model.paid_at,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderSummary>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Read-side access to committed orders. Orders are immutable; this service
/// never writes.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let items = order.find_related(OrderItem).all(self.db.as_ref()).await?;
        Ok(OrderResponse::from_parts(order, items))
    }

    /// Newest orders first. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let paginator = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);

        let total = paginator.num_items().await?;
        let orders = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(OrderSummary::from)
            .collect();

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn sample_order(payment_id: &str) -> order::Model {
        let now = Utc::now();
        order::Model {
            id: Uuid::new_v4(),
            order_number: 1001,
            email: "shopper@example.com".to_string(),
            subtotal: dec!(25.98),
            shipping_total: dec!(10.00),
            tax_total: Decimal::ZERO,
            total: dec!(35.98),
            currency: "USD".to_string(),
            status: "pending".to_string(),
            payment_status: "paid".to_string(),
            payment_provider: "stripe".to_string(),
            payment_id: payment_id.to_string(),
            shipping_address: None,
            billing_address: None,
            shipping_method: None,
            paid_at: now,
            created_at: now,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn get_order_returns_items_with_the_header() {
        let order = sample_order("pi_123");
        let order_id = order.id;
        let item = crate::entities::order_item::Model {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            variant_id: None,
            title: "Canvas Tote".to_string(),
            variant_title: None,
            sku: None,
            price: dec!(12.99),
            quantity: 2,
            total: dec!(25.98),
            image_url: None,
            created_at: Utc::now(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order]])
            .append_query_results([vec![item]])
            .into_connection();
        let service = OrderService::new(Arc::new(db));

        let response = service.get_order(order_id).await.unwrap();
        assert_eq!(response.id, order_id);
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<order::Model>::new()])
            .into_connection();
        let service = OrderService::new(Arc::new(db));

        let err = service.get_order(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.response_message(), "Order not found");
        assert_eq!(err.status_code().as_u16(), 404);
    }
}
