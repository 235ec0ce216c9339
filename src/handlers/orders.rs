use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use super::{AppServices, PaginationParams};
use crate::errors::ServiceError;

pub fn routes() -> Router<AppServices> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders page", body = crate::services::orders::OrderListResponse)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(services): State<AppServices>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = services.orders.list_orders(params.page, params.per_page).await?;
    Ok(Json(json!({ "success": true, "data": page })))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = crate::services::checkouts::OrderResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(services): State<AppServices>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = services.orders.get_order(id).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}
