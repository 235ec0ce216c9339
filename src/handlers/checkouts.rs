use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use super::AppServices;
use crate::errors::ServiceError;
use crate::services::checkouts::{
    AddressInput, CreateCheckoutRequest, PaymentInput, SetShippingMethodRequest,
    UpdateCustomerInfoRequest,
};

pub fn routes() -> Router<AppServices> {
    Router::new()
        .route("/", post(create_checkout))
        .route("/:id", get(get_checkout))
        .route("/:id/customer", put(set_customer_info))
        .route("/:id/shipping-address", put(set_shipping_address))
        .route("/:id/shipping-method", put(set_shipping_method))
        .route("/:id/complete", post(complete_checkout))
}

#[utoipa::path(
    post,
    path = "/api/v1/checkouts",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 201, description = "Checkout created", body = crate::services::checkouts::CheckoutResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "checkouts"
)]
pub async fn create_checkout(
    State(services): State<AppServices>,
    Json(req): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let checkout = services.checkouts.create_checkout(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "checkout": checkout })),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/checkouts/{id}",
    params(("id" = Uuid, Path, description = "Checkout ID")),
    responses(
        (status = 200, description = "Checkout found", body = crate::services::checkouts::CheckoutResponse),
        (status = 404, description = "Checkout not found", body = crate::errors::ErrorResponse)
    ),
    tag = "checkouts"
)]
pub async fn get_checkout(
    State(services): State<AppServices>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let checkout = services.checkouts.get_checkout(id).await?;
    Ok(Json(json!({ "success": true, "checkout": checkout })))
}

#[utoipa::path(
    put,
    path = "/api/v1/checkouts/{id}/customer",
    params(("id" = Uuid, Path, description = "Checkout ID")),
    request_body = UpdateCustomerInfoRequest,
    responses(
        (status = 200, description = "Customer info updated", body = crate::services::checkouts::CheckoutResponse),
        (status = 404, description = "Checkout not found", body = crate::errors::ErrorResponse),
        (status = 410, description = "Checkout completed or expired", body = crate::errors::ErrorResponse)
    ),
    tag = "checkouts"
)]
pub async fn set_customer_info(
    State(services): State<AppServices>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCustomerInfoRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let checkout = services.checkouts.set_customer_info(id, req).await?;
    Ok(Json(json!({ "success": true, "checkout": checkout })))
}

#[utoipa::path(
    put,
    path = "/api/v1/checkouts/{id}/shipping-address",
    params(("id" = Uuid, Path, description = "Checkout ID")),
    request_body = AddressInput,
    responses(
        (status = 200, description = "Shipping address set", body = crate::services::checkouts::CheckoutResponse),
        (status = 404, description = "Checkout not found", body = crate::errors::ErrorResponse)
    ),
    tag = "checkouts"
)]
pub async fn set_shipping_address(
    State(services): State<AppServices>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddressInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let checkout = services.checkouts.set_shipping_address(id, req).await?;
    Ok(Json(json!({ "success": true, "checkout": checkout })))
}

#[utoipa::path(
    put,
    path = "/api/v1/checkouts/{id}/shipping-method",
    params(("id" = Uuid, Path, description = "Checkout ID")),
    request_body = SetShippingMethodRequest,
    responses(
        (status = 200, description = "Shipping method set", body = crate::services::checkouts::CheckoutResponse),
        (status = 400, description = "Unknown shipping rate", body = crate::errors::ErrorResponse)
    ),
    tag = "checkouts"
)]
pub async fn set_shipping_method(
    State(services): State<AppServices>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetShippingMethodRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let checkout = services.checkouts.set_shipping_method(id, req).await?;
    Ok(Json(json!({ "success": true, "checkout": checkout })))
}

/// Completion endpoint. The response mirrors the service result: failures
/// surface the stable error string and status, successes carry the order and,
/// when a concurrent attempt won the race, an `idempotent` marker.
#[utoipa::path(
    post,
    path = "/api/v1/checkouts/{id}/complete",
    params(("id" = Uuid, Path, description = "Checkout ID")),
    request_body = PaymentInput,
    responses(
        (status = 200, description = "Order created or resolved idempotently", body = crate::services::checkouts::CompletedCheckout),
        (status = 400, description = "Invalid input or payment not acceptable", body = crate::errors::ErrorResponse),
        (status = 404, description = "Checkout not found", body = crate::errors::ErrorResponse),
        (status = 410, description = "Checkout already completed", body = crate::errors::ErrorResponse),
        (status = 500, description = "Payment verification unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "checkouts"
)]
pub async fn complete_checkout(
    State(services): State<AppServices>,
    Path(id): Path<Uuid>,
    Json(input): Json<PaymentInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let completed = services.checkouts.complete_checkout(id, input).await?;

    let mut body = json!({ "success": true, "order": completed.order });
    if completed.idempotent {
        body["idempotent"] = serde_json::Value::Bool(true);
    }
    Ok(Json(body))
}
