use utoipa::OpenApi;

use crate::entities::checkout::{Address, CartItem};
use crate::errors::ErrorResponse;
use crate::services::checkouts::{
    AddressInput, CartItemInput, CheckoutResponse, CompletedCheckout, CreateCheckoutRequest,
    OrderItemResponse, OrderResponse, PaymentInput, SetShippingMethodRequest,
    UpdateCustomerInfoRequest,
};
use crate::services::orders::{OrderListResponse, OrderSummary};
use crate::services::payments::PaymentProvider;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::checkouts::create_checkout,
        crate::handlers::checkouts::get_checkout,
        crate::handlers::checkouts::set_customer_info,
        crate::handlers::checkouts::set_shipping_address,
        crate::handlers::checkouts::set_shipping_method,
        crate::handlers::checkouts::complete_checkout,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::health::health_check,
    ),
    components(schemas(
        ErrorResponse,
        Address,
        CartItem,
        CreateCheckoutRequest,
        CartItemInput,
        UpdateCustomerInfoRequest,
        AddressInput,
        SetShippingMethodRequest,
        PaymentInput,
        PaymentProvider,
        CheckoutResponse,
        CompletedCheckout,
        OrderResponse,
        OrderItemResponse,
        OrderSummary,
        OrderListResponse,
    )),
    tags(
        (name = "checkouts", description = "Checkout flow and completion"),
        (name = "orders", description = "Committed orders"),
        (name = "health", description = "Liveness and readiness")
    ),
    info(
        title = "Checkout API",
        description = "Storefront checkout flow with payment verification and idempotent order creation",
        version = env!("CARGO_PKG_VERSION")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_documents_the_completion_endpoint() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["paths"]
            .get("/api/v1/checkouts/{id}/complete")
            .is_some());
        assert!(json["components"]["schemas"].get("ErrorResponse").is_some());
    }
}
