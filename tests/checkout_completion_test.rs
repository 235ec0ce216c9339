use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, RuntimeErr};
use tower::ServiceExt;
use uuid::Uuid;

use checkout_api::entities::checkout::{self, Address, CartItem, CartItems};
use checkout_api::entities::{order, order_item};
use checkout_api::handlers::AppServices;
use checkout_api::services::checkouts::{CheckoutService, PaymentInput};
use checkout_api::services::orders::OrderService;
use checkout_api::services::payments::paypal::{PayPalGateway, PayPalOrder};
use checkout_api::services::payments::stripe::{PaymentIntent, StripeGateway};
use checkout_api::services::payments::{GatewayError, PaymentVerifier};

mock! {
    StripeGw {}

    #[async_trait]
    impl StripeGateway for StripeGw {
        async fn retrieve_payment_intent(
            &self,
            payment_id: &str,
        ) -> Result<PaymentIntent, GatewayError>;
    }
}

mock! {
    PayPalGw {}

    #[async_trait]
    impl PayPalGateway for PayPalGw {
        async fn get_order(&self, order_id: &str) -> Result<PayPalOrder, GatewayError>;
    }
}

const CHECKOUT_TTL_MINUTES: i64 = 60 * 24;

fn two_line_checkout() -> checkout::Model {
    let now = Utc::now();
    checkout::Model {
        id: Uuid::new_v4(),
        customer_id: None,
        email: Some("shopper@example.com".to_string()),
        cart_items: CartItems(vec![
            CartItem {
                product_id: Uuid::new_v4(),
                variant_id: None,
                quantity: 2,
                title: "Canvas Tote".to_string(),
                variant_title: None,
                sku: Some("TOTE-01".to_string()),
                price: dec!(12.99),
                image_url: None,
            },
            CartItem {
                product_id: Uuid::new_v4(),
                variant_id: None,
                quantity: 1,
                title: "Sticker Pack".to_string(),
                variant_title: None,
                sku: None,
                price: dec!(0.00),
                image_url: None,
            },
        ]),
        subtotal: dec!(25.98),
        shipping_total: dec!(10.00),
        tax_total: Decimal::ZERO,
        total: dec!(35.98),
        currency: "USD".to_string(),
        shipping_address: Some(Address {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            company: None,
            address_line_1: "1 Analytical Way".to_string(),
            address_line_2: None,
            city: "London".to_string(),
            province: "LDN".to_string(),
            country_code: "GB".to_string(),
            postal_code: "EC1A".to_string(),
            phone: None,
        }),
        billing_address: None,
        shipping_rate_id: Some("standard".to_string()),
        shipping_method: Some("Standard Shipping (5-7 days)".to_string()),
        completed_at: None,
        expires_at: now + Duration::hours(24),
        created_at: now,
        updated_at: now,
    }
}

fn materialized_order(checkout: &checkout::Model, payment_id: &str) -> order::Model {
    let now = Utc::now();
    order::Model {
        id: Uuid::new_v4(),
        order_number: 1001,
        email: checkout.email.clone().unwrap(),
        subtotal: checkout.subtotal,
        shipping_total: checkout.shipping_total,
        tax_total: checkout.tax_total,
        total: checkout.total,
        currency: checkout.currency.clone(),
        status: "pending".to_string(),
        payment_status: "paid".to_string(),
        payment_provider: "stripe".to_string(),
        payment_id: payment_id.to_string(),
        shipping_address: checkout.shipping_address.clone(),
        billing_address: checkout.billing_address.clone(),
        shipping_method: checkout.shipping_method.clone(),
        paid_at: now,
        created_at: now,
        updated_at: None,
    }
}

fn materialized_item(order_id: Uuid, line: &CartItem) -> order_item::Model {
    order_item::Model {
        id: Uuid::new_v4(),
        order_id,
        product_id: line.product_id,
        variant_id: line.variant_id,
        title: line.title.clone(),
        variant_title: line.variant_title.clone(),
        sku: line.sku.clone(),
        price: line.price,
        quantity: line.quantity,
        total: (line.price * Decimal::from(line.quantity)).round_dp(2),
        image_url: line.image_url.clone(),
        created_at: Utc::now(),
    }
}

fn service(
    db: DatabaseConnection,
    stripe: MockStripeGw,
    paypal: MockPayPalGw,
) -> CheckoutService {
    let verifier = PaymentVerifier::new(Arc::new(stripe), Arc::new(paypal));
    CheckoutService::new(Arc::new(db), Arc::new(verifier), None, CHECKOUT_TTL_MINUTES)
}

fn stripe_input(payment_id: &str) -> PaymentInput {
    PaymentInput {
        payment_provider: Some("stripe".to_string()),
        payment_id: Some(payment_id.to_string()),
    }
}

#[tokio::test]
async fn stripe_completion_materializes_an_order() {
    let checkout = two_line_checkout();
    let order = materialized_order(&checkout, "pi_123");
    let item_1 = materialized_item(order.id, &checkout.cart_items.0[0]);
    let item_2 = materialized_item(order.id, &checkout.cart_items.0[1]);

    let mut completed = checkout.clone();
    completed.completed_at = Some(Utc::now());

    // One result set per statement: fetch, order insert, two item inserts,
    // checkout update.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![checkout.clone()]])
        .append_query_results([vec![order.clone()]])
        .append_query_results([vec![item_1]])
        .append_query_results([vec![item_2]])
        .append_query_results([vec![completed]])
        .into_connection();

    let mut stripe = MockStripeGw::new();
    stripe.expect_retrieve_payment_intent().returning(|id| {
        Ok(PaymentIntent {
            id: id.to_string(),
            status: "succeeded".to_string(),
            amount: 3598,
        })
    });

    let result = service(db, stripe, MockPayPalGw::new())
        .complete_checkout(checkout.id, stripe_input("pi_123"))
        .await
        .unwrap();

    assert!(!result.idempotent);
    assert_eq!(result.order.payment_status, "paid");
    assert_eq!(result.order.status, "pending");
    assert_eq!(result.order.total, dec!(35.98));
    assert_eq!(result.order.payment_id, "pi_123");
    assert_eq!(result.order.items.len(), 2);
    assert_eq!(result.order.items[0].total, dec!(25.98));
}

#[tokio::test]
async fn stripe_one_cent_short_is_rejected() {
    let checkout = two_line_checkout();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![checkout.clone()]])
        .into_connection();

    let mut stripe = MockStripeGw::new();
    stripe.expect_retrieve_payment_intent().returning(|id| {
        Ok(PaymentIntent {
            id: id.to_string(),
            status: "succeeded".to_string(),
            amount: 3597,
        })
    });

    let err = service(db, stripe, MockPayPalGw::new())
        .complete_checkout(checkout.id, stripe_input("pi_123"))
        .await
        .unwrap_err();
    assert_eq!(err.response_message(), "Payment amount mismatch");
    assert_eq!(err.status_code().as_u16(), 400);
}

#[tokio::test]
async fn paypal_approved_but_not_captured_is_rejected() {
    let checkout = two_line_checkout();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![checkout.clone()]])
        .into_connection();

    let mut paypal = MockPayPalGw::new();
    paypal.expect_get_order().returning(|id| {
        Ok(serde_json::from_value(serde_json::json!({
            "id": id,
            "status": "APPROVED"
        }))
        .unwrap())
    });

    let err = service(db, MockStripeGw::new(), paypal)
        .complete_checkout(
            checkout.id,
            PaymentInput {
                payment_provider: Some("paypal".to_string()),
                payment_id: Some("PAYPAL-1".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.response_message(),
        "Payment not completed. Status: APPROVED"
    );
    assert_eq!(err.status_code().as_u16(), 400);
}

#[tokio::test]
async fn completed_checkout_gets_gone_even_with_a_valid_payment() {
    let mut checkout = two_line_checkout();
    checkout.completed_at = Some(Utc::now());
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![checkout.clone()]])
        .into_connection();

    // No expectations on the gateways: any call would panic, proving the
    // verifier is never consulted for a consumed checkout.
    let err = service(db, MockStripeGw::new(), MockPayPalGw::new())
        .complete_checkout(checkout.id, stripe_input("pi_123"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code().as_u16(), 410);
    assert_eq!(
        err.response_message(),
        "Checkout has already been completed"
    );
}

#[tokio::test]
async fn missing_email_reported_before_missing_address() {
    let mut checkout = two_line_checkout();
    checkout.email = None;
    checkout.shipping_address = None;
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![checkout.clone()]])
        .into_connection();

    let err = service(db, MockStripeGw::new(), MockPayPalGw::new())
        .complete_checkout(checkout.id, stripe_input("pi_123"))
        .await
        .unwrap_err();
    assert_eq!(err.response_message(), "Customer email is required");
    assert_eq!(err.status_code().as_u16(), 400);
}

#[tokio::test]
async fn gateway_outage_maps_to_internal_error() {
    let checkout = two_line_checkout();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![checkout.clone()]])
        .into_connection();

    let mut stripe = MockStripeGw::new();
    stripe.expect_retrieve_payment_intent().returning(|_| {
        Err(GatewayError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        })
    });

    let err = service(db, stripe, MockPayPalGw::new())
        .complete_checkout(checkout.id, stripe_input("pi_123"))
        .await
        .unwrap_err();
    assert_eq!(err.response_message(), "Failed to verify payment");
    assert_eq!(err.status_code().as_u16(), 500);
}

#[tokio::test]
async fn item_insert_failure_rolls_back_the_whole_transaction() {
    let checkout = two_line_checkout();
    let order = materialized_order(&checkout, "pi_123");

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![checkout.clone()]])
        .append_query_results([vec![order]])
        .append_query_errors([DbErr::Query(RuntimeErr::Internal(
            "order_items insert failed".to_string(),
        ))])
        .into_connection();

    let mut stripe = MockStripeGw::new();
    stripe.expect_retrieve_payment_intent().returning(|id| {
        Ok(PaymentIntent {
            id: id.to_string(),
            status: "succeeded".to_string(),
            amount: 3598,
        })
    });

    let db_arc = Arc::new(db);
    let verifier = PaymentVerifier::new(Arc::new(stripe), Arc::new(MockPayPalGw::new()));
    let service = CheckoutService::new(
        db_arc.clone(),
        Arc::new(verifier),
        None,
        CHECKOUT_TTL_MINUTES,
    );

    let err = service
        .complete_checkout(checkout.id, stripe_input("pi_123"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code().as_u16(), 500);
    assert_eq!(err.response_message(), "Database error");

    // The mock records every statement; the failed transaction must not have
    // committed.
    drop(service);
    let conn = Arc::try_unwrap(db_arc).expect("service dropped all handles");
    let log = format!("{:?}", conn.into_transaction_log());
    assert!(!log.contains("COMMIT"), "transaction log: {log}");
}

#[tokio::test]
async fn completion_with_missing_payment_input_returns_400_over_http() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let db = Arc::new(db);
    let verifier = PaymentVerifier::new(
        Arc::new(MockStripeGw::new()),
        Arc::new(MockPayPalGw::new()),
    );
    let services = AppServices {
        db: db.clone(),
        checkouts: CheckoutService::new(db.clone(), Arc::new(verifier), None, CHECKOUT_TTL_MINUTES),
        orders: OrderService::new(db.clone()),
    };
    let app = checkout_api::app_router(services, None);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/checkouts/{}/complete", Uuid::new_v4()))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["success"], serde_json::json!(false));
    assert_eq!(
        payload["error"],
        serde_json::json!("Payment provider and payment ID are required")
    );
    assert_eq!(payload["status"], serde_json::json!(400));
}
