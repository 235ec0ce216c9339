use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, ModelTrait, NotSet, QueryFilter, Set,
    SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::checkout::{self, Address, CartItem, CartItems};
use crate::entities::{order, order_item, Checkout, OrderItem};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::payments::{PaymentProvider, PaymentVerifier};

pub const ORDER_STATUS_PENDING: &str = "pending";
pub const PAYMENT_STATUS_PAID: &str = "paid";

/// Flat-rate shipping options offered at the shipping step.
fn shipping_rate(rate_id: &str) -> Option<(&'static str, Decimal)> {
    match rate_id {
        "standard" => Some(("Standard Shipping (5-7 days)", dec!(10.00))),
        "express" => Some(("Express Shipping (2-3 days)", dec!(25.00))),
        "overnight" => Some(("Overnight Shipping (1 day)", dec!(50.00))),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CartItemInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(min = 1, message = "Item title is required"))]
    pub title: String,
    pub variant_title: Option<String>,
    pub sku: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCheckoutRequest {
    pub customer_id: Option<Uuid>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate]
    pub cart_items: Vec<CartItemInput>,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Tax computed by the storefront's tax collaborator; defaults to zero.
    #[serde(default)]
    pub tax_total: Decimal,
    pub billing_address: Option<AddressInput>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomerInfoRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    pub company: Option<String>,
    #[validate(length(min = 1, message = "Address line is required"))]
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Province is required"))]
    pub province: String,
    #[validate(length(min = 2, max = 2, message = "Country code must be ISO 3166-1 alpha-2"))]
    pub country_code: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    pub phone: Option<String>,
}

impl From<AddressInput> for Address {
    fn from(input: AddressInput) -> Self {
        Address {
            first_name: input.first_name,
            last_name: input.last_name,
            company: input.company,
            address_line_1: input.address_line_1,
            address_line_2: input.address_line_2,
            city: input.city,
            province: input.province,
            country_code: input.country_code,
            postal_code: input.postal_code,
            phone: input.phone,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SetShippingMethodRequest {
    #[validate(length(min = 1, message = "Shipping rate is required"))]
    pub shipping_rate_id: String,
}

/// Raw completion payload as received from the client. Both fields are
/// optional at the wire level; validation decides whether they are usable.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PaymentInput {
    pub payment_provider: Option<String>,
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub email: Option<String>,
    pub cart_items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub shipping_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub shipping_rate_id: Option<String>,
    pub shipping_method: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<checkout::Model> for CheckoutResponse {
    fn from(model: checkout::Model) -> Self {
        CheckoutResponse {
            id: model.id,
            customer_id: model.customer_id,
            email: model.email,
            cart_items: model.cart_items.0,
            subtotal: model.subtotal,
            shipping_total: model.shipping_total,
            tax_total: model.tax_total,
            total: model.total,
            currency: model.currency,
            shipping_address: model.shipping_address,
            billing_address: model.billing_address,
            shipping_rate_id: model.shipping_rate_id,
            shipping_method: model.shipping_method,
            completed_at: model.completed_at,
            expires_at: model.expires_at,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub title: String,
    pub variant_title: Option<String>,
    pub sku: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub total: Decimal,
    pub image_url: Option<String>,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(model: order_item::Model) -> Self {
        OrderItemResponse {
            id: model.id,
            product_id: model.product_id,
            variant_id: model.variant_id,
            title: model.title,
            variant_title: model.variant_title,
            sku: model.sku,
            price: model.price,
            quantity: model.quantity,
            total: model.total,
            image_url: model.image_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: i64,
    pub email: String,
    pub subtotal: Decimal,
    pub shipping_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub status: String,
    pub payment_status: String,
    pub payment_provider: String,
    pub payment_id: String,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub shipping_method: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub fn from_parts(order: order::Model, items: Vec<order_item::Model>) -> Self {
        OrderResponse {
            id: order.id,
            order_number: order.order_number,
            email: order.email,
            subtotal: order.subtotal,
            shipping_total: order.shipping_total,
            tax_total: order.tax_total,
            total: order.total,
            currency: order.currency,
            status: order.status,
            payment_status: order.payment_status,
            payment_provider: order.payment_provider,
            payment_id: order.payment_id,
            shipping_address: order.shipping_address,
            billing_address: order.billing_address,
            shipping_method: order.shipping_method,
            paid_at: order.paid_at,
            created_at: order.created_at,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

/// Outcome of a successful completion attempt. `idempotent` is true when the
/// order was created by an earlier attempt for the same payment; clients see
/// both cases as the same success.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompletedCheckout {
    pub order: OrderResponse,
    pub idempotent: bool,
}

/// Validates the raw payment input. Whitespace-only values count as missing.
fn validate_payment_input(input: &PaymentInput) -> Result<(PaymentProvider, String), ServiceError> {
    let provider = input
        .payment_provider
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let payment_id = input
        .payment_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (provider, payment_id) = match (provider, payment_id) {
        (Some(provider), Some(payment_id)) => (provider, payment_id),
        _ => {
            return Err(ServiceError::InvalidInput(
                "Payment provider and payment ID are required".to_string(),
            ))
        }
    };

    let provider = provider
        .parse::<PaymentProvider>()
        .map_err(|_| ServiceError::InvalidInput("Invalid payment provider".to_string()))?;

    Ok((provider, payment_id.to_string()))
}

/// Preconditions for turning a checkout into an order. Checked in a fixed
/// order so callers always see the same first failure: completion state,
/// cart contents, email, address, shipping method.
fn validate_ready_for_completion(checkout: &checkout::Model) -> Result<(), ServiceError> {
    if checkout.completed_at.is_some() {
        return Err(ServiceError::Gone(
            "Checkout has already been completed".to_string(),
        ));
    }
    if checkout.cart_items.is_empty() {
        return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
    }
    if checkout
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .is_none()
    {
        return Err(ServiceError::InvalidOperation(
            "Customer email is required".to_string(),
        ));
    }
    if checkout.shipping_address.is_none() {
        return Err(ServiceError::InvalidOperation(
            "Shipping address is required".to_string(),
        ));
    }
    if checkout.shipping_rate_id.is_none() {
        return Err(ServiceError::InvalidOperation(
            "Shipping method is required".to_string(),
        ));
    }
    Ok(())
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    verifier: Arc<PaymentVerifier>,
    event_sender: Option<Arc<EventSender>>,
    checkout_ttl: Duration,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        verifier: Arc<PaymentVerifier>,
        event_sender: Option<Arc<EventSender>>,
        checkout_ttl_minutes: i64,
    ) -> Self {
        Self {
            db,
            verifier,
            event_sender,
            checkout_ttl: Duration::minutes(checkout_ttl_minutes),
        }
    }

    /// Starts a checkout from a cart snapshot. Shipping is zero until a
    /// method is chosen; `total = subtotal + shipping_total + tax_total`
    /// holds at every step.
    #[instrument(skip(self, req))]
    pub async fn create_checkout(
        &self,
        req: CreateCheckoutRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        req.validate()?;

        let now = Utc::now();
        let subtotal: Decimal = req
            .cart_items
            .iter()
            .map(|line| line.price * Decimal::from(line.quantity))
            .sum::<Decimal>()
            .round_dp(2);
        let total = subtotal + req.tax_total;

        let cart_items = CartItems(
            req.cart_items
                .into_iter()
                .map(|line| CartItem {
                    product_id: line.product_id,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                    title: line.title,
                    variant_title: line.variant_title,
                    sku: line.sku,
                    price: line.price,
                    image_url: line.image_url,
                })
                .collect(),
        );

        let checkout = checkout::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(req.customer_id),
            email: Set(req.email),
            cart_items: Set(cart_items),
            subtotal: Set(subtotal),
            shipping_total: Set(Decimal::ZERO),
            tax_total: Set(req.tax_total),
            total: Set(total),
            currency: Set(req.currency),
            shipping_address: Set(None),
            billing_address: Set(req.billing_address.map(Address::from)),
            shipping_rate_id: Set(None),
            shipping_method: Set(None),
            completed_at: Set(None),
            expires_at: Set(now + self.checkout_ttl),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "failed to create checkout");
            ServiceError::DatabaseError(e)
        })?;

        info!(checkout_id = %checkout.id, "checkout created");
        self.emit(Event::CheckoutStarted {
            checkout_id: checkout.id,
        })
        .await;

        Ok(checkout.into())
    }

    #[instrument(skip(self))]
    pub async fn get_checkout(&self, checkout_id: Uuid) -> Result<CheckoutResponse, ServiceError> {
        Ok(self.fetch_checkout(checkout_id).await?.into())
    }

    /// Fills in contact details during the information step.
    #[instrument(skip(self, req))]
    pub async fn set_customer_info(
        &self,
        checkout_id: Uuid,
        req: UpdateCustomerInfoRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        req.validate()?;
        let checkout = self.fetch_open_checkout(checkout_id).await?;

        let mut active: checkout::ActiveModel = checkout.into();
        active.email = Set(Some(req.email));
        if req.customer_id.is_some() {
            active.customer_id = Set(req.customer_id);
        }
        active.updated_at = NotSet;

        let updated = active.update(self.db.as_ref()).await?;
        Ok(updated.into())
    }

    #[instrument(skip(self, req))]
    pub async fn set_shipping_address(
        &self,
        checkout_id: Uuid,
        req: AddressInput,
    ) -> Result<CheckoutResponse, ServiceError> {
        req.validate()?;
        let checkout = self.fetch_open_checkout(checkout_id).await?;
        let address: Address = req.into();

        let missing_billing = checkout.billing_address.is_none();
        let mut active: checkout::ActiveModel = checkout.into();
        // Billing falls back to the shipping address until set explicitly.
        if missing_billing {
            active.billing_address = Set(Some(address.clone()));
        }
        active.shipping_address = Set(Some(address));
        active.updated_at = NotSet;

        let updated = active.update(self.db.as_ref()).await?;
        Ok(updated.into())
    }

    /// Selects a shipping rate and folds its cost into the totals.
    #[instrument(skip(self, req))]
    pub async fn set_shipping_method(
        &self,
        checkout_id: Uuid,
        req: SetShippingMethodRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        req.validate()?;
        let (method, shipping_total) = shipping_rate(&req.shipping_rate_id)
            .ok_or_else(|| ServiceError::InvalidInput("Invalid shipping method".to_string()))?;

        let checkout = self.fetch_open_checkout(checkout_id).await?;
        let total = checkout.subtotal + shipping_total + checkout.tax_total;

        let mut active: checkout::ActiveModel = checkout.into();
        active.shipping_rate_id = Set(Some(req.shipping_rate_id));
        active.shipping_method = Set(Some(method.to_string()));
        active.shipping_total = Set(shipping_total);
        active.total = Set(total);
        active.updated_at = NotSet;

        let updated = active.update(self.db.as_ref()).await?;
        Ok(updated.into())
    }

    /// Turns a paid checkout into an order, exactly once.
    ///
    /// Pipeline: payment input validation, checkout fetch and precondition
    /// checks, provider-side payment verification, then the materialization
    /// transaction. A unique-constraint conflict on `payment_id` means a
    /// concurrent attempt already created the order; that attempt's result is
    /// returned with `idempotent: true`.
    #[instrument(skip(self, input), fields(checkout_id = %checkout_id))]
    pub async fn complete_checkout(
        &self,
        checkout_id: Uuid,
        input: PaymentInput,
    ) -> Result<CompletedCheckout, ServiceError> {
        let (provider, payment_id) = validate_payment_input(&input)?;

        let checkout = self.fetch_checkout(checkout_id).await?;
        validate_ready_for_completion(&checkout)?;

        self.verifier
            .verify(provider, &payment_id, checkout.total)
            .await?;

        match self
            .materialize_order(&checkout, provider, &payment_id)
            .await
        {
            Ok((order, items)) => {
                info!(order_id = %order.id, order_number = order.order_number, "checkout completed");
                self.emit(Event::OrderCreated(order.id)).await;
                self.emit(Event::CheckoutCompleted {
                    checkout_id,
                    order_id: order.id,
                    idempotent: false,
                })
                .await;
                Ok(CompletedCheckout {
                    order: OrderResponse::from_parts(order, items),
                    idempotent: false,
                })
            }
            Err(err) if is_unique_violation(&err) => {
                match self.resolve_existing_order(&payment_id).await? {
                    Some((order, items)) => {
                        info!(order_id = %order.id, "completion raced an earlier attempt; returning its order");
                        self.emit(Event::CheckoutCompleted {
                            checkout_id,
                            order_id: order.id,
                            idempotent: true,
                        })
                        .await;
                        Ok(CompletedCheckout {
                            order: OrderResponse::from_parts(order, items),
                            idempotent: true,
                        })
                    }
                    // The conflict came from some other unique index. Not a
                    // race we understand, so surface the original error.
                    None => {
                        error!(error = %err, "unique violation without a matching order");
                        Err(ServiceError::DatabaseError(err))
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "order materialization failed");
                Err(ServiceError::DatabaseError(err))
            }
        }
    }

    async fn fetch_checkout(&self, checkout_id: Uuid) -> Result<checkout::Model, ServiceError> {
        Checkout::find_by_id(checkout_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Checkout not found".to_string()))
    }

    /// Fetch for the mutation steps, which must not touch a consumed or
    /// abandoned checkout.
    async fn fetch_open_checkout(
        &self,
        checkout_id: Uuid,
    ) -> Result<checkout::Model, ServiceError> {
        let checkout = self.fetch_checkout(checkout_id).await?;
        if checkout.completed_at.is_some() {
            return Err(ServiceError::Gone(
                "Checkout has already been completed".to_string(),
            ));
        }
        if checkout.expires_at < Utc::now() {
            return Err(ServiceError::Gone("Checkout has expired".to_string()));
        }
        Ok(checkout)
    }

    /// Inserts the order header, one item row per cart line, and marks the
    /// checkout completed, all in one transaction. The caller inspects the
    /// error for a `payment_id` uniqueness conflict.
    async fn materialize_order(
        &self,
        checkout: &checkout::Model,
        provider: PaymentProvider,
        payment_id: &str,
    ) -> Result<(order::Model, Vec<order_item::Model>), DbErr> {
        let txn = self.db.begin().await?;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let order = order::ActiveModel {
            id: Set(order_id),
            // Assigned by the database sequence.
            order_number: NotSet,
            email: Set(checkout.email.clone().unwrap_or_default()),
            subtotal: Set(checkout.subtotal),
            shipping_total: Set(checkout.shipping_total),
            tax_total: Set(checkout.tax_total),
            total: Set(checkout.total),
            currency: Set(checkout.currency.clone()),
            status: Set(ORDER_STATUS_PENDING.to_string()),
            payment_status: Set(PAYMENT_STATUS_PAID.to_string()),
            payment_provider: Set(provider.to_string()),
            payment_id: Set(payment_id.to_string()),
            shipping_address: Set(checkout.shipping_address.clone()),
            billing_address: Set(checkout.billing_address.clone()),
            shipping_method: Set(checkout.shipping_method.clone()),
            paid_at: Set(now),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(checkout.cart_items.0.len());
        for line in &checkout.cart_items.0 {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                variant_id: Set(line.variant_id),
                title: Set(line.title.clone()),
                variant_title: Set(line.variant_title.clone()),
                sku: Set(line.sku.clone()),
                price: Set(line.price),
                quantity: Set(line.quantity),
                total: Set((line.price * Decimal::from(line.quantity)).round_dp(2)),
                image_url: Set(line.image_url.clone()),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        let mut completed: checkout::ActiveModel = checkout.clone().into();
        completed.completed_at = Set(Some(now));
        completed.updated_at = Set(now);
        completed.update(&txn).await?;

        txn.commit().await?;
        Ok((order, items))
    }

    /// Looks up the order an earlier attempt created for this payment. `None`
    /// means the uniqueness conflict was not about `payment_id`.
    async fn resolve_existing_order(
        &self,
        payment_id: &str,
    ) -> Result<Option<(order::Model, Vec<order_item::Model>)>, DbErr> {
        let existing = order::Entity::find()
            .filter(order::Column::PaymentId.eq(payment_id))
            .one(self.db.as_ref())
            .await?;

        let Some(existing) = existing else {
            return Ok(None);
        };

        let items = existing
            .find_related(OrderItem)
            .all(self.db.as_ref())
            .await?;
        Ok(Some((existing, items)))
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to publish event");
            }
        }
    }
}
