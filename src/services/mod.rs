pub mod checkouts;
pub mod orders;
pub mod payments;

pub use checkouts::CheckoutService;
pub use orders::OrderService;
pub use payments::PaymentVerifier;
