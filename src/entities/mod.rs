pub mod checkout;
pub mod order;
pub mod order_item;

pub use checkout::Entity as Checkout;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
