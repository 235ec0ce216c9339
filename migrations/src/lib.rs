pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_checkouts_table;
mod m20240101_000002_create_orders_table;
mod m20240101_000003_create_order_items_table;

pub struct Migrator;

impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_checkouts_table::Migration),
            Box::new(m20240101_000002_create_orders_table::Migration),
            Box::new(m20240101_000003_create_order_items_table::Migration),
        ]
    }
}
