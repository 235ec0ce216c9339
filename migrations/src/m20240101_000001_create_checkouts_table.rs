use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Checkouts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Checkouts::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Checkouts::CustomerId).uuid().null())
                    .col(ColumnDef::new(Checkouts::Email).string().null())
                    .col(ColumnDef::new(Checkouts::CartItems).json().not_null())
                    .col(
                        ColumnDef::new(Checkouts::Subtotal)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Checkouts::ShippingTotal)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Checkouts::TaxTotal)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Checkouts::Total)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Checkouts::Currency)
                            .string()
                            .not_null()
                            .default("USD"),
                    )
                    .col(ColumnDef::new(Checkouts::ShippingAddress).json().null())
                    .col(ColumnDef::new(Checkouts::BillingAddress).json().null())
                    .col(ColumnDef::new(Checkouts::ShippingRateId).string().null())
                    .col(ColumnDef::new(Checkouts::ShippingMethod).string().null())
                    .col(ColumnDef::new(Checkouts::CompletedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Checkouts::ExpiresAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Checkouts::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Checkouts::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        // Abandoned-checkout sweeps scan on expiry
        manager
            .create_index(
                Index::create()
                    .name("idx_checkouts_expires_at")
                    .table(Checkouts::Table)
                    .col(Checkouts::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Checkouts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Checkouts {
    Table,
    Id,
    CustomerId,
    Email,
    CartItems,
    Subtotal,
    ShippingTotal,
    TaxTotal,
    Total,
    Currency,
    ShippingAddress,
    BillingAddress,
    ShippingRateId,
    ShippingMethod,
    CompletedAt,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}
