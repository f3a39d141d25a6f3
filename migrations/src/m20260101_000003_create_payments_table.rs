use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20260101_000003_create_payments_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Payments::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Payments::UserId).uuid().not_null())
                    .col(ColumnDef::new(Payments::CourseId).uuid().not_null())
                    .col(
                        ColumnDef::new(Payments::ProviderOrderId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payments::ProviderPaymentId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payments::Amount).decimal_len(12, 2).not_null())
                    .col(ColumnDef::new(Payments::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(Payments::Status).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Payments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_payments_provider_payment_id")
                    .table(Payments::Table)
                    .col(Payments::ProviderPaymentId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Reconciliation looks up captured payments per (user, course).
        manager
            .create_index(
                Index::create()
                    .name("idx_payments_user_course")
                    .table(Payments::Table)
                    .col(Payments::UserId)
                    .col(Payments::CourseId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    UserId,
    CourseId,
    ProviderOrderId,
    ProviderPaymentId,
    Amount,
    Currency,
    Status,
    CreatedAt,
}
