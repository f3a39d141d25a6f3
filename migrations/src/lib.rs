pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_courses_table;
mod m20260101_000002_create_enrollments_table;
mod m20260101_000003_create_payments_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_courses_table::Migration),
            Box::new(m20260101_000002_create_enrollments_table::Migration),
            Box::new(m20260101_000003_create_payments_table::Migration),
        ]
    }
}
