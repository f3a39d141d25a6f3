//! Catalog Store access: courses, enrollments and the payment audit trail.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{DbErr, SqlErr};
use uuid::Uuid;

use crate::entities::{course, payment::PaymentStatus};

pub mod catalog_repository;
pub mod in_memory;

pub use catalog_repository::SeaOrmCatalogRepository;
pub use in_memory::InMemoryCatalogRepository;

#[derive(Debug, Clone, PartialEq)]
pub struct NewEnrollment {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub payment_id: Option<String>,
    pub amount_paid: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub provider_order_id: String,
    pub provider_payment_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
}

/// Result of an insert guarded by a unique index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The row already exists; nothing was written.
    Duplicate,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_course(&self, course_id: Uuid) -> Result<Option<course::Model>, DbErr>;

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool, DbErr>;

    /// Inserts under the `(user_id, course_id)` unique index. A violation
    /// is reported as [`InsertOutcome::Duplicate`], never as an error.
    async fn insert_enrollment(&self, enrollment: NewEnrollment) -> Result<InsertOutcome, DbErr>;

    /// Inserts under the `provider_payment_id` unique index.
    async fn insert_payment(&self, payment: NewPayment) -> Result<InsertOutcome, DbErr>;

    async fn ping(&self) -> Result<(), DbErr>;
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
