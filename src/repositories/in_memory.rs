use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DbErr;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CatalogRepository, InsertOutcome, NewEnrollment, NewPayment};
use crate::entities::{course, enrollment, payment};

#[derive(Default)]
struct Tables {
    courses: HashMap<Uuid, course::Model>,
    enrollments: HashMap<(Uuid, Uuid), enrollment::Model>,
    payments: HashMap<String, payment::Model>,
}

/// Thread-safe in-memory Catalog Store.
///
/// Uniqueness on `(user_id, course_id)` and on the provider payment id is
/// checked and written under one write lock, so concurrent inserts behave
/// like the database indexes.
#[derive(Default, Clone)]
pub struct InMemoryCatalogRepository {
    tables: Arc<RwLock<Tables>>,
    fail_enrollments: Arc<AtomicBool>,
    fail_payments: Arc<AtomicBool>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_course(&self, course: course::Model) {
        self.tables.write().await.courses.insert(course.id, course);
    }

    pub async fn enrollments(&self) -> Vec<enrollment::Model> {
        self.tables
            .read()
            .await
            .enrollments
            .values()
            .cloned()
            .collect()
    }

    pub async fn payments(&self) -> Vec<payment::Model> {
        self.tables.read().await.payments.values().cloned().collect()
    }

    /// Makes subsequent enrollment inserts fail with a storage error.
    pub fn fail_enrollment_inserts(&self, fail: bool) {
        self.fail_enrollments.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent payment audit inserts fail with a storage error.
    pub fn fail_payment_inserts(&self, fail: bool) {
        self.fail_payments.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn find_course(&self, course_id: Uuid) -> Result<Option<course::Model>, DbErr> {
        Ok(self.tables.read().await.courses.get(&course_id).cloned())
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool, DbErr> {
        Ok(self
            .tables
            .read()
            .await
            .enrollments
            .contains_key(&(user_id, course_id)))
    }

    async fn insert_enrollment(&self, new: NewEnrollment) -> Result<InsertOutcome, DbErr> {
        if self.fail_enrollments.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("enrollments table unavailable".into()));
        }
        let mut tables = self.tables.write().await;
        let key = (new.user_id, new.course_id);
        if tables.enrollments.contains_key(&key) {
            return Ok(InsertOutcome::Duplicate);
        }
        tables.enrollments.insert(
            key,
            enrollment::Model {
                id: Uuid::new_v4(),
                user_id: new.user_id,
                course_id: new.course_id,
                payment_id: new.payment_id,
                amount_paid: new.amount_paid,
                enrolled_at: Utc::now(),
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_payment(&self, new: NewPayment) -> Result<InsertOutcome, DbErr> {
        if self.fail_payments.load(Ordering::SeqCst) {
            return Err(DbErr::Custom("payments table unavailable".into()));
        }
        let mut tables = self.tables.write().await;
        if tables.payments.contains_key(&new.provider_payment_id) {
            return Ok(InsertOutcome::Duplicate);
        }
        tables.payments.insert(
            new.provider_payment_id.clone(),
            payment::Model {
                id: Uuid::new_v4(),
                user_id: new.user_id,
                course_id: new.course_id,
                provider_order_id: new.provider_order_id,
                provider_payment_id: new.provider_payment_id,
                amount: new.amount,
                currency: new.currency,
                status: new.status,
                created_at: Utc::now(),
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn ping(&self) -> Result<(), DbErr> {
        Ok(())
    }
}
