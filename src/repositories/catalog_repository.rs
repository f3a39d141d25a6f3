use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{is_unique_violation, CatalogRepository, InsertOutcome, NewEnrollment, NewPayment};
use crate::entities::{course, enrollment, payment};

/// Catalog Store backed by a SeaORM connection (Postgres or SQLite).
#[derive(Debug, Clone)]
pub struct SeaOrmCatalogRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCatalogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn outcome(result: Result<u64, DbErr>) -> Result<InsertOutcome, DbErr> {
        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Duplicate),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl CatalogRepository for SeaOrmCatalogRepository {
    async fn find_course(&self, course_id: Uuid) -> Result<Option<course::Model>, DbErr> {
        course::Entity::find_by_id(course_id).one(&*self.db).await
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool, DbErr> {
        let count = enrollment::Entity::find()
            .filter(enrollment::Column::UserId.eq(user_id))
            .filter(enrollment::Column::CourseId.eq(course_id))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }

    #[instrument(skip(self, new), fields(user_id = %new.user_id, course_id = %new.course_id))]
    async fn insert_enrollment(&self, new: NewEnrollment) -> Result<InsertOutcome, DbErr> {
        let model = enrollment::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id),
            course_id: Set(new.course_id),
            payment_id: Set(new.payment_id),
            amount_paid: Set(new.amount_paid),
            enrolled_at: Set(Utc::now()),
        };
        Self::outcome(
            enrollment::Entity::insert(model)
                .exec_without_returning(&*self.db)
                .await,
        )
    }

    #[instrument(skip(self, new), fields(payment_id = %new.provider_payment_id))]
    async fn insert_payment(&self, new: NewPayment) -> Result<InsertOutcome, DbErr> {
        let model = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id),
            course_id: Set(new.course_id),
            provider_order_id: Set(new.provider_order_id),
            provider_payment_id: Set(new.provider_payment_id),
            amount: Set(new.amount),
            currency: Set(new.currency),
            status: Set(new.status),
            created_at: Set(Utc::now()),
        };
        Self::outcome(
            payment::Entity::insert(model)
                .exec_without_returning(&*self.db)
                .await,
        )
    }

    async fn ping(&self) -> Result<(), DbErr> {
        self.db.ping().await
    }
}
