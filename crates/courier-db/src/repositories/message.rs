//! Message log repository

use crate::entities::message::{self, Entity as MessageEntity};
use crate::repositories::core_err;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::errors::{CoreError, CoreResult};
use courier_core::model::{FailureType, Message, MessageStatus};
use courier_core::store::MessageStore;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use std::sync::Arc;

const TERMINAL: [message::MessageStatus; 3] = [
    message::MessageStatus::Delivered,
    message::MessageStatus::Bounced,
    message::MessageStatus::Rejected,
];

/// SeaORM-backed message log
pub struct SeaOrmMessageStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmMessageStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn base_update(message_id: &str) -> sea_orm::UpdateMany<MessageEntity> {
        MessageEntity::update_many()
            .col_expr(message::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(message::Column::MessageId.eq(message_id))
    }
}

#[async_trait]
impl MessageStore for SeaOrmMessageStore {
    async fn insert(&self, entity: &Message) -> CoreResult<()> {
        if entity.requires_site() && entity.site_id.is_none() {
            return Err(CoreError::validation(
                "WHATSAPP messages require a tenant binding",
            ));
        }

        let active: message::ActiveModel = entity.clone().into();
        active.insert(self.db.as_ref()).await.map_err(core_err)?;
        Ok(())
    }

    async fn find(&self, message_id: &str) -> CoreResult<Option<Message>> {
        let model = MessageEntity::find_by_id(message_id)
            .one(self.db.as_ref())
            .await
            .map_err(core_err)?;

        match model {
            Some(m) => Ok(Some(m.to_domain()?)),
            None => Ok(None),
        }
    }

    async fn claim_for_retry(&self, message_id: &str, from: MessageStatus) -> CoreResult<bool> {
        let from: message::MessageStatus = from.into();
        let result = Self::base_update(message_id)
            .col_expr(
                message::Column::Status,
                message::MessageStatus::Retrying.as_enum(),
            )
            .col_expr(
                message::Column::FailureType,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                message::Column::RetryCount,
                Expr::col(message::Column::RetryCount).add(1),
            )
            .filter(message::Column::Status.eq(from))
            .exec(self.db.as_ref())
            .await
            .map_err(core_err)?;

        Ok(result.rows_affected > 0)
    }

    async fn release_to_pending(&self, message_id: &str) -> CoreResult<bool> {
        let result = Self::base_update(message_id)
            .col_expr(
                message::Column::Status,
                message::MessageStatus::Pending.as_enum(),
            )
            .col_expr(
                message::Column::FailureType,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                message::Column::ErrorMessage,
                Expr::value(Option::<String>::None),
            )
            .filter(message::Column::Status.eq(message::MessageStatus::Retrying))
            .exec(self.db.as_ref())
            .await
            .map_err(core_err)?;

        Ok(result.rows_affected > 0)
    }

    async fn mark_delivered(&self, message_id: &str, at: DateTime<Utc>) -> CoreResult<bool> {
        let result = Self::base_update(message_id)
            .col_expr(
                message::Column::Status,
                message::MessageStatus::Delivered.as_enum(),
            )
            .col_expr(message::Column::SentAt, Expr::value(at))
            .col_expr(message::Column::DeliveredAt, Expr::value(at))
            .col_expr(
                message::Column::FailureType,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                message::Column::ErrorMessage,
                Expr::value(Option::<String>::None),
            )
            .filter(message::Column::Status.is_not_in(TERMINAL))
            .exec(self.db.as_ref())
            .await
            .map_err(core_err)?;

        Ok(result.rows_affected > 0)
    }

    async fn mark_consumer_failed(&self, message_id: &str, error: &str) -> CoreResult<bool> {
        let result = Self::base_update(message_id)
            .col_expr(
                message::Column::Status,
                message::MessageStatus::Failed.as_enum(),
            )
            .col_expr(
                message::Column::FailureType,
                message::FailureType::Consumer.as_enum(),
            )
            .col_expr(message::Column::ErrorMessage, Expr::value(error))
            .filter(message::Column::Status.is_not_in(TERMINAL))
            .exec(self.db.as_ref())
            .await
            .map_err(core_err)?;

        Ok(result.rows_affected > 0)
    }

    async fn record_publish_failure(&self, message_id: &str, error: &str) -> CoreResult<bool> {
        let result = Self::base_update(message_id)
            .col_expr(
                message::Column::Status,
                message::MessageStatus::Failed.as_enum(),
            )
            .col_expr(
                message::Column::FailureType,
                message::FailureType::Publish.as_enum(),
            )
            .col_expr(message::Column::ErrorMessage, Expr::value(error))
            .filter(message::Column::Status.eq(message::MessageStatus::Retrying))
            .exec(self.db.as_ref())
            .await
            .map_err(core_err)?;

        Ok(result.rows_affected > 0)
    }

    async fn note_retries_exhausted(
        &self,
        message_id: &str,
        failure: FailureType,
    ) -> CoreResult<()> {
        // The row is claimed (RETRYING) by the caller; no competing writer
        // exists for the error column between the read and the update.
        let prior = MessageEntity::find_by_id(message_id)
            .one(self.db.as_ref())
            .await
            .map_err(core_err)?
            .and_then(|m| m.error_message);

        let error = match prior {
            Some(prior) if !prior.is_empty() => {
                format!("Max retries exceeded; last error: {prior}")
            }
            _ => "Max retries exceeded".to_string(),
        };

        let failure: message::FailureType = failure.into();
        Self::base_update(message_id)
            .col_expr(
                message::Column::Status,
                message::MessageStatus::Failed.as_enum(),
            )
            .col_expr(message::Column::FailureType, failure.as_enum())
            .col_expr(message::Column::ErrorMessage, Expr::value(error))
            .filter(message::Column::Status.is_not_in(TERMINAL))
            .exec(self.db.as_ref())
            .await
            .map_err(core_err)?;

        Ok(())
    }

    async fn promote_scheduled(&self, message_id: &str) -> CoreResult<bool> {
        let result = Self::base_update(message_id)
            .col_expr(
                message::Column::Status,
                message::MessageStatus::Pending.as_enum(),
            )
            .col_expr(
                message::Column::ScheduledAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(
                message::Column::FailureType,
                Expr::value(Option::<String>::None),
            )
            .filter(message::Column::Status.eq(message::MessageStatus::Scheduled))
            .exec(self.db.as_ref())
            .await
            .map_err(core_err)?;

        Ok(result.rows_affected > 0)
    }

    async fn failed_batch(
        &self,
        failure: FailureType,
        max_retries: i32,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> CoreResult<Vec<Message>> {
        let failure: message::FailureType = failure.into();
        let models = MessageEntity::find()
            .filter(message::Column::Status.eq(message::MessageStatus::Failed))
            .filter(message::Column::FailureType.eq(failure))
            .filter(message::Column::RetryCount.lt(max_retries))
            .filter(message::Column::CreatedAt.lt(older_than))
            .order_by_asc(message::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(core_err)?;

        models
            .into_iter()
            .map(|m| m.to_domain().map_err(Into::into))
            .collect()
    }

    async fn stuck_pending_batch(
        &self,
        older_than: DateTime<Utc>,
        max_retries: i32,
        limit: u64,
    ) -> CoreResult<Vec<Message>> {
        let models = MessageEntity::find()
            .filter(message::Column::Status.eq(message::MessageStatus::Pending))
            .filter(message::Column::RetryCount.lt(max_retries))
            .filter(message::Column::UpdatedAt.lt(older_than))
            .order_by_asc(message::Column::UpdatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(core_err)?;

        models
            .into_iter()
            .map(|m| m.to_domain().map_err(Into::into))
            .collect()
    }

    async fn due_scheduled_batch(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> CoreResult<Vec<Message>> {
        let models = MessageEntity::find()
            .filter(message::Column::Status.eq(message::MessageStatus::Scheduled))
            .filter(message::Column::ScheduledAt.lte(now))
            .order_by_asc(message::Column::ScheduledAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(core_err)?;

        models
            .into_iter()
            .map(|m| m.to_domain().map_err(Into::into))
            .collect()
    }
}
