//! Status history repository (append-only)

use crate::entities::status_history::{self, Entity as HistoryEntity};
use crate::repositories::core_err;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::errors::CoreResult;
use courier_core::model::{MessageStatus, StatusHistoryEntry};
use courier_core::store::HistoryStore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use std::sync::Arc;

/// SeaORM-backed status history. Rows are inserted and read, never updated
/// or deleted.
pub struct SeaOrmHistoryStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmHistoryStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for SeaOrmHistoryStore {
    async fn append(&self, entry: &StatusHistoryEntry) -> CoreResult<()> {
        let active: status_history::ActiveModel = entry.into();
        active.insert(self.db.as_ref()).await.map_err(core_err)?;
        Ok(())
    }

    async fn last_timestamp(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> CoreResult<Option<DateTime<Utc>>> {
        let status: crate::entities::message::MessageStatus = status.into();
        let model = HistoryEntity::find()
            .filter(status_history::Column::MessageId.eq(message_id))
            .filter(status_history::Column::Status.eq(status))
            .order_by_desc(status_history::Column::Timestamp)
            .one(self.db.as_ref())
            .await
            .map_err(core_err)?;

        Ok(model.map(|m| m.timestamp))
    }

    async fn has_success_entry(&self, message_id: &str) -> CoreResult<bool> {
        let count = HistoryEntity::find()
            .filter(status_history::Column::MessageId.eq(message_id))
            .filter(status_history::Column::Status.is_in([
                crate::entities::message::MessageStatus::Sent,
                crate::entities::message::MessageStatus::Delivered,
            ]))
            .count(self.db.as_ref())
            .await
            .map_err(core_err)?;

        Ok(count > 0)
    }

    async fn entries(&self, message_id: &str) -> CoreResult<Vec<StatusHistoryEntry>> {
        let models = HistoryEntity::find()
            .filter(status_history::Column::MessageId.eq(message_id))
            .order_by_asc(status_history::Column::Timestamp)
            .all(self.db.as_ref())
            .await
            .map_err(core_err)?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}
