//! Status history entity model for SeaORM

use courier_core::model as domain;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "message_status_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub message_id: String,

    pub status: super::message::MessageStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    pub retry_count: i32,

    pub timestamp: chrono::DateTime<chrono::Utc>,

    pub source: HistorySource,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::message::Entity",
        from = "Column::MessageId",
        to = "super::message::Column::MessageId"
    )]
    Message,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// History source enum for database storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "history_source")]
pub enum HistorySource {
    #[sea_orm(string_value = "API")]
    Api,
    #[sea_orm(string_value = "TRIGGER")]
    Trigger,
    #[sea_orm(string_value = "WORKER")]
    Worker,
}

impl From<domain::HistorySource> for HistorySource {
    fn from(source: domain::HistorySource) -> Self {
        match source {
            domain::HistorySource::Api => HistorySource::Api,
            domain::HistorySource::Trigger => HistorySource::Trigger,
            domain::HistorySource::Worker => HistorySource::Worker,
        }
    }
}

impl From<HistorySource> for domain::HistorySource {
    fn from(source: HistorySource) -> Self {
        match source {
            HistorySource::Api => domain::HistorySource::Api,
            HistorySource::Trigger => domain::HistorySource::Trigger,
            HistorySource::Worker => domain::HistorySource::Worker,
        }
    }
}

impl From<&domain::StatusHistoryEntry> for ActiveModel {
    fn from(entry: &domain::StatusHistoryEntry) -> Self {
        Self {
            id: NotSet,
            message_id: Set(entry.message_id.clone()),
            status: Set(entry.status.into()),
            error_message: Set(entry.error_message.clone()),
            retry_count: Set(entry.retry_count),
            timestamp: Set(entry.timestamp),
            source: Set(entry.source.into()),
        }
    }
}

impl From<Model> for domain::StatusHistoryEntry {
    fn from(model: Model) -> Self {
        Self {
            message_id: model.message_id,
            status: model.status.into(),
            error_message: model.error_message,
            retry_count: model.retry_count,
            timestamp: model.timestamp,
            source: model.source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_conversion_round_trip() {
        for source in [
            domain::HistorySource::Api,
            domain::HistorySource::Trigger,
            domain::HistorySource::Worker,
        ] {
            let db_source: HistorySource = source.into();
            let back: domain::HistorySource = db_source.into();
            assert_eq!(source, back);
        }
    }
}
