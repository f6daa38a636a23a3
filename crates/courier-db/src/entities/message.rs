//! Message entity model for SeaORM

use courier_core::model as domain;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub message_id: String,

    pub site_id: Option<Uuid>,

    pub channel: Channel,

    pub status: MessageStatus,

    pub recipient: String,

    pub subject: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub body: Option<String>,

    pub is_html: bool,

    pub image_url: Option<String>,

    pub video_url: Option<String>,

    pub document_url: Option<String>,

    pub file_name: Option<String>,

    pub caption: Option<String>,

    pub from_email: Option<String>,

    pub from_name: Option<String>,

    pub whatsapp_session_name: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub metadata: Json,

    pub created_at: chrono::DateTime<chrono::Utc>,

    pub updated_at: chrono::DateTime<chrono::Utc>,

    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,

    pub sent_at: Option<chrono::DateTime<chrono::Utc>>,

    pub delivered_at: Option<chrono::DateTime<chrono::Utc>>,

    pub retry_count: i32,

    pub failure_type: Option<FailureType>,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::status_history::Entity")]
    StatusHistory,
}

impl Related<super::status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Channel enum for database storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "channel")]
pub enum Channel {
    #[sea_orm(string_value = "EMAIL")]
    Email,
    #[sea_orm(string_value = "WHATSAPP")]
    Whatsapp,
}

/// Message status enum for database storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "message_status")]
pub enum MessageStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "RETRYING")]
    Retrying,
    #[sea_orm(string_value = "SCHEDULED")]
    Scheduled,
    #[sea_orm(string_value = "SENT")]
    Sent,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "FAILED")]
    Failed,
    #[sea_orm(string_value = "BOUNCED")]
    Bounced,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

/// Failure type enum for database storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "failure_type")]
pub enum FailureType {
    #[sea_orm(string_value = "PUBLISH")]
    Publish,
    #[sea_orm(string_value = "CONSUMER")]
    Consumer,
}

impl From<domain::Channel> for Channel {
    fn from(channel: domain::Channel) -> Self {
        match channel {
            domain::Channel::Email => Channel::Email,
            domain::Channel::Whatsapp => Channel::Whatsapp,
        }
    }
}

impl From<Channel> for domain::Channel {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Email => domain::Channel::Email,
            Channel::Whatsapp => domain::Channel::Whatsapp,
        }
    }
}

impl From<domain::MessageStatus> for MessageStatus {
    fn from(status: domain::MessageStatus) -> Self {
        match status {
            domain::MessageStatus::Pending => MessageStatus::Pending,
            domain::MessageStatus::Retrying => MessageStatus::Retrying,
            domain::MessageStatus::Scheduled => MessageStatus::Scheduled,
            domain::MessageStatus::Sent => MessageStatus::Sent,
            domain::MessageStatus::Delivered => MessageStatus::Delivered,
            domain::MessageStatus::Failed => MessageStatus::Failed,
            domain::MessageStatus::Bounced => MessageStatus::Bounced,
            domain::MessageStatus::Rejected => MessageStatus::Rejected,
        }
    }
}

impl From<MessageStatus> for domain::MessageStatus {
    fn from(status: MessageStatus) -> Self {
        match status {
            MessageStatus::Pending => domain::MessageStatus::Pending,
            MessageStatus::Retrying => domain::MessageStatus::Retrying,
            MessageStatus::Scheduled => domain::MessageStatus::Scheduled,
            MessageStatus::Sent => domain::MessageStatus::Sent,
            MessageStatus::Delivered => domain::MessageStatus::Delivered,
            MessageStatus::Failed => domain::MessageStatus::Failed,
            MessageStatus::Bounced => domain::MessageStatus::Bounced,
            MessageStatus::Rejected => domain::MessageStatus::Rejected,
        }
    }
}

impl From<domain::FailureType> for FailureType {
    fn from(failure: domain::FailureType) -> Self {
        match failure {
            domain::FailureType::Publish => FailureType::Publish,
            domain::FailureType::Consumer => FailureType::Consumer,
        }
    }
}

impl From<FailureType> for domain::FailureType {
    fn from(failure: FailureType) -> Self {
        match failure {
            FailureType::Publish => domain::FailureType::Publish,
            FailureType::Consumer => domain::FailureType::Consumer,
        }
    }
}

impl TryFrom<Model> for domain::Message {
    type Error = crate::error::DatabaseError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let metadata: HashMap<String, String> = serde_json::from_value(model.metadata.clone())
            .map_err(|e| {
                crate::error::DatabaseError::Serialization(format!(
                    "Failed to deserialize message metadata: {e}"
                ))
            })?;

        Ok(Self {
            message_id: model.message_id,
            site_id: model.site_id,
            channel: model.channel.into(),
            status: model.status.into(),
            recipient: model.recipient,
            subject: model.subject,
            body: model.body,
            is_html: model.is_html,
            image_url: model.image_url,
            video_url: model.video_url,
            document_url: model.document_url,
            file_name: model.file_name,
            caption: model.caption,
            from_email: model.from_email,
            from_name: model.from_name,
            whatsapp_session_name: model.whatsapp_session_name,
            metadata,
            created_at: model.created_at,
            updated_at: model.updated_at,
            scheduled_at: model.scheduled_at,
            sent_at: model.sent_at,
            delivered_at: model.delivered_at,
            retry_count: model.retry_count,
            failure_type: model.failure_type.map(Into::into),
            error_message: model.error_message,
        })
    }
}

impl From<domain::Message> for ActiveModel {
    fn from(message: domain::Message) -> Self {
        Self {
            message_id: Set(message.message_id),
            site_id: Set(message.site_id),
            channel: Set(message.channel.into()),
            status: Set(message.status.into()),
            recipient: Set(message.recipient),
            subject: Set(message.subject),
            body: Set(message.body),
            is_html: Set(message.is_html),
            image_url: Set(message.image_url),
            video_url: Set(message.video_url),
            document_url: Set(message.document_url),
            file_name: Set(message.file_name),
            caption: Set(message.caption),
            from_email: Set(message.from_email),
            from_name: Set(message.from_name),
            whatsapp_session_name: Set(message.whatsapp_session_name),
            metadata: Set(serde_json::to_value(&message.metadata).unwrap_or_default()),
            created_at: Set(message.created_at),
            updated_at: Set(message.updated_at),
            scheduled_at: Set(message.scheduled_at),
            sent_at: Set(message.sent_at),
            delivered_at: Set(message.delivered_at),
            retry_count: Set(message.retry_count),
            failure_type: Set(message.failure_type.map(Into::into)),
            error_message: Set(message.error_message),
        }
    }
}

impl Model {
    /// Convert to domain entity
    pub fn to_domain(self) -> Result<domain::Message, crate::error::DatabaseError> {
        self.try_into()
    }
}
