use sea_orm::DbBackend;
use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();

        // Postgres gets real enum types; SQLite stores the values as text.
        if backend == DbBackend::Postgres {
            manager
                .create_type(
                    Type::create()
                        .as_enum(ChannelEnum::Table)
                        .values([ChannelEnum::Email, ChannelEnum::Whatsapp])
                        .to_owned(),
                )
                .await?;

            manager
                .create_type(
                    Type::create()
                        .as_enum(MessageStatusEnum::Table)
                        .values([
                            MessageStatusEnum::Pending,
                            MessageStatusEnum::Retrying,
                            MessageStatusEnum::Scheduled,
                            MessageStatusEnum::Sent,
                            MessageStatusEnum::Delivered,
                            MessageStatusEnum::Failed,
                            MessageStatusEnum::Bounced,
                            MessageStatusEnum::Rejected,
                        ])
                        .to_owned(),
                )
                .await?;

            manager
                .create_type(
                    Type::create()
                        .as_enum(FailureTypeEnum::Table)
                        .values([FailureTypeEnum::Publish, FailureTypeEnum::Consumer])
                        .to_owned(),
                )
                .await?;

            manager
                .create_type(
                    Type::create()
                        .as_enum(HistorySourceEnum::Table)
                        .values([
                            HistorySourceEnum::Api,
                            HistorySourceEnum::Trigger,
                            HistorySourceEnum::Worker,
                        ])
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Messages::MessageId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Messages::SiteId).uuid())
                    .col(
                        ColumnDef::new(Messages::Channel)
                            .enumeration(
                                ChannelEnum::Table,
                                [ChannelEnum::Email, ChannelEnum::Whatsapp],
                            )
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Messages::Status)
                            .enumeration(
                                MessageStatusEnum::Table,
                                [
                                    MessageStatusEnum::Pending,
                                    MessageStatusEnum::Retrying,
                                    MessageStatusEnum::Scheduled,
                                    MessageStatusEnum::Sent,
                                    MessageStatusEnum::Delivered,
                                    MessageStatusEnum::Failed,
                                    MessageStatusEnum::Bounced,
                                    MessageStatusEnum::Rejected,
                                ],
                            )
                            .not_null(),
                    )
                    .col(ColumnDef::new(Messages::Recipient).string().not_null())
                    .col(ColumnDef::new(Messages::Subject).string())
                    .col(ColumnDef::new(Messages::Body).text())
                    .col(
                        ColumnDef::new(Messages::IsHtml)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Messages::ImageUrl).string())
                    .col(ColumnDef::new(Messages::VideoUrl).string())
                    .col(ColumnDef::new(Messages::DocumentUrl).string())
                    .col(ColumnDef::new(Messages::FileName).string())
                    .col(ColumnDef::new(Messages::Caption).string())
                    .col(ColumnDef::new(Messages::FromEmail).string())
                    .col(ColumnDef::new(Messages::FromName).string())
                    .col(ColumnDef::new(Messages::WhatsappSessionName).string())
                    .col(
                        ColumnDef::new(Messages::Metadata)
                            .json()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Messages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Messages::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Messages::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Messages::SentAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Messages::DeliveredAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Messages::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Messages::FailureType).enumeration(
                            FailureTypeEnum::Table,
                            [FailureTypeEnum::Publish, FailureTypeEnum::Consumer],
                        ),
                    )
                    .col(ColumnDef::new(Messages::ErrorMessage).text())
                    .to_owned(),
            )
            .await?;

        // Retry scan: FAILED rows by failure type and age.
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_retry_scan")
                    .table(Messages::Table)
                    .col(Messages::Status)
                    .col(Messages::FailureType)
                    .col(Messages::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Scheduler scan: SCHEDULED rows by due time.
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_scheduled_scan")
                    .table(Messages::Table)
                    .col(Messages::Status)
                    .col(Messages::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        // Publish-rescue scan: PENDING rows by time in state.
        manager
            .create_index(
                Index::create()
                    .name("idx_messages_pending_age")
                    .table(Messages::Table)
                    .col(Messages::Status)
                    .col(Messages::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_messages_site_id")
                    .table(Messages::Table)
                    .col(Messages::SiteId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MessageStatusHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageStatusHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MessageStatusHistory::MessageId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MessageStatusHistory::Status)
                            .enumeration(
                                MessageStatusEnum::Table,
                                [
                                    MessageStatusEnum::Pending,
                                    MessageStatusEnum::Retrying,
                                    MessageStatusEnum::Scheduled,
                                    MessageStatusEnum::Sent,
                                    MessageStatusEnum::Delivered,
                                    MessageStatusEnum::Failed,
                                    MessageStatusEnum::Bounced,
                                    MessageStatusEnum::Rejected,
                                ],
                            )
                            .not_null(),
                    )
                    .col(ColumnDef::new(MessageStatusHistory::ErrorMessage).text())
                    .col(
                        ColumnDef::new(MessageStatusHistory::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MessageStatusHistory::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MessageStatusHistory::Source)
                            .enumeration(
                                HistorySourceEnum::Table,
                                [
                                    HistorySourceEnum::Api,
                                    HistorySourceEnum::Trigger,
                                    HistorySourceEnum::Worker,
                                ],
                            )
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_status_history_message_id")
                            .from(MessageStatusHistory::Table, MessageStatusHistory::MessageId)
                            .to(Messages::Table, Messages::MessageId)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Dedup lookup: latest entry per (message_id, status).
        manager
            .create_index(
                Index::create()
                    .name("idx_status_history_dedup")
                    .table(MessageStatusHistory::Table)
                    .col(MessageStatusHistory::MessageId)
                    .col(MessageStatusHistory::Status)
                    .col(MessageStatusHistory::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Sites::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sites::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sites::SiteName).string().not_null())
                    .col(ColumnDef::new(Sites::ApiKeyHash).string().not_null())
                    .col(ColumnDef::new(Sites::SendgridApiKey).string())
                    .col(ColumnDef::new(Sites::EmailFromAddress).string())
                    .col(ColumnDef::new(Sites::EmailFromName).string())
                    .col(ColumnDef::new(Sites::WhatsappSessionName).string())
                    .col(
                        ColumnDef::new(Sites::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Sites::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Sites::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ChannelSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChannelSessions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ChannelSessions::SiteUserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChannelSessions::SessionName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ChannelSessions::SessionApiKey).string())
                    .col(
                        ColumnDef::new(ChannelSessions::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ChannelSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ChannelSessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GlobalProviderConfig::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GlobalProviderConfig::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GlobalProviderConfig::SendgridApiKey).string())
                    .col(ColumnDef::new(GlobalProviderConfig::EmailFromAddress).string())
                    .col(ColumnDef::new(GlobalProviderConfig::EmailFromName).string())
                    .col(
                        ColumnDef::new(GlobalProviderConfig::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(GlobalProviderConfig::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Uniqueness applies to active rows only; soft-deleted rows may
        // share names and key hashes with their replacements.
        let conn = manager.get_connection();
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX uq_sites_api_key_hash ON sites (api_key_hash) WHERE is_active",
        )
        .await?;
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX uq_sites_site_name ON sites (site_name) WHERE is_active",
        )
        .await?;
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX uq_channel_sessions_binding ON channel_sessions (site_user_id, session_name) WHERE is_active",
        )
        .await?;
        conn.execute_unprepared(
            "CREATE INDEX idx_channel_sessions_name ON channel_sessions (session_name) WHERE is_active",
        )
        .await?;

        // Database-side safety net: row status updates also land in the
        // history table. The application ledger reconciles the dual write
        // through its one-second dedup window, mirrored here.
        if backend == DbBackend::Postgres {
            conn.execute_unprepared(
                r#"
                CREATE OR REPLACE FUNCTION courier_log_status_change() RETURNS trigger AS $$
                BEGIN
                    IF OLD.status IS DISTINCT FROM NEW.status AND NOT EXISTS (
                        SELECT 1 FROM message_status_history
                        WHERE message_id = NEW.message_id
                          AND status = NEW.status
                          AND timestamp > now() - interval '1 second'
                    ) THEN
                        INSERT INTO message_status_history
                            (message_id, status, error_message, retry_count, timestamp, source)
                        VALUES
                            (NEW.message_id, NEW.status, NEW.error_message, NEW.retry_count, now(), 'TRIGGER');
                    END IF;
                    RETURN NEW;
                END;
                $$ LANGUAGE plpgsql;
                "#,
            )
            .await?;
            conn.execute_unprepared(
                r#"
                CREATE TRIGGER trg_messages_status_history
                AFTER UPDATE OF status ON messages
                FOR EACH ROW
                EXECUTE FUNCTION courier_log_status_change();
                "#,
            )
            .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let conn = manager.get_connection();

        if backend == DbBackend::Postgres {
            conn.execute_unprepared("DROP TRIGGER IF EXISTS trg_messages_status_history ON messages")
                .await?;
            conn.execute_unprepared("DROP FUNCTION IF EXISTS courier_log_status_change")
                .await?;
        }

        manager
            .drop_table(Table::drop().table(GlobalProviderConfig::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChannelSessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MessageStatusHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await?;

        if backend == DbBackend::Postgres {
            manager
                .drop_type(Type::drop().name(HistorySourceEnum::Table).to_owned())
                .await?;
            manager
                .drop_type(Type::drop().name(FailureTypeEnum::Table).to_owned())
                .await?;
            manager
                .drop_type(Type::drop().name(MessageStatusEnum::Table).to_owned())
                .await?;
            manager
                .drop_type(Type::drop().name(ChannelEnum::Table).to_owned())
                .await?;
        }

        Ok(())
    }
}

#[derive(Iden)]
enum Messages {
    Table,
    MessageId,
    SiteId,
    Channel,
    Status,
    Recipient,
    Subject,
    Body,
    IsHtml,
    ImageUrl,
    VideoUrl,
    DocumentUrl,
    FileName,
    Caption,
    FromEmail,
    FromName,
    WhatsappSessionName,
    Metadata,
    CreatedAt,
    UpdatedAt,
    ScheduledAt,
    SentAt,
    DeliveredAt,
    RetryCount,
    FailureType,
    ErrorMessage,
}

#[derive(Iden)]
enum MessageStatusHistory {
    Table,
    Id,
    MessageId,
    Status,
    ErrorMessage,
    RetryCount,
    Timestamp,
    Source,
}

#[derive(Iden)]
enum Sites {
    Table,
    Id,
    SiteName,
    ApiKeyHash,
    SendgridApiKey,
    EmailFromAddress,
    EmailFromName,
    WhatsappSessionName,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ChannelSessions {
    Table,
    Id,
    SiteUserId,
    SessionName,
    SessionApiKey,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum GlobalProviderConfig {
    Table,
    Id,
    SendgridApiKey,
    EmailFromAddress,
    EmailFromName,
    IsActive,
    UpdatedAt,
}

#[derive(Iden)]
enum ChannelEnum {
    #[iden = "channel"]
    Table,
    #[iden = "EMAIL"]
    Email,
    #[iden = "WHATSAPP"]
    Whatsapp,
}

#[derive(Iden)]
enum MessageStatusEnum {
    #[iden = "message_status"]
    Table,
    #[iden = "PENDING"]
    Pending,
    #[iden = "RETRYING"]
    Retrying,
    #[iden = "SCHEDULED"]
    Scheduled,
    #[iden = "SENT"]
    Sent,
    #[iden = "DELIVERED"]
    Delivered,
    #[iden = "FAILED"]
    Failed,
    #[iden = "BOUNCED"]
    Bounced,
    #[iden = "REJECTED"]
    Rejected,
}

#[derive(Iden)]
enum FailureTypeEnum {
    #[iden = "failure_type"]
    Table,
    #[iden = "PUBLISH"]
    Publish,
    #[iden = "CONSUMER"]
    Consumer,
}

#[derive(Iden)]
enum HistorySourceEnum {
    #[iden = "history_source"]
    Table,
    #[iden = "API"]
    Api,
    #[iden = "TRIGGER"]
    Trigger,
    #[iden = "WORKER"]
    Worker,
}
