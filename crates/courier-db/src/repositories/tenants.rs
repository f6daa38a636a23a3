//! Tenant directory repository
//!
//! Read-only lookups over sites, channel sessions, and the global provider
//! configuration. Credential columns are decrypted here, so the rest of
//! the pipeline only ever sees plaintext in process memory.

use crate::crypto::SecretCipher;
use crate::entities::{channel_session, global_provider_config, site};
use crate::repositories::core_err;
use async_trait::async_trait;
use courier_core::errors::CoreResult;
use courier_core::model::{ChannelSession, GlobalProviderConfig, Site};
use courier_core::store::TenantDirectory;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

/// SeaORM-backed tenant lookups with transparent credential decryption
pub struct SeaOrmTenantDirectory {
    db: Arc<DatabaseConnection>,
    cipher: SecretCipher,
}

impl SeaOrmTenantDirectory {
    pub fn new(db: Arc<DatabaseConnection>, cipher: SecretCipher) -> Self {
        Self { db, cipher }
    }

    fn site_to_domain(&self, model: site::Model) -> CoreResult<Site> {
        Ok(Site {
            id: model.id,
            site_name: model.site_name,
            api_key_hash: model.api_key_hash,
            sendgrid_api_key: self
                .cipher
                .decrypt_opt(model.sendgrid_api_key)
                .map_err(courier_core::CoreError::from)?,
            email_from_address: model.email_from_address,
            email_from_name: model.email_from_name,
            whatsapp_session_name: model.whatsapp_session_name,
            is_active: model.is_active,
        })
    }

    fn session_to_domain(&self, model: channel_session::Model) -> CoreResult<ChannelSession> {
        Ok(ChannelSession {
            site_user_id: model.site_user_id,
            session_name: model.session_name,
            session_api_key: self
                .cipher
                .decrypt_opt(model.session_api_key)
                .map_err(courier_core::CoreError::from)?,
            is_active: model.is_active,
        })
    }
}

#[async_trait]
impl TenantDirectory for SeaOrmTenantDirectory {
    async fn find_active_site(&self, site_id: Uuid) -> CoreResult<Option<Site>> {
        let model = site::Entity::find_by_id(site_id)
            .filter(site::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await
            .map_err(core_err)?;

        model.map(|m| self.site_to_domain(m)).transpose()
    }

    async fn find_active_site_by_api_key_hash(&self, hash: &str) -> CoreResult<Option<Site>> {
        let model = site::Entity::find()
            .filter(site::Column::ApiKeyHash.eq(hash))
            .filter(site::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await
            .map_err(core_err)?;

        model.map(|m| self.site_to_domain(m)).transpose()
    }

    async fn find_active_session(&self, session_name: &str) -> CoreResult<Option<ChannelSession>> {
        let model = channel_session::Entity::find()
            .filter(channel_session::Column::SessionName.eq(session_name))
            .filter(channel_session::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await
            .map_err(core_err)?;

        model.map(|m| self.session_to_domain(m)).transpose()
    }

    async fn active_global_config(&self) -> CoreResult<Option<GlobalProviderConfig>> {
        let model = global_provider_config::Entity::find()
            .filter(global_provider_config::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await
            .map_err(core_err)?;

        let Some(model) = model else {
            return Ok(None);
        };

        Ok(Some(GlobalProviderConfig {
            sendgrid_api_key: self
                .cipher
                .decrypt_opt(model.sendgrid_api_key)
                .map_err(courier_core::CoreError::from)?,
            email_from_address: model.email_from_address,
            email_from_name: model.email_from_name,
            is_active: model.is_active,
        }))
    }
}
