//! Site (tenant) entity model for SeaORM

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sites")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub site_name: String,

    /// SHA-256 hex digest of the site key
    pub api_key_hash: String,

    /// Possibly encrypted at rest; decrypted by the tenant directory
    pub sendgrid_api_key: Option<String>,

    pub email_from_address: Option<String>,

    pub email_from_name: Option<String>,

    pub whatsapp_session_name: Option<String>,

    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,

    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
