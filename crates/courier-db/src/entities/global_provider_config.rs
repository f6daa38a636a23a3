//! Global provider fallback configuration entity model for SeaORM

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "global_provider_config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Possibly encrypted at rest; decrypted by the tenant directory
    pub sendgrid_api_key: Option<String>,

    pub email_from_address: Option<String>,

    pub email_from_name: Option<String>,

    pub is_active: bool,

    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
