//! Notification entity - append-only messages to a user. Only `read` ever changes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Recipient
    pub user_id: String,
    pub title: String,
    pub message: String,
    /// Event family, e.g. `ORDER`, `BOOKING`, `PAYMENT`
    pub kind: String,
    /// Tracking id or resource id the notification refers to
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
