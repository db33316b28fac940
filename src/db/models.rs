use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub id: i64,
    pub username: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ImageUpsert {
    pub username: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Raw workflow message cached per user so repeat visits skip the flow.
#[derive(Debug, Clone, FromRow)]
pub struct UserDetailsRow {
    pub username: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserDetailsInsert {
    pub username: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}
