use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entities::insulin_logs;
use crate::entities::prelude::*;

pub struct InsulinLogRepository {
    conn: DatabaseConnection,
}

impl InsulinLogRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Record a dose. The timestamp is assigned here; entries are immutable
    /// once written.
    pub async fn add(&self, user_id: i32, units: f64, kind: &str) -> Result<insulin_logs::Model> {
        let active = insulin_logs::ActiveModel {
            user_id: Set(user_id),
            units: Set(units),
            kind: Set(kind.to_string()),
            timestamp: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let entry = active
            .insert(&self.conn)
            .await
            .context("Failed to insert insulin log")?;

        Ok(entry)
    }

    /// Most recent entries for a user, newest first.
    pub async fn recent(&self, user_id: i32, limit: u64) -> Result<Vec<insulin_logs::Model>> {
        let entries = InsulinLogs::find()
            .filter(insulin_logs::Column::UserId.eq(user_id))
            .order_by_desc(insulin_logs::Column::Timestamp)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query insulin logs")?;

        Ok(entries)
    }
}
