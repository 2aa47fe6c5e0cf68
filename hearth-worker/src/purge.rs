/// Expired join-code purge
///
/// Expired codes are already refused by the API; this only keeps the table
/// small. A single `DELETE` per tick, no batching.

use crate::jobs::{JobResult, ScheduledJob};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hearth_shared::models::join_code::JoinCode;
use sqlx::PgPool;

pub struct JoinCodePurge {
    db: PgPool,
}

impl JoinCodePurge {
    pub fn new(db: PgPool) -> Self {
        JoinCodePurge { db }
    }
}

#[async_trait]
impl ScheduledJob for JoinCodePurge {
    fn name(&self) -> &'static str {
        "join_code_purge"
    }

    async fn run(&self, now: DateTime<Utc>) -> JobResult<u64> {
        let deleted = JoinCode::delete_expired(&self.db, now).await?;

        if deleted > 0 {
            tracing::debug!(deleted, "Expired join codes purged");
        }

        Ok(deleted)
    }
}
