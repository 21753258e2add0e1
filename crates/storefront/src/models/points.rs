//! Points ledger entry.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use marvo_core::{OrderId, PointsEntryId, PointsReason, UserId};

#[derive(Debug, Clone, FromRow)]
pub struct PointsEntry {
    pub id: PointsEntryId,
    pub user_id: UserId,
    pub points: i64,
    pub reason: PointsReason,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}
