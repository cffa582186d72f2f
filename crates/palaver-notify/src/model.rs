//! The notification row model.

use palaver_types::NotificationType;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A notification as stored, owned by exactly one user.
///
/// The engine never creates or mutates these; it only decides which ones a
/// viewer may observe and in what order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    /// Internal database ID. Ids are assigned in creation order, which is
    /// what the high-water-mark counts rely on.
    pub id: i64,
    /// ID of the owning user.
    pub user_id: i64,
    /// The notification type.
    pub notification_type: NotificationType,
    /// The discussion topic this notification points at, if any.
    pub topic_id: Option<i64>,
    /// Opaque structured payload. The engine interprets only `badge_id`.
    pub data: Value,
    /// Whether the owner has read this notification.
    pub read: bool,
    /// Whether the producer flagged this notification high priority.
    pub high_priority: bool,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// Column list matching [`map_row`]. Every listing query selects exactly
/// these, in this order.
pub(crate) const SELECT_COLUMNS: &str =
    "n.id, n.user_id, n.notification_type, n.topic_id, n.data, n.read, n.high_priority, n.created_at";

pub(crate) fn map_row(row: &Row) -> rusqlite::Result<Notification> {
    let type_code: i64 = row.get(2)?;
    let notification_type = NotificationType::from_code(type_code).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Integer, Box::new(e))
    })?;

    let data_str: String = row.get(4)?;
    let data: Value = serde_json::from_str(&data_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        notification_type,
        topic_id: row.get(3)?,
        data,
        read: row.get(5)?,
        high_priority: row.get(6)?,
        created_at: row.get(7)?,
    })
}
