//! The aggregation façade: the named read operations callers drive unread
//! badges, inboxes, and digests with.
//!
//! An [`Inbox`] is built once per (viewer, settings) pairing and memoizes
//! the visibility predicate; every operation reuses it verbatim. Instances
//! hold no connection and no mutable state, so one instance can serve any
//! number of read-only queries under whatever consistency scope the caller
//! established.

use std::collections::BTreeMap;

use palaver_types::{NotificationType, NotifySettings};
use rusqlite::{params_from_iter, Connection};

use crate::error::NotifyError;
use crate::model::{map_row, Notification};
use crate::query::{assemble, ListOptions, ReadFilter};
use crate::visibility::{SqlValue, Viewer, VisibilityFilter};

/// Per-viewer notification read engine.
#[derive(Debug, Clone)]
pub struct Inbox {
    viewer: Viewer,
    settings: NotifySettings,
    filter: VisibilityFilter,
}

impl Inbox {
    /// Builds the engine for a viewer, deriving and memoizing the
    /// visibility predicate. Never reuse an `Inbox` across viewers or
    /// across authorization-context changes; build a fresh one instead.
    pub fn new(viewer: Viewer, settings: NotifySettings) -> Self {
        let filter = VisibilityFilter::build(&viewer, &settings);
        Self {
            viewer,
            settings,
            filter,
        }
    }

    /// The viewer this engine answers for.
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    /// The memoized visibility predicate.
    pub fn filter(&self) -> &VisibilityFilter {
        &self.filter
    }

    /// Lists visible notifications with the given filters and ordering.
    ///
    /// When the caller passes no type filter and the viewer has opted out
    /// of like notifications, like-type rows are dropped from scope
    /// entirely; an explicit type filter bypasses that suppression.
    pub fn list(
        &self,
        conn: &Connection,
        opts: &ListOptions,
    ) -> Result<Vec<Notification>, NotifyError> {
        let excluded: &[NotificationType] =
            if opts.types.is_empty() && self.viewer.like_notifications_disabled {
                NotificationType::like_types()
            } else {
                &[]
            };

        let plan = assemble(&self.filter, self.viewer.user_id, opts, excluded);
        tracing::debug!(user_id = self.viewer.user_id, ?opts, "listing notifications");

        let mut stmt = conn.prepare(&plan.sql)?;
        let rows = stmt.query_map(params_from_iter(plan.params.iter()), map_row)?;
        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Recent notification ids with their read state, for sync-style
    /// consumers.
    ///
    /// Two independently capped sub-queries, both id-descending: unread
    /// high-priority ids first, then everything else. Each is capped at
    /// `limit` on its own, so the result may hold up to `2 * limit`
    /// entries, and an unread high-priority id always lands in the first
    /// section.
    pub fn recent_ids_with_read_status(
        &self,
        conn: &Connection,
        limit: i64,
    ) -> Result<Vec<(i64, bool)>, NotifyError> {
        let urgent_sql = format!(
            "SELECT n.id, n.read FROM notifications n {} \
             WHERE n.user_id = ? AND ({}) AND n.read = 0 AND n.high_priority = 1 \
             ORDER BY n.id DESC LIMIT ?",
            VisibilityFilter::JOINS,
            self.filter.sql()
        );
        let rest_sql = format!(
            "SELECT n.id, n.read FROM notifications n {} \
             WHERE n.user_id = ? AND ({}) AND NOT (n.read = 0 AND n.high_priority = 1) \
             ORDER BY n.id DESC LIMIT ?",
            VisibilityFilter::JOINS,
            self.filter.sql()
        );

        let mut params = self.base_params();
        params.push(SqlValue::Int(limit));

        let mut out = Vec::new();
        for sql in [&urgent_sql, &rest_sql] {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, bool>(1)?))
            })?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }

    /// Counts visible notifications, optionally restricted by read state.
    pub fn total_count(&self, conn: &Connection, read: ReadFilter) -> Result<i64, NotifyError> {
        let mut sql = format!(
            "SELECT COUNT(*) FROM notifications n {} WHERE n.user_id = ? AND ({})",
            VisibilityFilter::JOINS,
            self.filter.sql()
        );
        if let Some(clause) = read.clause() {
            sql.push_str(" AND ");
            sql.push_str(clause);
        }
        self.count(conn, &sql, self.base_params())
    }

    /// Counts unread notifications above the viewer's high-water mark,
    /// scanning at most `max_unread_backlog` rows.
    pub fn unread_count(&self, conn: &Connection) -> Result<i64, NotifyError> {
        let sql = format!(
            "SELECT COUNT(*) FROM ( \
               SELECT 1 FROM notifications n {} \
               WHERE n.user_id = ? AND ({}) AND n.read = 0 AND n.id > ? \
               LIMIT ?)",
            VisibilityFilter::JOINS,
            self.filter.sql()
        );
        let mut params = self.base_params();
        params.push(SqlValue::Int(self.viewer.high_water_mark()));
        params.push(SqlValue::Int(self.settings.max_unread_backlog));
        self.count(conn, &sql, params)
    }

    /// Counts unread high-priority notifications. Deliberately ignores the
    /// high-water mark and the backlog cap; see the low-priority variant
    /// for the bounded counterpart.
    pub fn unread_high_priority_count(&self, conn: &Connection) -> Result<i64, NotifyError> {
        let sql = format!(
            "SELECT COUNT(*) FROM notifications n {} \
             WHERE n.user_id = ? AND ({}) AND n.read = 0 AND n.high_priority = 1",
            VisibilityFilter::JOINS,
            self.filter.sql()
        );
        self.count(conn, &sql, self.base_params())
    }

    /// Counts unread low-priority notifications above the high-water mark,
    /// scanning at most `max_unread_backlog` rows.
    pub fn unread_low_priority_count(&self, conn: &Connection) -> Result<i64, NotifyError> {
        let sql = format!(
            "SELECT COUNT(*) FROM ( \
               SELECT 1 FROM notifications n {} \
               WHERE n.user_id = ? AND ({}) AND n.read = 0 AND n.high_priority = 0 \
                 AND n.id > ? \
               LIMIT ?)",
            VisibilityFilter::JOINS,
            self.filter.sql()
        );
        let mut params = self.base_params();
        params.push(SqlValue::Int(self.viewer.high_water_mark()));
        params.push(SqlValue::Int(self.settings.max_unread_backlog));
        self.count(conn, &sql, params)
    }

    /// Counts unread notifications of one type, optionally only those
    /// created strictly after `since` (ISO 8601).
    pub fn unread_count_for_type(
        &self,
        conn: &Connection,
        notification_type: NotificationType,
        since: Option<&str>,
    ) -> Result<i64, NotifyError> {
        let mut sql = format!(
            "SELECT COUNT(*) FROM notifications n {} \
             WHERE n.user_id = ? AND ({}) AND n.read = 0 AND n.notification_type = ?",
            VisibilityFilter::JOINS,
            self.filter.sql()
        );
        let mut params = self.base_params();
        params.push(SqlValue::Int(notification_type.code()));
        if let Some(since) = since {
            sql.push_str(" AND n.created_at > ?");
            params.push(SqlValue::Text(since.to_string()));
        }
        self.count(conn, &sql, params)
    }

    /// Unread counts grouped by type. Only types with at least one unread,
    /// visible notification appear; each type's contribution is capped at
    /// `max_unread_backlog` before grouping, so every entry agrees with an
    /// independent capped per-type count.
    pub fn grouped_unread_counts(
        &self,
        conn: &Connection,
    ) -> Result<BTreeMap<NotificationType, i64>, NotifyError> {
        let sql = format!(
            "SELECT notification_type, COUNT(*) FROM ( \
               SELECT n.notification_type AS notification_type, \
                      ROW_NUMBER() OVER ( \
                          PARTITION BY n.notification_type ORDER BY n.id DESC) AS rn \
               FROM notifications n {} \
               WHERE n.user_id = ? AND ({}) AND n.read = 0 \
             ) ranked WHERE ranked.rn <= ? \
             GROUP BY notification_type",
            VisibilityFilter::JOINS,
            self.filter.sql()
        );
        let mut params = self.base_params();
        params.push(SqlValue::Int(self.settings.max_unread_backlog));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let code: i64 = row.get(0)?;
            let ty = NotificationType::from_code(code).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Integer,
                    Box::new(e),
                )
            })?;
            Ok((ty, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (ty, count) = row?;
            counts.insert(ty, count);
        }
        tracing::debug!(
            user_id = self.viewer.user_id,
            types = counts.len(),
            "grouped unread counts"
        );
        Ok(counts)
    }

    /// Counts unread personal-message notifications above the high-water
    /// mark.
    pub fn new_personal_messages_count(&self, conn: &Connection) -> Result<i64, NotifyError> {
        let sql = format!(
            "SELECT COUNT(*) FROM notifications n {} \
             WHERE n.user_id = ? AND ({}) AND n.read = 0 AND n.id > ? \
               AND n.notification_type = ?",
            VisibilityFilter::JOINS,
            self.filter.sql()
        );
        let mut params = self.base_params();
        params.push(SqlValue::Int(self.viewer.high_water_mark()));
        params.push(SqlValue::Int(NotificationType::PrivateMessage.code()));
        self.count(conn, &sql, params)
    }

    /// The largest visible notification id, optionally only above
    /// `since_id`. `None` when nothing matches.
    pub fn max_id(
        &self,
        conn: &Connection,
        since_id: Option<i64>,
    ) -> Result<Option<i64>, NotifyError> {
        let mut sql = format!(
            "SELECT MAX(n.id) FROM notifications n {} WHERE n.user_id = ? AND ({})",
            VisibilityFilter::JOINS,
            self.filter.sql()
        );
        let mut params = self.base_params();
        if let Some(since_id) = since_id {
            sql.push_str(" AND n.id > ?");
            params.push(SqlValue::Int(since_id));
        }
        let max: Option<i64> =
            conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(max)
    }

    /// Owner scoping plus the visibility bind values, in the order the
    /// operation SQL templates expect.
    fn base_params(&self) -> Vec<SqlValue> {
        let mut params = Vec::with_capacity(self.filter.params().len() + 3);
        params.push(SqlValue::Int(self.viewer.user_id));
        params.extend_from_slice(self.filter.params());
        params
    }

    fn count(
        &self,
        conn: &Connection,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<i64, NotifyError> {
        let count: i64 = conn.query_row(sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count)
    }
}
