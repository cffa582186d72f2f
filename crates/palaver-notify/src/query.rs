//! Assembly of concrete fetch plans from the visibility predicate plus
//! per-call filters: type restriction, read state, pagination, and the
//! three ordering modes.

use palaver_types::NotificationType;

use crate::model::SELECT_COLUMNS;
use crate::visibility::{placeholders, SqlValue, VisibilityFilter};

/// Read-state restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    /// Only unread notifications.
    Unread,
    /// Only read notifications.
    Read,
    /// No restriction.
    #[default]
    Any,
}

impl ReadFilter {
    pub(crate) fn clause(self) -> Option<&'static str> {
        match self {
            ReadFilter::Unread => Some("n.read = 0"),
            ReadFilter::Read => Some("n.read = 1"),
            ReadFilter::Any => None,
        }
    }
}

/// Ordering mode for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Oldest first.
    CreatedAsc,
    /// Newest first.
    #[default]
    CreatedDesc,
    /// Unread-high-priority first, then other unread, then the rest; each
    /// tier newest first. See [`ListOptions::deprioritized_types`].
    Prioritized,
}

/// Parameters for [`crate::Inbox::list`]. All independently composable.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    /// Restrict to these types. Empty means unrestricted — which also
    /// activates like suppression for viewers who opted out of likes; an
    /// explicit type filter bypasses that suppression entirely.
    pub types: Vec<NotificationType>,
    /// Read-state restriction.
    pub read: ReadFilter,
    /// Page size.
    pub limit: i64,
    /// Page offset.
    pub offset: i64,
    /// Ordering mode.
    pub order: Order,
    /// Types demoted out of the unread tier under [`Order::Prioritized`].
    /// Demotion only reorders; it never removes rows from the result.
    pub deprioritized_types: Vec<NotificationType>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            read: ReadFilter::Any,
            limit: 30,
            offset: 0,
            order: Order::CreatedDesc,
            deprioritized_types: Vec::new(),
        }
    }
}

/// A fully rendered SELECT with its bind values in placeholder order.
#[derive(Debug, Clone)]
pub(crate) struct FetchPlan {
    pub(crate) sql: String,
    pub(crate) params: Vec<SqlValue>,
}

/// Welds the visibility predicate to the per-call filters.
///
/// `excluded_types` is the scope-level like suppression computed by the
/// façade (empty when it does not apply); it removes rows outright, unlike
/// the ordering-only demotion in `opts.deprioritized_types`.
pub(crate) fn assemble(
    filter: &VisibilityFilter,
    viewer_id: i64,
    opts: &ListOptions,
    excluded_types: &[NotificationType],
) -> FetchPlan {
    let mut sql = format!(
        "SELECT {} FROM notifications n {} WHERE n.user_id = ? AND ({})",
        SELECT_COLUMNS,
        VisibilityFilter::JOINS,
        filter.sql()
    );
    let mut params = vec![SqlValue::Int(viewer_id)];
    params.extend_from_slice(filter.params());

    if !opts.types.is_empty() {
        sql.push_str(&format!(
            " AND n.notification_type IN ({})",
            placeholders(opts.types.len())
        ));
        params.extend(opts.types.iter().map(|t| SqlValue::Int(t.code())));
    }

    if !excluded_types.is_empty() {
        sql.push_str(&format!(
            " AND n.notification_type NOT IN ({})",
            placeholders(excluded_types.len())
        ));
        params.extend(excluded_types.iter().map(|t| SqlValue::Int(t.code())));
    }

    if let Some(clause) = opts.read.clause() {
        sql.push_str(" AND ");
        sql.push_str(clause);
    }

    sql.push_str(" ORDER BY ");
    match opts.order {
        Order::CreatedAsc => sql.push_str("n.created_at ASC, n.id ASC"),
        Order::CreatedDesc => sql.push_str("n.created_at DESC, n.id DESC"),
        Order::Prioritized => {
            sql.push_str("(n.high_priority = 1 AND n.read = 0) DESC, ");
            if opts.deprioritized_types.is_empty() {
                sql.push_str("(n.read = 0) DESC, ");
            } else {
                sql.push_str(&format!(
                    "(n.read = 0 AND n.notification_type NOT IN ({})) DESC, ",
                    placeholders(opts.deprioritized_types.len())
                ));
                params.extend(
                    opts.deprioritized_types
                        .iter()
                        .map(|t| SqlValue::Int(t.code())),
                );
            }
            sql.push_str("n.created_at DESC, n.id DESC");
        }
    }

    sql.push_str(" LIMIT ? OFFSET ?");
    params.push(SqlValue::Int(opts.limit));
    params.push(SqlValue::Int(opts.offset));

    FetchPlan { sql, params }
}
