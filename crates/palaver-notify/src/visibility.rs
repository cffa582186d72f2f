//! The per-viewer visibility predicate.
//!
//! [`VisibilityFilter::build`] derives, from a viewer's authorization
//! context, a reusable SQL fragment selecting exactly the notifications that
//! viewer may observe across the join {notifications, topics, categories}.
//! Every read operation in this crate reuses the same fragment, so a
//! notification that fails visibility can never surface through any entry
//! point.
//!
//! The fragment is composed from a tagged AND/OR clause tree and flattened
//! once; bind values travel separately from the SQL text and nothing from
//! the viewer is ever interpolated into the statement.

use palaver_types::{Archetype, NotificationType, NotifySettings};
use rusqlite::types::ToSqlOutput;
use rusqlite::ToSql;

/// A viewer identity plus its precomputed authorization context.
///
/// The engine computes none of this itself: secure category ids and group
/// memberships are inputs, resolved by the caller (see `palaver-db`'s
/// helpers) at call time. A filter built from one `Viewer` must never be
/// reused for another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    /// The viewing user's id. Every query is scoped to notifications this
    /// user owns.
    pub user_id: i64,
    /// Staff (admin or moderator) see notifications on soft-deleted topics.
    pub staff: bool,
    /// Ids of read-restricted categories this viewer can access. Empty
    /// means restricted categories are never visible to them.
    pub secure_category_ids: Vec<i64>,
    /// Ids of groups this viewer belongs to, for private-message group
    /// grants.
    pub group_ids: Vec<i64>,
    /// High-water mark: the last notification id the viewer acknowledged.
    /// `None` behaves as 0 (everything unread counts).
    pub seen_notification_id: Option<i64>,
    /// Whether the viewer opted out of like notifications.
    pub like_notifications_disabled: bool,
}

impl Viewer {
    /// The high-water mark with the absent case normalized to 0.
    pub fn high_water_mark(&self) -> i64 {
        self.seen_notification_id.unwrap_or(0)
    }
}

/// An owned bind value. Owned (rather than `Box<dyn ToSql>`) so a rendered
/// filter stays cloneable across the operations that share it.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Int(v) => v.to_sql(),
            SqlValue::Text(v) => v.to_sql(),
        }
    }
}

/// Returns `?, ?, ...` for `n` bind positions.
pub(crate) fn placeholders(n: usize) -> String {
    let mut out = String::with_capacity(n * 3);
    for i in 0..n {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}

/// A node in the predicate tree. Leaves carry a SQL fragment and its bind
/// values; interior nodes combine children with AND or OR.
#[derive(Debug, Clone)]
enum Clause {
    Fragment(String, Vec<SqlValue>),
    All(Vec<Clause>),
    Any(Vec<Clause>),
}

impl Clause {
    fn fragment(sql: &str) -> Self {
        Clause::Fragment(sql.to_string(), Vec::new())
    }

    fn render(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        match self {
            Clause::Fragment(text, values) => {
                sql.push_str(text);
                params.extend(values.iter().cloned());
            }
            Clause::All(children) => render_joined(children, " AND ", "1", sql, params),
            Clause::Any(children) => render_joined(children, " OR ", "0", sql, params),
        }
    }
}

fn render_joined(
    children: &[Clause],
    sep: &str,
    empty: &str,
    sql: &mut String,
    params: &mut Vec<SqlValue>,
) {
    if children.is_empty() {
        sql.push_str(empty);
        return;
    }
    sql.push('(');
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            sql.push_str(sep);
        }
        child.render(sql, params);
    }
    sql.push(')');
}

/// `column IN (?, ...)` over a non-empty id list.
fn in_list(column: &str, ids: &[i64]) -> Clause {
    debug_assert!(!ids.is_empty());
    Clause::Fragment(
        format!("{} IN ({})", column, placeholders(ids.len())),
        ids.iter().copied().map(SqlValue::Int).collect(),
    )
}

/// The rendered visibility predicate for one (viewer, settings) pairing.
///
/// Immutable once built; the aggregation façade builds it exactly once per
/// engine instance and threads it into every query.
#[derive(Debug, Clone)]
pub struct VisibilityFilter {
    sql: String,
    params: Vec<SqlValue>,
}

impl VisibilityFilter {
    /// The canonical join every operation queries over. `n` is
    /// notifications, `t` topics, `c` categories. LEFT joins: a missing
    /// topic row (hard delete) leaves `t.id` NULL rather than dropping the
    /// notification row from the scan.
    pub const JOINS: &'static str = "LEFT JOIN topics t ON t.id = n.topic_id \
         LEFT JOIN categories c ON c.id = t.category_id";

    /// Builds the predicate for a viewer under the given settings.
    ///
    /// Rule structure, ANDed at the top level:
    ///
    /// 1. Topic gating: no topic attached, or the topic row exists, is not
    ///    soft-deleted (staff bypass this clause only), and passes the
    ///    access branch matching its archetype — category access for
    ///    regular topics, allow-list membership for private messages.
    /// 2. Badge gating, independent of topic: a badge-granted notification
    ///    requires badges to be enabled site-wide and its badge row to
    ///    still exist and be enabled.
    pub fn build(viewer: &Viewer, settings: &NotifySettings) -> Self {
        let mut rendered_sql = String::new();
        let mut params = Vec::new();
        let tree = Clause::All(vec![
            Self::topic_gate(viewer),
            Self::badge_gate(settings),
        ]);
        tree.render(&mut rendered_sql, &mut params);
        Self {
            sql: rendered_sql,
            params,
        }
    }

    fn topic_gate(viewer: &Viewer) -> Clause {
        let mut with_topic = vec![Clause::fragment("t.id IS NOT NULL")];

        // Soft-delete exclusion. Staff skip this clause; the `t.id IS NOT
        // NULL` above still excludes hard-deleted topics for them.
        if !viewer.staff {
            with_topic.push(Clause::fragment("t.deleted_at IS NULL"));
        }

        with_topic.push(Clause::Any(vec![
            Self::regular_branch(viewer),
            Self::private_message_branch(viewer),
        ]));

        Clause::Any(vec![
            Clause::fragment("n.topic_id IS NULL"),
            Clause::All(with_topic),
        ])
    }

    fn regular_branch(viewer: &Viewer) -> Clause {
        let mut category_ok = vec![
            Clause::fragment("t.category_id IS NULL"),
            Clause::fragment("c.read_restricted = 0"),
        ];
        // An empty secure set must degrade to "not read-restricted" only,
        // never render as `IN ()`.
        if !viewer.secure_category_ids.is_empty() {
            category_ok.push(in_list("c.id", &viewer.secure_category_ids));
        }

        Clause::All(vec![
            Clause::Fragment(
                "t.archetype = ?".to_string(),
                vec![SqlValue::Text(Archetype::Regular.as_str().to_string())],
            ),
            Clause::Any(category_ok),
        ])
    }

    fn private_message_branch(viewer: &Viewer) -> Clause {
        let mut allowed = vec![Clause::Fragment(
            "EXISTS (SELECT 1 FROM topic_allowed_users tau \
             WHERE tau.topic_id = t.id AND tau.user_id = ?)"
                .to_string(),
            vec![SqlValue::Int(viewer.user_id)],
        )];

        if !viewer.group_ids.is_empty() {
            allowed.push(Clause::Fragment(
                format!(
                    "EXISTS (SELECT 1 FROM topic_allowed_groups tag \
                     WHERE tag.topic_id = t.id AND tag.group_id IN ({}))",
                    placeholders(viewer.group_ids.len())
                ),
                viewer.group_ids.iter().copied().map(SqlValue::Int).collect(),
            ));
        }

        Clause::All(vec![
            Clause::Fragment(
                "t.archetype = ?".to_string(),
                vec![SqlValue::Text(
                    Archetype::PrivateMessage.as_str().to_string(),
                )],
            ),
            Clause::Any(allowed),
        ])
    }

    fn badge_gate(settings: &NotifySettings) -> Clause {
        let not_badge = Clause::Fragment(
            "n.notification_type <> ?".to_string(),
            vec![SqlValue::Int(NotificationType::BadgeGranted.code())],
        );

        if !settings.badges_enabled {
            // Badges off site-wide: badge-granted notifications disappear
            // for everyone, staff included.
            return not_badge;
        }

        Clause::Any(vec![
            not_badge,
            Clause::fragment(
                "EXISTS (SELECT 1 FROM badges b \
                 WHERE b.id = json_extract(n.data, '$.badge_id') AND b.enabled = 1)",
            ),
        ])
    }

    /// The predicate as a SQL fragment over the [`Self::JOINS`] aliases.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind values for [`Self::sql`], in placeholder order.
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer() -> Viewer {
        Viewer {
            user_id: 7,
            staff: false,
            secure_category_ids: vec![],
            group_ids: vec![],
            seen_notification_id: None,
            like_notifications_disabled: false,
        }
    }

    #[test]
    fn placeholder_count_matches_params() {
        let cases = [
            viewer(),
            Viewer {
                staff: true,
                ..viewer()
            },
            Viewer {
                secure_category_ids: vec![3, 4, 5],
                group_ids: vec![10, 11],
                ..viewer()
            },
        ];
        for v in &cases {
            for settings in [
                NotifySettings::default(),
                NotifySettings {
                    badges_enabled: false,
                    ..NotifySettings::default()
                },
            ] {
                let filter = VisibilityFilter::build(v, &settings);
                let holes = filter.sql().matches('?').count();
                assert_eq!(
                    holes,
                    filter.params().len(),
                    "placeholders and bind values must agree: {}",
                    filter.sql()
                );
            }
        }
    }

    #[test]
    fn empty_secure_set_renders_no_in_clause() {
        let filter = VisibilityFilter::build(&viewer(), &NotifySettings::default());
        assert!(
            !filter.sql().contains("c.id IN"),
            "empty secure set must not render an IN clause: {}",
            filter.sql()
        );
        assert!(filter.sql().contains("c.read_restricted = 0"));
    }

    #[test]
    fn secure_set_renders_in_clause() {
        let v = Viewer {
            secure_category_ids: vec![3, 9],
            ..viewer()
        };
        let filter = VisibilityFilter::build(&v, &NotifySettings::default());
        assert!(filter.sql().contains("c.id IN (?, ?)"));
        assert!(filter.params().contains(&SqlValue::Int(3)));
        assert!(filter.params().contains(&SqlValue::Int(9)));
    }

    #[test]
    fn staff_skip_soft_delete_clause_only() {
        let non_staff = VisibilityFilter::build(&viewer(), &NotifySettings::default());
        let staff = VisibilityFilter::build(
            &Viewer {
                staff: true,
                ..viewer()
            },
            &NotifySettings::default(),
        );
        assert!(non_staff.sql().contains("t.deleted_at IS NULL"));
        assert!(!staff.sql().contains("t.deleted_at IS NULL"));
        // Hard-delete exclusion stays for staff.
        assert!(staff.sql().contains("t.id IS NOT NULL"));
    }

    #[test]
    fn badge_gate_depends_on_global_flag() {
        let enabled = VisibilityFilter::build(&viewer(), &NotifySettings::default());
        assert!(enabled.sql().contains("b.enabled = 1"));

        let disabled = VisibilityFilter::build(
            &viewer(),
            &NotifySettings {
                badges_enabled: false,
                ..NotifySettings::default()
            },
        );
        assert!(!disabled.sql().contains("b.enabled"));
        assert!(disabled.sql().contains("n.notification_type <> ?"));
    }

    #[test]
    fn group_grants_render_only_when_present() {
        let no_groups = VisibilityFilter::build(&viewer(), &NotifySettings::default());
        assert!(!no_groups.sql().contains("topic_allowed_groups"));

        let with_groups = VisibilityFilter::build(
            &Viewer {
                group_ids: vec![2],
                ..viewer()
            },
            &NotifySettings::default(),
        );
        assert!(with_groups.sql().contains("topic_allowed_groups"));
    }

    #[test]
    fn high_water_mark_defaults_to_zero() {
        assert_eq!(viewer().high_water_mark(), 0);
        let seen = Viewer {
            seen_notification_id: Some(41),
            ..viewer()
        };
        assert_eq!(seen.high_water_mark(), 41);
    }
}
