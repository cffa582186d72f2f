//! Precomputation helpers for building an authorization context.
//!
//! The notification engine never looks these up itself: the viewer's group
//! memberships and secure-category set are inputs, computed here (or by an
//! equivalent cache) before the engine is constructed.

use rusqlite::Connection;

/// Returns the ids of every group the user belongs to, ascending.
///
/// # Errors
///
/// Propagates the underlying SQLite error on query failure.
pub fn group_ids_for_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT group_id FROM group_users WHERE user_id = ?1 ORDER BY group_id ASC",
    )?;
    let rows = stmt.query_map([user_id], |row| row.get(0))?;
    rows.collect()
}

/// Returns the ids of every read-restricted category the user can access,
/// ascending. Access to a restricted category flows through group grants in
/// `category_groups`.
///
/// Unrestricted categories are never in this set; the visibility rules
/// admit them without it.
///
/// # Errors
///
/// Propagates the underlying SQLite error on query failure.
pub fn secure_category_ids_for_user(
    conn: &Connection,
    user_id: i64,
) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT c.id
         FROM categories c
         JOIN category_groups cg ON cg.category_id = c.id
         JOIN group_users gu ON gu.group_id = cg.group_id
         WHERE c.read_restricted = 1 AND gu.user_id = ?1
         ORDER BY c.id ASC",
    )?;
    let rows = stmt.query_map([user_id], |row| row.get(0))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_migrations;
    use rusqlite::Connection;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");
        conn
    }

    #[test]
    fn group_ids_reflect_membership() {
        let conn = test_db();
        conn.execute_batch(
            "INSERT INTO users (username) VALUES ('eve'), ('mallory');
             INSERT INTO groups (name) VALUES ('staff'), ('beta'), ('empty');
             INSERT INTO group_users (group_id, user_id) VALUES (1, 1), (2, 1), (2, 2);",
        )
        .expect("seed should succeed");

        assert_eq!(group_ids_for_user(&conn, 1).unwrap(), vec![1, 2]);
        assert_eq!(group_ids_for_user(&conn, 2).unwrap(), vec![2]);
        assert!(group_ids_for_user(&conn, 99).unwrap().is_empty());
    }

    #[test]
    fn secure_categories_flow_through_group_grants() {
        let conn = test_db();
        conn.execute_batch(
            "INSERT INTO users (username) VALUES ('eve'), ('outsider');
             INSERT INTO groups (name) VALUES ('insiders');
             INSERT INTO group_users (group_id, user_id) VALUES (1, 1);
             INSERT INTO categories (name, read_restricted) VALUES
                 ('public', 0), ('secret', 1), ('locked', 1);
             INSERT INTO category_groups (category_id, group_id) VALUES (2, 1);",
        )
        .expect("seed should succeed");

        // Only the restricted category with a matching group grant shows up;
        // the public category and the unreachable restricted one never do.
        assert_eq!(secure_category_ids_for_user(&conn, 1).unwrap(), vec![2]);
        assert!(secure_category_ids_for_user(&conn, 2).unwrap().is_empty());
    }
}
