//! Notification visibility and retrieval for the Palaver platform.
//!
//! Decides, for a given viewer, which notifications they are permitted to
//! see, and answers the read/aggregate query family over that visible set:
//! paginated and prioritized listings, unread counts by type and priority,
//! grouped counts, recent-id snapshots, and the high-water-mark max id.
//!
//! # Structure
//!
//! - [`Viewer`] / [`VisibilityFilter`] — the per-viewer visibility
//!   predicate, built once from a precomputed authorization context.
//! - [`ListOptions`] and friends — per-call filter and ordering parameters.
//! - [`Inbox`] — the operation façade; every query threads the memoized
//!   predicate, so nothing invisible can surface through any entry point.
//!
//! # Usage
//!
//! ```rust,ignore
//! use palaver_notify::{Inbox, ListOptions, Viewer};
//! use palaver_types::NotifySettings;
//!
//! let viewer = Viewer {
//!     user_id,
//!     staff: false,
//!     secure_category_ids: palaver_db::secure_category_ids_for_user(&conn, user_id)?,
//!     group_ids: palaver_db::group_ids_for_user(&conn, user_id)?,
//!     seen_notification_id,
//!     like_notifications_disabled: false,
//! };
//! let inbox = Inbox::new(viewer, NotifySettings::default());
//! let unread = inbox.unread_count(&conn)?;
//! let page = inbox.list(&conn, &ListOptions::default())?;
//! ```

mod error;
mod inbox;
mod model;
mod query;
mod visibility;

pub use error::NotifyError;
pub use inbox::Inbox;
pub use model::Notification;
pub use query::{ListOptions, Order, ReadFilter};
pub use visibility::{SqlValue, Viewer, VisibilityFilter};
