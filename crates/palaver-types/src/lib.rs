//! Shared types and constants for the Palaver notification engine.
//!
//! This crate provides the foundational types used across the workspace:
//! the closed notification-type enumeration (with its "like" subset), topic
//! archetypes, and the engine-wide runtime settings.
//!
//! This crate depends on nothing else in the workspace, keeping the
//! dependency graph clean and free of cycles.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of notification types.
///
/// Stored in the database as an integer code. The numbering is part of the
/// persisted format and must never be reused for a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum NotificationType {
    /// The user was @-mentioned in a post.
    Mentioned = 1,
    /// Someone replied to the user's post.
    Replied = 2,
    /// The user's post was quoted.
    Quoted = 3,
    /// A staff member edited the user's post.
    Edited = 4,
    /// Someone liked the user's post.
    Liked = 5,
    /// The user received a personal message.
    PrivateMessage = 6,
    /// The user was invited into a personal message.
    InvitedToPrivateMessage = 7,
    /// The user was granted a badge. Visibility of these is additionally
    /// gated on the badge still existing and being enabled.
    BadgeGranted = 12,
    /// Several likes rolled up into one notification.
    LikedConsolidated = 19,
    /// A bookmark reminder fired.
    BookmarkReminder = 20,
}

/// Returned when a stored integer code does not map to a known type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown notification type code: {0}")]
pub struct UnknownTypeCode(pub i64);

impl NotificationType {
    /// Returns the persisted integer code for this type.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Attempts to convert a persisted integer code back to a type.
    pub fn from_code(code: i64) -> Result<Self, UnknownTypeCode> {
        match code {
            1 => Ok(Self::Mentioned),
            2 => Ok(Self::Replied),
            3 => Ok(Self::Quoted),
            4 => Ok(Self::Edited),
            5 => Ok(Self::Liked),
            6 => Ok(Self::PrivateMessage),
            7 => Ok(Self::InvitedToPrivateMessage),
            12 => Ok(Self::BadgeGranted),
            19 => Ok(Self::LikedConsolidated),
            20 => Ok(Self::BookmarkReminder),
            other => Err(UnknownTypeCode(other)),
        }
    }

    /// The subset of types that represent likes. These are the types a user
    /// can opt out of, and the types the prioritized inbox may demote.
    pub fn like_types() -> &'static [NotificationType] {
        &[Self::Liked, Self::LikedConsolidated]
    }

    /// Whether this type belongs to the like subset.
    pub fn is_like(self) -> bool {
        Self::like_types().contains(&self)
    }
}

/// Topic archetype. Exactly one access branch of the visibility rules
/// applies to a topic depending on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    /// An ordinary public (or category-restricted) discussion.
    Regular,
    /// A personal message with an explicit allow-list of users and groups.
    PrivateMessage,
}

impl Archetype {
    /// The string stored in the `topics.archetype` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::PrivateMessage => "private_message",
        }
    }

    /// Attempts to parse the persisted archetype string.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "regular" => Some(Self::Regular),
            "private_message" => Some(Self::PrivateMessage),
            _ => None,
        }
    }
}

/// Runtime tunables for the notification engine.
///
/// These are site-wide inputs the engine consumes but never computes:
/// whether the badge system is enabled at all, and how large an unread
/// backlog the counting operations are willing to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifySettings {
    /// Whether badges are enabled site-wide. When false, badge-granted
    /// notifications are invisible to everyone, staff included.
    pub badges_enabled: bool,

    /// Cap applied before unread counting. A user who never acknowledges
    /// notifications would otherwise make every badge query scan an
    /// unbounded backlog.
    pub max_unread_backlog: i64,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            badges_enabled: true,
            max_unread_backlog: 99,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_round_trip() {
        for ty in [
            NotificationType::Mentioned,
            NotificationType::Replied,
            NotificationType::Quoted,
            NotificationType::Edited,
            NotificationType::Liked,
            NotificationType::PrivateMessage,
            NotificationType::InvitedToPrivateMessage,
            NotificationType::BadgeGranted,
            NotificationType::LikedConsolidated,
            NotificationType::BookmarkReminder,
        ] {
            assert_eq!(NotificationType::from_code(ty.code()), Ok(ty));
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(NotificationType::from_code(0), Err(UnknownTypeCode(0)));
        assert_eq!(NotificationType::from_code(99), Err(UnknownTypeCode(99)));
    }

    #[test]
    fn like_subset() {
        assert!(NotificationType::Liked.is_like());
        assert!(NotificationType::LikedConsolidated.is_like());
        assert!(!NotificationType::Mentioned.is_like());
        assert!(!NotificationType::BadgeGranted.is_like());
    }

    #[test]
    fn archetype_strings() {
        assert_eq!(Archetype::Regular.as_str(), "regular");
        assert_eq!(Archetype::PrivateMessage.as_str(), "private_message");
        assert_eq!(Archetype::from_str_opt("regular"), Some(Archetype::Regular));
        assert_eq!(
            Archetype::from_str_opt("private_message"),
            Some(Archetype::PrivateMessage)
        );
        assert_eq!(Archetype::from_str_opt("banner"), None);
    }

    #[test]
    fn default_settings() {
        let settings = NotifySettings::default();
        assert!(settings.badges_enabled);
        assert_eq!(settings.max_unread_backlog, 99);
    }
}
