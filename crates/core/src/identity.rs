//! Session identity as delivered by the external OAuth provider.
//!
//! The collaboration layer never runs an auth flow. It receives a
//! [`SessionUser`] once a session is established and derives the
//! [`Participant`] shape (id, display name, colour tag) that travels on
//! every activity event.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::UserId;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Dashboard role attached to a session user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Editor,
    #[default]
    Viewer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Editor => "editor",
            UserRole::Viewer => "viewer",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "editor" => Ok(UserRole::Editor),
            "viewer" => Ok(UserRole::Viewer),
            other => Err(CoreError::Validation(format!(
                "Unknown role '{other}'. Must be one of: admin, editor, viewer"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Session user
// ---------------------------------------------------------------------------

/// Fallback id when the provider supplies neither an id nor an email.
pub const UNKNOWN_USER_ID: &str = "unknown";

/// Fallback display name.
pub const UNKNOWN_USER_NAME: &str = "Unknown User";

/// Role label recorded when the provider supplies none.
pub const DEFAULT_ROLE_LABEL: &str = "user";

/// The identity provider's view of the signed-in user.
///
/// Every field is optional because providers differ in what they return;
/// use the accessor methods to get the resolved values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub role: Option<String>,
}

impl SessionUser {
    /// Stable user id: provider id, else email, else `"unknown"`.
    pub fn user_id(&self) -> UserId {
        non_empty(&self.id)
            .or_else(|| non_empty(&self.email))
            .unwrap_or(UNKNOWN_USER_ID)
            .to_string()
    }

    /// Display name: provider name, else email, else `"Unknown User"`.
    pub fn display_name(&self) -> String {
        non_empty(&self.name)
            .or_else(|| non_empty(&self.email))
            .unwrap_or(UNKNOWN_USER_NAME)
            .to_string()
    }

    /// Role for permission checks. Missing or unrecognised roles fall back
    /// to viewer.
    pub fn role(&self) -> UserRole {
        self.role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or_default()
    }

    /// The provider's role string as recorded in the edit history, or
    /// `"user"` when none is given.
    pub fn role_label(&self) -> String {
        non_empty(&self.role).unwrap_or(DEFAULT_ROLE_LABEL).to_string()
    }

    /// The participant shape used on the wire and in lock/presence state.
    pub fn participant(&self) -> Participant {
        Participant::new(self.user_id(), self.display_name())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Colour palette for participant avatars, indexed by a hash of the user id.
pub const USER_COLORS: &[&str] = &[
    "blue", "green", "yellow", "purple", "pink", "indigo", "red", "orange",
];

/// Deterministic colour tag for a user id.
///
/// The same id always maps to the same colour on every client, so avatars
/// agree without coordination.
pub fn color_for(user_id: &str) -> &'static str {
    let hash = user_id.chars().fold(0u32, |h, c| h.wrapping_add(c as u32));
    USER_COLORS[(hash as usize) % USER_COLORS.len()]
}

/// A user as seen by other collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub display_name: String,
    pub color_tag: String,
}

impl Participant {
    pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let color_tag = color_for(&user_id).to_string();
        Self {
            user_id,
            display_name: display_name.into(),
            color_tag,
        }
    }
}

impl From<&SessionUser> for Participant {
    fn from(user: &SessionUser) -> Self {
        user.participant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn user(id: Option<&str>, name: Option<&str>, email: Option<&str>) -> SessionUser {
        SessionUser {
            id: id.map(String::from),
            name: name.map(String::from),
            email: email.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn user_id_prefers_provider_id() {
        let u = user(Some("u-1"), None, Some("a@example.com"));
        assert_eq!(u.user_id(), "u-1");
    }

    #[test]
    fn user_id_falls_back_to_email_then_unknown() {
        assert_eq!(user(None, None, Some("a@example.com")).user_id(), "a@example.com");
        assert_eq!(user(Some(""), None, None).user_id(), "unknown");
    }

    #[test]
    fn display_name_fallbacks() {
        assert_eq!(user(None, Some("Ada"), None).display_name(), "Ada");
        assert_eq!(user(None, None, Some("a@example.com")).display_name(), "a@example.com");
        assert_eq!(user(None, None, None).display_name(), "Unknown User");
    }

    #[test]
    fn role_defaults_to_viewer() {
        let mut u = SessionUser::default();
        assert_eq!(u.role(), UserRole::Viewer);

        u.role = Some("editor".into());
        assert_eq!(u.role(), UserRole::Editor);

        u.role = Some("superuser".into());
        assert_eq!(u.role(), UserRole::Viewer);
    }

    #[test]
    fn role_label_keeps_provider_role() {
        let mut u = SessionUser::default();
        assert_eq!(u.role_label(), "user");

        u.role = Some("superuser".into());
        assert_eq!(u.role_label(), "superuser");
        assert_eq!(u.role(), UserRole::Viewer);
    }

    #[test]
    fn parse_unknown_role_is_validation_error() {
        assert_matches!("root".parse::<UserRole>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn color_is_stable_per_user() {
        assert_eq!(color_for("mock-user-1"), color_for("mock-user-1"));
        assert!(USER_COLORS.contains(&color_for("")));
    }

    #[test]
    fn color_for_long_non_ascii_id_does_not_overflow() {
        let id = "\u{10FFFF}".repeat(5_000);
        assert!(USER_COLORS.contains(&color_for(&id)));
    }

    #[test]
    fn participant_carries_color_tag() {
        let p = user(Some("abc"), Some("Ada"), None).participant();
        assert_eq!(p.user_id, "abc");
        assert_eq!(p.display_name, "Ada");
        assert_eq!(p.color_tag, color_for("abc"));
    }
}
