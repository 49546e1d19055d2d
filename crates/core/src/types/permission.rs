//! Tool permissions and caller roles for the assistant tool registry.

use serde::{Deserialize, Serialize};

/// Minimum caller role a tool requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPermission {
    /// Anyone, including guests.
    Public,
    /// A logged-in shopper.
    User,
    /// Store administrators only.
    Admin,
}

/// Who is invoking a tool.
///
/// Ordered so that `Guest < User < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Guest,
    User,
    Admin,
}

impl CallerRole {
    /// Role for an optional session user.
    #[must_use]
    pub const fn from_session(logged_in: bool, is_admin: bool) -> Self {
        match (logged_in, is_admin) {
            (true, true) => Self::Admin,
            (true, false) => Self::User,
            (false, _) => Self::Guest,
        }
    }

    /// Whether this caller satisfies `permission`.
    #[must_use]
    pub const fn satisfies(self, permission: ToolPermission) -> bool {
        match permission {
            ToolPermission::Public => true,
            ToolPermission::User => matches!(self, Self::User | Self::Admin),
            ToolPermission::Admin => matches!(self, Self::Admin),
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}
