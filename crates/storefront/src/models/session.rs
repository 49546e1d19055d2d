//! Session-related types.
//!
//! Types stored in the session for authentication state and the guest cart.

use serde::{Deserialize, Serialize};

use insightshop_core::{CallerRole, Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Whether the user may call admin routes and tools.
    #[serde(default)]
    pub is_admin: bool,
}

impl CurrentUser {
    /// Tool-registry role for this user.
    #[must_use]
    pub const fn role(&self) -> CallerRole {
        CallerRole::from_session(true, self.is_admin)
    }
}

/// Session keys for authentication and cart data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the guest cart (`Vec<GuestCartItem>`).
    pub const GUEST_CART: &str = "guest_cart";

    /// Key for the guest's assistant conversation handle.
    pub const GUEST_CHAT_KEY: &str = "guest_chat_key";

    /// Key for orders placed by this session while logged out (`Vec<OrderId>`).
    pub const GUEST_ORDERS: &str = "guest_orders";
}
