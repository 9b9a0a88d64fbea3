//! Well-known role name constants.
//!
//! These must match the `users.role` check constraint in
//! `20261001000001_create_identity_tables.sql`.

/// Global administrator: may manage global mapping templates and access
/// every organization.
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MEMBER: &str = "member";

/// Whether `role` grants global administrator rights.
pub fn is_global_admin(role: &str) -> bool {
    role == ROLE_ADMIN
}
