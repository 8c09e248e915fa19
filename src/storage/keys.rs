//! Key layout for the two session indices.
//!
//! `session:<token>:userID` holds the owning user id and carries the TTL.
//! `user:<userID>:session` holds the user's current token and has no TTL.

pub const SESSION_PREFIX: &str = "session";
pub const SESSION_USER_ID_SUFFIX: &str = "userID";
pub const USER_PREFIX: &str = "user";
pub const USER_SESSION_SUFFIX: &str = "session";

/// Key of the session -> user record for `token`.
pub fn session_key(token: &str) -> String {
    format!("{SESSION_PREFIX}:{token}:{SESSION_USER_ID_SUFFIX}")
}

/// Key of the user -> session pointer for `user_id`.
pub fn user_key(user_id: &str) -> String {
    format!("{USER_PREFIX}:{user_id}:{USER_SESSION_SUFFIX}")
}
