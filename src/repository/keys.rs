//! Cache key derivation for user lookups.
//!
//! Every cached read uses one of these keys, and every write invalidates the
//! keys derived from the users it touched plus all listing and count keys.

use uuid::Uuid;

use super::User;

/// Matches every cached page of [`by_page`].
pub const LISTING_PATTERN: &str = "users:all:*";

pub const COUNT_KEY: &str = "users:count";

pub fn by_id(id: Uuid) -> String {
    format!("user:id:{}", id)
}

pub fn by_email(email: &str) -> String {
    format!("user:email:{}", email)
}

pub fn by_username(username: &str) -> String {
    format!("user:username:{}", username)
}

pub fn exists_email(email: &str) -> String {
    format!("user:exists:email:{}", email)
}

pub fn exists_username(username: &str) -> String {
    format!("user:exists:username:{}", username)
}

pub fn by_page(offset: u64, limit: u64) -> String {
    format!("users:all:{}:{}", offset, limit)
}

/// Direct and existence keys referencing one user.
pub fn entity_keys(user: &User) -> [String; 5] {
    [
        by_id(user.id),
        by_email(&user.email),
        by_username(&user.username),
        exists_email(&user.email),
        exists_username(&user.username),
    ]
}
