use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A stored authorization code. Only the SHA-256 digest of the code is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Identifiable, Insertable)]
#[diesel(primary_key(code_hash))]
#[diesel(table_name = crate::schema::oauth_codes)]
pub struct OAuthCode {
    pub code_hash: String,
    pub user_id: String,
    pub email: String,
    pub redirect_uri: String,
    /// unix seconds
    pub expires_at: i64,
    pub created_at: String,
}

impl OAuthCode {
    /// `expires_at` is truncated to whole seconds, so the boundary second already counts as expired.
    pub fn is_expired_at(&self, now_unix: i64) -> bool {
        now_unix >= self.expires_at
    }
}
