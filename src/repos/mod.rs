use async_trait::async_trait;
use crate::models::oauth_code::OAuthCode;

/// Outcome of an attempt to claim a stored authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeClaim {
    /// The row was removed; the caller owns the grant.
    Redeemed(OAuthCode),
    NotFound,
    /// The row was past its expiry and has been removed.
    Expired,
    /// The row exists but was issued for another redirect URI. It is left in place.
    RedirectMismatch,
}

/// Backing storage for authorization codes.
///
/// `claim_code` must be atomic with respect to other claims of the same
/// hash: of any number of concurrent callers at most one sees `Redeemed`.
#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn create_code(&self, code: OAuthCode) -> anyhow::Result<()>;
    async fn claim_code(&self, code_hash: &str, redirect_uri: &str, now_unix: i64) -> anyhow::Result<CodeClaim>;
    async fn delete_expired_codes(&self, now_unix: i64) -> anyhow::Result<usize>;
}

pub mod memory;
#[cfg(feature = "pg")]
pub mod pg;
#[cfg(feature = "sqlite")]
pub mod sqlite;
