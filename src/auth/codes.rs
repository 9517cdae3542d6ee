use std::sync::Arc;

use base64::Engine as _;
use rand::RngCore;
use time::{Duration, OffsetDateTime};

use crate::models::oauth_code::OAuthCode;
use crate::repos::{CodeClaim, CodeStore};

pub const AUTH_CODE_TTL: Duration = Duration::minutes(10);
const CODE_BYTES: usize = 32;

/// Identity bound to a redeemed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeGrant {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug)]
pub enum RedeemError {
    NotFound,
    Expired,
    RedirectMismatch,
    Store(anyhow::Error),
}

impl std::fmt::Display for RedeemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedeemError::NotFound => write!(f, "authorization code not found"),
            RedeemError::Expired => write!(f, "authorization code expired"),
            RedeemError::RedirectMismatch => write!(f, "redirect_uri does not match"),
            RedeemError::Store(e) => write!(f, "code store failure: {}", e),
        }
    }
}

impl std::error::Error for RedeemError {}

/// Issues and redeems one-time authorization codes on top of a [`CodeStore`].
#[derive(Clone)]
pub struct AuthCodes {
    store: Arc<dyn CodeStore>,
}

impl AuthCodes {
    pub fn new(store: Arc<dyn CodeStore>) -> Self {
        Self { store }
    }

    pub async fn issue(&self, user_id: &str, email: &str, redirect_uri: &str) -> anyhow::Result<String> {
        self.issue_at(user_id, email, redirect_uri, OffsetDateTime::now_utc()).await
    }

    pub async fn issue_at(
        &self,
        user_id: &str,
        email: &str,
        redirect_uri: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let code = generate_token(CODE_BYTES);
        let row = OAuthCode {
            code_hash: hash_token(&code),
            user_id: user_id.to_string(),
            email: email.to_string(),
            redirect_uri: redirect_uri.to_string(),
            expires_at: (now + AUTH_CODE_TTL).unix_timestamp(),
            created_at: format_rfc3339(now),
        };
        self.store.create_code(row).await?;
        tracing::debug!(user_id = %user_id, "issued authorization code");
        Ok(code)
    }

    pub async fn redeem(&self, code: &str, redirect_uri: &str) -> Result<CodeGrant, RedeemError> {
        self.redeem_at(code, redirect_uri, OffsetDateTime::now_utc()).await
    }

    pub async fn redeem_at(&self, code: &str, redirect_uri: &str, now: OffsetDateTime) -> Result<CodeGrant, RedeemError> {
        let claim = self
            .store
            .claim_code(&hash_token(code), redirect_uri, now.unix_timestamp())
            .await
            .map_err(RedeemError::Store)?;
        match claim {
            CodeClaim::Redeemed(row) => Ok(CodeGrant {
                user_id: row.user_id,
                email: row.email,
            }),
            CodeClaim::NotFound => Err(RedeemError::NotFound),
            CodeClaim::Expired => Err(RedeemError::Expired),
            CodeClaim::RedirectMismatch => Err(RedeemError::RedirectMismatch),
        }
    }

    /// Drops every code whose expiry has passed. Returns the number removed.
    pub async fn sweep(&self, now: OffsetDateTime) -> anyhow::Result<usize> {
        self.store.delete_expired_codes(now.unix_timestamp()).await
    }
}

fn generate_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

fn hash_token(value: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn format_rfc3339(dt: OffsetDateTime) -> String {
    dt.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| dt.to_string())
}
