use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::oauth_code::OAuthCode;
use crate::repos::{CodeClaim, CodeStore};

/// Process-local code store. Only correct for a single instance.
#[derive(Default)]
pub struct MemoryCodeStore {
    codes: RwLock<HashMap<String, OAuthCode>>,
}

impl MemoryCodeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn len(&self) -> usize {
        self.codes.read().await.len()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn create_code(&self, code: OAuthCode) -> anyhow::Result<()> {
        let mut map = self.codes.write().await;
        if map.contains_key(&code.code_hash) {
            anyhow::bail!("authorization code collision");
        }
        map.insert(code.code_hash.clone(), code);
        Ok(())
    }

    async fn claim_code(&self, code_hash: &str, redirect_uri: &str, now_unix: i64) -> anyhow::Result<CodeClaim> {
        // lookup and removal happen under one write guard
        let mut map = self.codes.write().await;
        let Some(row) = map.get(code_hash) else {
            return Ok(CodeClaim::NotFound);
        };
        if row.is_expired_at(now_unix) {
            map.remove(code_hash);
            return Ok(CodeClaim::Expired);
        }
        if row.redirect_uri != redirect_uri {
            return Ok(CodeClaim::RedirectMismatch);
        }
        Ok(map
            .remove(code_hash)
            .map(CodeClaim::Redeemed)
            .unwrap_or(CodeClaim::NotFound))
    }

    async fn delete_expired_codes(&self, now_unix: i64) -> anyhow::Result<usize> {
        let mut map = self.codes.write().await;
        let before = map.len();
        map.retain(|_, row| !row.is_expired_at(now_unix));
        Ok(before - map.len())
    }
}
