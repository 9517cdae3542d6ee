use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::OptionalExtension;

use crate::models::oauth_code::OAuthCode;
use crate::repos::{CodeClaim, CodeStore};
use crate::schema::oauth_codes;

pub struct SqliteCodeStore {
    pool: crate::db::sqlite::SqlitePool,
}

impl SqliteCodeStore {
    pub fn new(pool: crate::db::sqlite::SqlitePool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl CodeStore for SqliteCodeStore {
    async fn create_code(&self, code: OAuthCode) -> anyhow::Result<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut conn = pool.get()?;
            diesel::insert_into(oauth_codes::table)
                .values(&code)
                .execute(&mut conn)?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn claim_code(&self, code_hash: &str, redirect_uri: &str, now_unix: i64) -> anyhow::Result<CodeClaim> {
        let code_hash = code_hash.to_string();
        let redirect_uri = redirect_uri.to_string();
        let pool = self.pool.clone();
        let claim = tokio::task::spawn_blocking(move || -> anyhow::Result<CodeClaim> {
            let mut conn = pool.get()?;
            // IMMEDIATE takes the write lock up front so two claims cannot both read the row
            let claim = conn.immediate_transaction(|conn| -> QueryResult<CodeClaim> {
                use oauth_codes::dsl as oc;
                let row = oc::oauth_codes
                    .filter(oc::code_hash.eq(&code_hash))
                    .first::<OAuthCode>(conn)
                    .optional()?;
                let Some(row) = row else {
                    return Ok(CodeClaim::NotFound);
                };
                if row.is_expired_at(now_unix) {
                    diesel::delete(oc::oauth_codes.filter(oc::code_hash.eq(&code_hash))).execute(conn)?;
                    return Ok(CodeClaim::Expired);
                }
                if row.redirect_uri != redirect_uri {
                    return Ok(CodeClaim::RedirectMismatch);
                }
                diesel::delete(oc::oauth_codes.filter(oc::code_hash.eq(&code_hash))).execute(conn)?;
                Ok(CodeClaim::Redeemed(row))
            })?;
            Ok(claim)
        })
        .await??;
        Ok(claim)
    }

    async fn delete_expired_codes(&self, now_unix: i64) -> anyhow::Result<usize> {
        let pool = self.pool.clone();
        let n = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
            let mut conn = pool.get()?;
            use oauth_codes::dsl as oc;
            let n = diesel::delete(oc::oauth_codes.filter(oc::expires_at.le(now_unix))).execute(&mut conn)?;
            Ok(n)
        })
        .await??;
        Ok(n)
    }
}
