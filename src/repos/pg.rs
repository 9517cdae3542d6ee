use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::OptionalExtension;
use diesel_async::RunQueryDsl;

use crate::models::oauth_code::OAuthCode;
use crate::repos::{CodeClaim, CodeStore};
use crate::schema::oauth_codes;

pub struct PgCodeStore {
    pool: crate::db::pg::PgPool,
}

impl PgCodeStore {
    pub fn new(pool: crate::db::pg::PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl CodeStore for PgCodeStore {
    async fn create_code(&self, code: OAuthCode) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await.context("pg pool")?;
        diesel::insert_into(oauth_codes::table)
            .values(&code)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn claim_code(&self, code_hash: &str, redirect_uri: &str, now_unix: i64) -> anyhow::Result<CodeClaim> {
        use oauth_codes::dsl as oc;
        let mut conn = self.pool.get().await.context("pg pool")?;

        // Single conditional DELETE ... RETURNING: the row can be handed out once.
        let claimed = diesel::delete(
            oc::oauth_codes
                .filter(oc::code_hash.eq(code_hash))
                .filter(oc::redirect_uri.eq(redirect_uri))
                .filter(oc::expires_at.gt(now_unix)),
        )
        .get_result::<OAuthCode>(&mut conn)
        .await
        .optional()?;
        if let Some(row) = claimed {
            return Ok(CodeClaim::Redeemed(row));
        }

        // Nothing claimed; work out why. Expired rows are removed here as well.
        let expired = diesel::delete(
            oc::oauth_codes
                .filter(oc::code_hash.eq(code_hash))
                .filter(oc::expires_at.le(now_unix)),
        )
        .execute(&mut conn)
        .await?;
        if expired > 0 {
            return Ok(CodeClaim::Expired);
        }

        let still_there = oc::oauth_codes
            .filter(oc::code_hash.eq(code_hash))
            .select(oc::code_hash)
            .first::<String>(&mut conn)
            .await
            .optional()?;
        Ok(match still_there {
            Some(_) => CodeClaim::RedirectMismatch,
            None => CodeClaim::NotFound,
        })
    }

    async fn delete_expired_codes(&self, now_unix: i64) -> anyhow::Result<usize> {
        use oauth_codes::dsl as oc;
        let mut conn = self.pool.get().await.context("pg pool")?;
        let n = diesel::delete(oc::oauth_codes.filter(oc::expires_at.le(now_unix)))
            .execute(&mut conn)
            .await?;
        Ok(n)
    }
}
