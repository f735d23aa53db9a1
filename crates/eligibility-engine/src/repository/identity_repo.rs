//! 身份目录仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::traits::IdentityDirectory;
use crate::error::Result;
use crate::models::{Identity, normalize_wallets};

/// 身份目录仓储
///
/// 读取身份记录与钱包集合；钱包归一化在装配时完成。
pub struct PgIdentityDirectory {
    pool: PgPool,
}

impl PgIdentityDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn raw_wallets(&self, identity_id: i64) -> Result<Vec<String>> {
        let wallets: Vec<String> = sqlx::query_scalar(
            "SELECT address FROM identity_wallets WHERE identity_id = $1 ORDER BY id ASC",
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(wallets)
    }
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: i64,
    is_member: bool,
    member_verified_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl IdentityDirectory for PgIdentityDirectory {
    async fn identity(&self, identity_id: i64) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, is_member, member_verified_at FROM identities WHERE id = $1",
        )
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let wallets = self.raw_wallets(identity_id).await?;
        let external: Vec<String> = sqlx::query_scalar(
            "SELECT address FROM identity_external_addresses WHERE identity_id = $1 ORDER BY id ASC",
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Identity::new(
            row.id,
            wallets,
            external,
            row.is_member,
            row.member_verified_at,
        )))
    }

    async fn wallet_addresses(&self, identity_id: i64) -> Result<Vec<String>> {
        let wallets = self.raw_wallets(identity_id).await?;
        Ok(normalize_wallets(&wallets))
    }

    async fn list_identity_ids(&self) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM identities ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }
}
