//! 活动使用量仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::UsageStore;
use crate::error::Result;

/// 活动使用量仓储
///
/// 共享活动按使用日志行计数，一次性活动看 used 标记。
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn global_usage(&self, campaign_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM campaign_usages WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn identity_usage(&self, campaign_id: i64, identity_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM campaign_usages WHERE campaign_id = $1 AND identity_id = $2",
        )
        .bind(campaign_id)
        .bind(identity_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn is_used(&self, campaign_id: i64, identity_id: i64) -> Result<bool> {
        let used: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM campaign_usages
                WHERE campaign_id = $1 AND identity_id = $2 AND used = TRUE
            )
            "#,
        )
        .bind(campaign_id)
        .bind(identity_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(used)
    }
}
