//! 活动配置仓储

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::CampaignStore;
use crate::error::Result;
use crate::models::Campaign;

const CAMPAIGN_COLUMNS: &str = r#"
    id, name, gating_type, contract_addresses, chain_id, required_balance,
    nft_standard, nft_token_ids, whitelist_identities, whitelist_wallets,
    combined_checks, scope, target_product_ids, priority_level,
    discount_percent, auto_apply, is_shared, max_global_uses,
    max_uses_per_identity, starts_at, expires_at, created_at
"#;

/// 活动配置仓储
///
/// 活动的增删改由活动管理侧负责，这里只读。
pub struct PgCampaignStore {
    pool: PgPool,
}

impl PgCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    async fn get(&self, id: i64) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {} FROM campaigns WHERE id = $1",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(campaign)
    }

    async fn list_auto_apply(&self) -> Result<Vec<Campaign>> {
        // created_at 顺序即声明顺序，选择器的平局裁决依赖它
        let campaigns = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            SELECT {}
            FROM campaigns
            WHERE auto_apply = TRUE
              AND (expires_at IS NULL OR expires_at > now())
            ORDER BY created_at ASC, id ASC
            "#,
            CAMPAIGN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(campaigns)
    }
}
