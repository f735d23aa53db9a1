//! 优惠活动实体定义

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use super::enums::{CampaignScope, GatingType, NftStandard};

/// 优惠活动配置
///
/// 评估期间视为不可变快照，只由活动管理侧（本核心范围之外）修改。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    /// 活动名称
    pub name: String,
    /// 门控类型
    pub gating_type: GatingType,
    /// 门控合约地址（代币或 NFT 合集）
    pub contract_addresses: Vec<String>,
    /// 门控所在链
    pub chain_id: Option<i64>,
    /// 达标所需的最低余额 / 持有量
    pub required_balance: Option<Decimal>,
    /// NFT 标准，仅 nft_holding 门控使用
    pub nft_standard: Option<NftStandard>,
    /// ERC-1155 的 token id 集合（十进制字符串）
    pub nft_token_ids: Vec<String>,
    /// 身份白名单
    pub whitelist_identities: Vec<i64>,
    /// 钱包白名单
    pub whitelist_wallets: Vec<String>,
    /// combined 门控的子检查列表
    pub combined_checks: Json<Vec<GatingType>>,
    /// 适用范围
    pub scope: CampaignScope,
    /// 指定商品范围时的目标商品集合
    pub target_product_ids: Vec<i64>,
    /// 优先级，数值越大越优先
    pub priority_level: i32,
    /// 折扣力度（百分比）
    pub discount_percent: Decimal,
    /// 是否自动应用（无需用户输入口令）
    pub auto_apply: bool,
    /// 多次使用（共享）还是一次性
    pub is_shared: bool,
    /// 全局使用上限
    pub max_global_uses: Option<i64>,
    /// 单身份使用上限（仅共享活动）
    pub max_uses_per_identity: Option<i64>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// 活动是否已开始
    pub fn is_started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at.is_none_or(|t| t <= now)
    }

    /// 活动是否已过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    /// 活动当前是否有效
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.is_started(now) && !self.is_expired(now)
    }

    /// 是否为代币门控活动
    ///
    /// 选择器排序的第一维：链上门控活动优先于非门控活动。
    /// combined 活动只要包含链上子检查即视为门控。
    pub fn is_token_gated(&self) -> bool {
        match self.gating_type {
            GatingType::NftHolding | GatingType::TokenBalance => true,
            GatingType::Combined => self
                .combined_checks
                .0
                .iter()
                .any(|c| matches!(c, GatingType::NftHolding | GatingType::TokenBalance)),
            _ => false,
        }
    }

    /// 是否为指定商品范围
    pub fn is_product_specific(&self) -> bool {
        self.scope == CampaignScope::ProductSpecific
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Campaign {
        Campaign {
            id: 1,
            name: "测试活动".to_string(),
            gating_type: GatingType::None,
            contract_addresses: vec![],
            chain_id: None,
            required_balance: None,
            nft_standard: None,
            nft_token_ids: vec![],
            whitelist_identities: vec![],
            whitelist_wallets: vec![],
            combined_checks: Json(vec![]),
            scope: CampaignScope::SiteWide,
            target_product_ids: vec![],
            priority_level: 0,
            discount_percent: Decimal::from(10u64),
            auto_apply: true,
            is_shared: true,
            max_global_uses: None,
            max_uses_per_identity: None,
            starts_at: None,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_expiry_window() {
        let now = Utc::now();
        let mut campaign = sample();
        assert!(campaign.is_active(now));

        campaign.expires_at = Some(now - Duration::seconds(1));
        assert!(campaign.is_expired(now));
        assert!(!campaign.is_active(now));

        campaign.expires_at = Some(now + Duration::hours(1));
        campaign.starts_at = Some(now + Duration::minutes(5));
        assert!(!campaign.is_started(now));
    }

    #[test]
    fn test_token_gated_classification() {
        let mut campaign = sample();
        assert!(!campaign.is_token_gated());

        campaign.gating_type = GatingType::TokenBalance;
        assert!(campaign.is_token_gated());

        campaign.gating_type = GatingType::Combined;
        campaign.combined_checks = Json(vec![GatingType::IdentityWhitelist]);
        assert!(!campaign.is_token_gated());

        campaign.combined_checks = Json(vec![GatingType::IdentityWhitelist, GatingType::NftHolding]);
        assert!(campaign.is_token_gated());
    }
}
