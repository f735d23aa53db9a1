//! 折扣选择器
//!
//! 在范围匹配且评估通过的候选活动中，按固定的全序挑出唯一赢家。
//! 展示报价与订单结算必须使用同一个排序函数，否则两端金额会不一致。

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::evaluator::EligibilityEvaluator;
use crate::models::{Campaign, CampaignScope, Identity};

/// 选择范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionScope {
    /// 全站请求
    SiteWide,
    /// 指定商品请求
    Products(Vec<i64>),
}

impl SelectionScope {
    /// 活动范围是否命中本次请求
    ///
    /// 全站活动总是命中；指定商品活动要求目标集合与请求商品有交集。
    pub fn matches(&self, campaign: &Campaign) -> bool {
        match campaign.scope {
            CampaignScope::SiteWide => true,
            CampaignScope::ProductSpecific => match self {
                SelectionScope::SiteWide => false,
                SelectionScope::Products(product_ids) => campaign
                    .target_product_ids
                    .iter()
                    .any(|p| product_ids.contains(p)),
            },
        }
    }
}

/// 活动的排序键，元组序即优先序（每一维都是越大越优先）：
/// 链上门控 > 指定商品 > 优先级 > 折扣力度
pub fn rank(campaign: &Campaign) -> (bool, bool, i32, Decimal) {
    (
        campaign.is_token_gated(),
        campaign.is_product_specific(),
        campaign.priority_level,
        campaign.discount_percent,
    )
}

/// 在 (声明序号, 活动) 候选集中挑出赢家
///
/// 排序键完全相同时，声明更早（序号更小）的活动胜出，保证确定性。
pub fn select_best<'a>(candidates: &[(usize, &'a Campaign)]) -> Option<&'a Campaign> {
    candidates
        .iter()
        .max_by(|(index_a, a), (index_b, b)| {
            rank(a).cmp(&rank(b)).then_with(|| index_b.cmp(index_a))
        })
        .map(|(_, campaign)| *campaign)
}

/// 折扣选择器
pub struct DiscountSelector {
    evaluator: Arc<EligibilityEvaluator>,
}

impl DiscountSelector {
    pub fn new(evaluator: Arc<EligibilityEvaluator>) -> Self {
        Self { evaluator }
    }

    /// 选出应自动应用的唯一活动
    ///
    /// 候选为有效且自动应用、范围命中的活动；逐个评估（顺序执行，
    /// 避免对上游并发打请求），在通过者中按全序取赢家。
    #[instrument(skip(self, campaigns, identity), fields(identity_id = identity.id, candidates = campaigns.len()))]
    pub async fn select(
        &self,
        campaigns: &[Campaign],
        scope: &SelectionScope,
        identity: &Identity,
    ) -> Option<Campaign> {
        let now = Utc::now();
        let mut eligible: Vec<(usize, &Campaign)> = Vec::new();

        for (index, campaign) in campaigns.iter().enumerate() {
            if !campaign.auto_apply || !campaign.is_active(now) || !scope.matches(campaign) {
                continue;
            }

            let result = self.evaluator.evaluate(campaign, identity).await;
            if result.eligible {
                eligible.push((index, campaign));
            }
        }

        let winner = select_best(&eligible);
        if let Some(campaign) = winner {
            info!(
                campaign_id = campaign.id,
                eligible_count = eligible.len(),
                "已选定自动应用的优惠活动"
            );
        }

        winner.cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GatingType, NftStandard};
    use sqlx::types::Json;

    fn campaign(id: i64, gating_type: GatingType, priority: i32, discount: u64) -> Campaign {
        Campaign {
            id,
            name: format!("活动-{}", id),
            gating_type,
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
            priority_level: priority,
            discount_percent: Decimal::from(discount),
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
    fn test_gated_beats_priority_and_value() {
        // A：代币门控，优先级 5，9 折；B：无门控，优先级 10，5 折
        let a = campaign(1, GatingType::TokenBalance, 5, 10);
        let b = campaign(2, GatingType::None, 10, 50);

        let candidates = vec![(0usize, &a), (1usize, &b)];
        let winner = select_best(&candidates).unwrap();

        // 门控优先于非门控，与优先级和折扣力度无关
        assert_eq!(winner.id, 1);
    }

    #[test]
    fn test_product_specific_beats_site_wide() {
        let mut a = campaign(1, GatingType::None, 1, 10);
        a.scope = CampaignScope::ProductSpecific;
        a.target_product_ids = vec![100];
        let b = campaign(2, GatingType::None, 9, 50);

        let candidates = vec![(0usize, &a), (1usize, &b)];
        assert_eq!(select_best(&candidates).unwrap().id, 1);
    }

    #[test]
    fn test_priority_then_discount() {
        let a = campaign(1, GatingType::None, 5, 30);
        let b = campaign(2, GatingType::None, 5, 40);
        let c = campaign(3, GatingType::None, 8, 10);

        let candidates = vec![(0usize, &a), (1usize, &b), (2usize, &c)];
        // 优先级最高者胜
        assert_eq!(select_best(&candidates).unwrap().id, 3);

        let candidates = vec![(0usize, &a), (1usize, &b)];
        // 同优先级比折扣力度
        assert_eq!(select_best(&candidates).unwrap().id, 2);
    }

    #[test]
    fn test_full_tie_goes_to_earliest_declared() {
        let a = campaign(1, GatingType::None, 5, 30);
        let b = campaign(2, GatingType::None, 5, 30);

        let candidates = vec![(0usize, &a), (1usize, &b)];
        assert_eq!(select_best(&candidates).unwrap().id, 1);

        // 声明顺序颠倒时赢家跟着变，与 id 无关
        let candidates = vec![(0usize, &b), (1usize, &a)];
        assert_eq!(select_best(&candidates).unwrap().id, 2);
    }

    #[test]
    fn test_deterministic_across_repeated_calls() {
        let a = campaign(1, GatingType::NftHolding, 3, 20);
        let b = campaign(2, GatingType::TokenBalance, 3, 20);
        let c = campaign(3, GatingType::None, 9, 90);
        let candidates = vec![(0usize, &a), (1usize, &b), (2usize, &c)];

        let first = select_best(&candidates).unwrap().id;
        for _ in 0..100 {
            assert_eq!(select_best(&candidates).unwrap().id, first);
        }
    }

    #[test]
    fn test_empty_candidates() {
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn test_scope_matching() {
        let site_wide = campaign(1, GatingType::None, 0, 10);
        let mut product = campaign(2, GatingType::None, 0, 10);
        product.scope = CampaignScope::ProductSpecific;
        product.target_product_ids = vec![7, 8];

        // 全站活动在任何请求下都命中
        assert!(SelectionScope::SiteWide.matches(&site_wide));
        assert!(SelectionScope::Products(vec![1]).matches(&site_wide));

        // 指定商品活动要求交集非空
        assert!(!SelectionScope::SiteWide.matches(&product));
        assert!(SelectionScope::Products(vec![8, 9]).matches(&product));
        assert!(!SelectionScope::Products(vec![1, 2]).matches(&product));
    }

    #[test]
    fn test_combined_with_chain_check_counts_as_gated() {
        let mut combined = campaign(1, GatingType::Combined, 0, 10);
        combined.combined_checks = Json(vec![
            GatingType::MembershipFlag,
            GatingType::NftHolding,
        ]);
        combined.nft_standard = Some(NftStandard::Erc721);
        let plain = campaign(2, GatingType::None, 99, 99);

        let candidates = vec![(0usize, &plain), (1usize, &combined)];
        assert_eq!(select_best(&candidates).unwrap().id, 1);
    }
}
