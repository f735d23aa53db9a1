//! 资格评估器
//!
//! 按门控类型分发到对应检查器。分发前先做基础资格检查
//! （开始/过期时间、全局与单身份使用上限），任一不满足即以
//! 具体原因短路返回。评估器的所有代码路径都以 EligibilityResult
//! 收尾——这里抛出的异常会阻塞结算或展示逻辑，绝不允许。

pub mod checkers;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use chain_resolver::BalanceResolver;
use chrono::Utc;
use gate_shared::config::GatingTokenConfig;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::cache::TokenBalanceCache;
use crate::error::Result;
use crate::models::{
    Campaign, EligibilityDetail, EligibilityResult, EvaluationAudit, GatingType, Identity,
    PreconditionRule,
};
use crate::repository::UsageStore;

use self::checkers::{
    CombinedChecker, IdentityWhitelistChecker, MembershipChecker, NftHoldingChecker, OpenChecker,
    TokenBalanceChecker, WalletWhitelistChecker,
};

/// 单次评估的上下文
///
/// 汇总各检查器发出的链上读取次数，供审计记录使用。
pub struct EvalContext {
    resolver_calls: AtomicU64,
}

impl EvalContext {
    pub fn new() -> Self {
        Self {
            resolver_calls: AtomicU64::new(0),
        }
    }

    /// 累加链上读取次数
    pub fn add_calls(&self, n: usize) {
        self.resolver_calls.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn calls(&self) -> u64 {
        self.resolver_calls.load(Ordering::Relaxed)
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

/// 单一门控类型的检查能力
#[async_trait]
pub trait EligibilityChecker: Send + Sync {
    async fn check(
        &self,
        campaign: &Campaign,
        identity: &Identity,
        ctx: &EvalContext,
    ) -> Result<EligibilityResult>;
}

/// 资格评估器
///
/// 检查器在构造时注册到按门控类型索引的查找表中。
pub struct EligibilityEvaluator {
    checkers: HashMap<GatingType, Arc<dyn EligibilityChecker>>,
    usage: Arc<dyn UsageStore>,
    audit: Arc<dyn AuditSink>,
}

impl EligibilityEvaluator {
    pub fn new(
        resolver: Arc<BalanceResolver>,
        cache: Arc<TokenBalanceCache>,
        usage: Arc<dyn UsageStore>,
        audit: Arc<dyn AuditSink>,
        gating_token: GatingTokenConfig,
    ) -> Self {
        let mut base: HashMap<GatingType, Arc<dyn EligibilityChecker>> = HashMap::new();
        base.insert(GatingType::None, Arc::new(OpenChecker));
        base.insert(
            GatingType::IdentityWhitelist,
            Arc::new(IdentityWhitelistChecker),
        );
        base.insert(GatingType::WalletWhitelist, Arc::new(WalletWhitelistChecker));
        base.insert(
            GatingType::NftHolding,
            Arc::new(NftHoldingChecker::new(resolver.clone())),
        );
        base.insert(
            GatingType::TokenBalance,
            Arc::new(TokenBalanceChecker::new(cache, resolver, gating_token)),
        );
        base.insert(GatingType::MembershipFlag, Arc::new(MembershipChecker));

        // combined 检查器复用同一套子检查器实例
        let mut checkers = base.clone();
        checkers.insert(
            GatingType::Combined,
            Arc::new(CombinedChecker::new(base)),
        );

        Self {
            checkers,
            usage,
            audit,
        }
    }

    /// 评估单个活动
    ///
    /// 无论内部发生什么，都返回结构化结果并产出审计记录。
    #[instrument(skip(self, campaign, identity), fields(campaign_id = campaign.id, identity_id = identity.id))]
    pub async fn evaluate(&self, campaign: &Campaign, identity: &Identity) -> EligibilityResult {
        let started = Instant::now();
        let ctx = EvalContext::new();

        let result = match self.evaluate_inner(campaign, identity, &ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "评估过程出现内部错误，按数据不可用处理");
                EligibilityResult::ineligible(
                    "evaluation_unavailable",
                    EligibilityDetail::Unavailable {
                        code: e.code().to_string(),
                    },
                )
            }
        };

        let audit = EvaluationAudit {
            id: Uuid::new_v4(),
            campaign_id: campaign.id,
            identity_id: identity.id,
            eligible: result.eligible,
            reason: result.reason.clone(),
            resolver_calls: ctx.calls(),
            duration_ms: started.elapsed().as_millis() as u64,
            evaluated_at: Utc::now(),
        };
        self.audit.record(&audit).await;

        result
    }

    async fn evaluate_inner(
        &self,
        campaign: &Campaign,
        identity: &Identity,
        ctx: &EvalContext,
    ) -> Result<EligibilityResult> {
        if let Some(blocked) = self.basic_check(campaign, identity).await? {
            return Ok(blocked);
        }

        match self.checkers.get(&campaign.gating_type) {
            Some(checker) => checker.check(campaign, identity, ctx).await,
            None => Ok(EligibilityResult::ineligible(
                "campaign_misconfigured",
                EligibilityDetail::Configuration {
                    message: format!("未注册的门控类型: {:?}", campaign.gating_type),
                },
            )),
        }
    }

    /// 基础资格检查
    ///
    /// 返回 Some(result) 表示被短路拦下，None 表示可以进入门控检查。
    async fn basic_check(
        &self,
        campaign: &Campaign,
        identity: &Identity,
    ) -> Result<Option<EligibilityResult>> {
        let now = Utc::now();

        if !campaign.is_started(now) {
            return Ok(Some(EligibilityResult::ineligible(
                "campaign_not_started",
                EligibilityDetail::Precondition {
                    rule: PreconditionRule::NotStarted,
                },
            )));
        }

        if campaign.is_expired(now) {
            return Ok(Some(EligibilityResult::ineligible(
                "campaign_expired",
                EligibilityDetail::Precondition {
                    rule: PreconditionRule::Expired,
                },
            )));
        }

        if let Some(cap) = campaign.max_global_uses {
            if self.usage.global_usage(campaign.id).await? >= cap {
                return Ok(Some(EligibilityResult::ineligible(
                    "global_cap_reached",
                    EligibilityDetail::Precondition {
                        rule: PreconditionRule::GlobalCapReached,
                    },
                )));
            }
        }

        // 共享活动按使用日志行数计，一次性活动看 used 标记
        if campaign.is_shared {
            if let Some(cap) = campaign.max_uses_per_identity {
                if self.usage.identity_usage(campaign.id, identity.id).await? >= cap {
                    return Ok(Some(EligibilityResult::ineligible(
                        "identity_cap_reached",
                        EligibilityDetail::Precondition {
                            rule: PreconditionRule::IdentityCapReached,
                        },
                    )));
                }
            }
        } else if self.usage.is_used(campaign.id, identity.id).await? {
            return Ok(Some(EligibilityResult::ineligible(
                "already_used",
                EligibilityDetail::Precondition {
                    rule: PreconditionRule::AlreadyUsed,
                },
            )));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAuditSink;
    use crate::models::CampaignScope;
    use crate::repository::traits::{MockBalanceStore, MockIdentityDirectory, MockUsageStore};
    use chain_resolver::{ChainReader, ResolverError};
    use gate_shared::test_utils::{test_cache_config, test_chain_config, test_gating_token};
    use rust_decimal::Decimal;
    use sqlx::types::Json;

    /// 永远失败的链读取器；基础检查短路的用例不应触达它
    struct NullReader;

    #[async_trait]
    impl ChainReader for NullReader {
        async fn call(
            &self,
            _endpoint: &str,
            _to: &str,
            _data: &str,
        ) -> chain_resolver::Result<String> {
            Err(ResolverError::TransientNetwork("测试替身".to_string()))
        }
    }

    fn build_evaluator(usage: MockUsageStore) -> EligibilityEvaluator {
        let resolver = Arc::new(BalanceResolver::new(
            Arc::new(NullReader),
            &test_chain_config(vec!["https://rpc-a".to_string()]),
        ));
        let cache = Arc::new(crate::cache::TokenBalanceCache::new(
            resolver.clone(),
            Arc::new(MockBalanceStore::new()),
            Arc::new(MockIdentityDirectory::new()),
            test_gating_token(),
            test_cache_config(),
        ));

        EligibilityEvaluator::new(
            resolver,
            cache,
            Arc::new(usage),
            Arc::new(TracingAuditSink),
            test_gating_token(),
        )
    }

    fn sample_campaign(id: i64) -> Campaign {
        Campaign {
            id,
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

    fn sample_identity() -> Identity {
        Identity::new(42, vec![], vec![], false, None)
    }

    #[tokio::test]
    async fn test_global_cap_short_circuits() {
        let mut usage = MockUsageStore::new();
        usage.expect_global_usage().returning(|_| Ok(100));

        let evaluator = build_evaluator(usage);
        let mut campaign = sample_campaign(1);
        campaign.max_global_uses = Some(100);

        let result = evaluator.evaluate(&campaign, &sample_identity()).await;

        assert!(!result.eligible);
        assert_eq!(result.reason, "global_cap_reached");
    }

    #[tokio::test]
    async fn test_identity_cap_for_shared_campaign() {
        let mut usage = MockUsageStore::new();
        usage.expect_global_usage().returning(|_| Ok(0));
        usage.expect_identity_usage().returning(|_, _| Ok(3));

        let evaluator = build_evaluator(usage);
        let mut campaign = sample_campaign(1);
        campaign.max_global_uses = Some(100);
        campaign.max_uses_per_identity = Some(3);

        let result = evaluator.evaluate(&campaign, &sample_identity()).await;

        assert!(!result.eligible);
        assert_eq!(result.reason, "identity_cap_reached");
    }

    #[tokio::test]
    async fn test_single_use_campaign_checks_used_flag() {
        let mut usage = MockUsageStore::new();
        usage.expect_is_used().returning(|_, _| Ok(true));

        let evaluator = build_evaluator(usage);
        let mut campaign = sample_campaign(1);
        campaign.is_shared = false;

        let result = evaluator.evaluate(&campaign, &sample_identity()).await;

        assert!(!result.eligible);
        assert_eq!(result.reason, "already_used");
    }

    #[tokio::test]
    async fn test_caps_clear_then_dispatches_to_checker() {
        let mut usage = MockUsageStore::new();
        usage.expect_is_used().returning(|_, _| Ok(false));

        let evaluator = build_evaluator(usage);
        let mut campaign = sample_campaign(1);
        campaign.is_shared = false;

        // 无门槛活动在基础检查通过后直接可用
        let result = evaluator.evaluate(&campaign, &sample_identity()).await;

        assert!(result.eligible);
        assert_eq!(result.reason, "open_campaign");
    }

    #[tokio::test]
    async fn test_usage_store_failure_becomes_unavailable_result() {
        let mut usage = MockUsageStore::new();
        usage.expect_is_used().returning(|_, _| {
            Err(crate::error::EngineError::Internal("存储不可用".to_string()))
        });

        let evaluator = build_evaluator(usage);
        let mut campaign = sample_campaign(1);
        campaign.is_shared = false;

        // 内部错误不向调用方传播，收敛为结构化的不可用结果
        let result = evaluator.evaluate(&campaign, &sample_identity()).await;

        assert!(!result.eligible);
        assert_eq!(result.reason, "evaluation_unavailable");
    }
}
