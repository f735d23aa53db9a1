//! 各门控类型的检查器实现

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chain_resolver::abi::DEFAULT_DECIMALS;
use chain_resolver::{BalanceResolver, NftHoldings, ResolverError};
use gate_shared::config::GatingTokenConfig;
use rust_decimal::Decimal;
use tracing::warn;

use super::{EligibilityChecker, EvalContext};
use crate::cache::TokenBalanceCache;
use crate::error::{EngineError, Result};
use crate::models::{
    Campaign, EligibilityDetail, EligibilityResult, GatingType, Identity, NftStandard,
};

/// 活动配置缺失时的统一结果
fn config_missing(message: impl Into<String>) -> EligibilityResult {
    EligibilityResult::ineligible(
        "campaign_misconfigured",
        EligibilityDetail::Configuration {
            message: message.into(),
        },
    )
}

/// 把解析器失败归一为结构化结果
///
/// 数据不可靠与配置问题落地为"不符合资格 + 原因"；
/// 其余错误向上传播，由评估器统一兜底。
fn resolver_failure(err: ResolverError) -> Result<EligibilityResult> {
    match err {
        ResolverError::UnreliableData { .. } => Ok(EligibilityResult::ineligible(
            "balance_unreliable",
            EligibilityDetail::Unavailable {
                code: err.code().to_string(),
            },
        )),
        ResolverError::InvalidAddress(_) => Ok(EligibilityResult::ineligible(
            "no_valid_wallets",
            EligibilityDetail::Configuration {
                message: err.to_string(),
            },
        )),
        ResolverError::Config(_) => Ok(config_missing(err.to_string())),
        other => Err(EngineError::Resolver(other)),
    }
}

// ---------------------------------------------------------------------------
// none
// ---------------------------------------------------------------------------

/// 无门槛活动
pub struct OpenChecker;

#[async_trait]
impl EligibilityChecker for OpenChecker {
    async fn check(
        &self,
        _campaign: &Campaign,
        _identity: &Identity,
        _ctx: &EvalContext,
    ) -> Result<EligibilityResult> {
        Ok(EligibilityResult::eligible(
            "open_campaign",
            EligibilityDetail::Open,
        ))
    }
}

// ---------------------------------------------------------------------------
// identity_whitelist / wallet_whitelist
// ---------------------------------------------------------------------------

/// 身份白名单
pub struct IdentityWhitelistChecker;

#[async_trait]
impl EligibilityChecker for IdentityWhitelistChecker {
    async fn check(
        &self,
        campaign: &Campaign,
        identity: &Identity,
        _ctx: &EvalContext,
    ) -> Result<EligibilityResult> {
        let matched = campaign.whitelist_identities.contains(&identity.id);
        let detail = EligibilityDetail::Whitelist { matched };

        Ok(if matched {
            EligibilityResult::eligible("identity_whitelisted", detail)
        } else {
            EligibilityResult::ineligible("identity_not_whitelisted", detail)
        })
    }
}

/// 钱包白名单，地址大小写归一后比较
pub struct WalletWhitelistChecker;

#[async_trait]
impl EligibilityChecker for WalletWhitelistChecker {
    async fn check(
        &self,
        campaign: &Campaign,
        identity: &Identity,
        _ctx: &EvalContext,
    ) -> Result<EligibilityResult> {
        let whitelist: Vec<String> = campaign
            .whitelist_wallets
            .iter()
            .map(|w| w.trim().to_lowercase())
            .collect();

        let matched = identity
            .wallets
            .iter()
            .any(|w| whitelist.contains(&w.to_lowercase()));
        let detail = EligibilityDetail::Whitelist { matched };

        Ok(if matched {
            EligibilityResult::eligible("wallet_whitelisted", detail)
        } else {
            EligibilityResult::ineligible("wallet_not_whitelisted", detail)
        })
    }
}

// ---------------------------------------------------------------------------
// nft_holding
// ---------------------------------------------------------------------------

/// NFT 持有量门控
///
/// NFT 持有量不走余额缓存，每次评估直连解析器。
pub struct NftHoldingChecker {
    resolver: Arc<BalanceResolver>,
}

impl NftHoldingChecker {
    pub fn new(resolver: Arc<BalanceResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl EligibilityChecker for NftHoldingChecker {
    async fn check(
        &self,
        campaign: &Campaign,
        identity: &Identity,
        ctx: &EvalContext,
    ) -> Result<EligibilityResult> {
        if campaign.contract_addresses.is_empty() {
            return Ok(config_missing("nft_holding 门控缺少合约地址"));
        }
        let Some(chain_id) = campaign.chain_id else {
            return Ok(config_missing("nft_holding 门控缺少 chain_id"));
        };
        let required = campaign.required_balance.unwrap_or(Decimal::ONE);

        let holdings = match campaign.nft_standard {
            Some(NftStandard::Erc1155) => {
                // 逐合约查询后合并为一份聚合持有量
                let mut merged = NftHoldings {
                    total: Decimal::ZERO,
                    per_contract: Vec::with_capacity(campaign.contract_addresses.len()),
                    attempted: 0,
                    failed: 0,
                    rpc_calls: 0,
                };
                for contract in &campaign.contract_addresses {
                    match self
                        .resolver
                        .resolve_erc1155(
                            &identity.wallets,
                            contract,
                            chain_id as u64,
                            &campaign.nft_token_ids,
                        )
                        .await
                    {
                        Ok(holdings) => {
                            merged.total += holdings.total;
                            merged.per_contract.extend(holdings.per_contract);
                            merged.attempted += holdings.attempted;
                            merged.failed += holdings.failed;
                            merged.rpc_calls += holdings.rpc_calls;
                        }
                        Err(e) => {
                            ctx.add_calls(merged.rpc_calls);
                            return resolver_failure(e);
                        }
                    }
                }
                merged
            }
            // 未指定标准时按 ERC-721 处理
            _ => {
                match self
                    .resolver
                    .resolve_erc721(
                        &identity.wallets,
                        &campaign.contract_addresses,
                        chain_id as u64,
                    )
                    .await
                {
                    Ok(holdings) => holdings,
                    Err(e) => return resolver_failure(e),
                }
            }
        };

        ctx.add_calls(holdings.rpc_calls);
        let detail = EligibilityDetail::NftHolding {
            found: holdings.total,
            required,
        };

        Ok(if holdings.meets(required) {
            EligibilityResult::eligible("nft_holding_met", detail)
        } else {
            EligibilityResult::ineligible("nft_holding_not_met", detail)
        })
    }
}

// ---------------------------------------------------------------------------
// token_balance
// ---------------------------------------------------------------------------

/// 代币余额门控
///
/// 只有配置的门控代币走余额缓存（值得持久化的只有这一种），
/// 其余合约直连解析器。
pub struct TokenBalanceChecker {
    cache: Arc<TokenBalanceCache>,
    resolver: Arc<BalanceResolver>,
    token: GatingTokenConfig,
}

impl TokenBalanceChecker {
    pub fn new(
        cache: Arc<TokenBalanceCache>,
        resolver: Arc<BalanceResolver>,
        token: GatingTokenConfig,
    ) -> Self {
        Self {
            cache,
            resolver,
            token,
        }
    }

    fn is_gating_token(&self, contract: &str, chain_id: i64) -> bool {
        contract.eq_ignore_ascii_case(&self.token.contract)
            && chain_id as u64 == self.token.chain_id
    }
}

#[async_trait]
impl EligibilityChecker for TokenBalanceChecker {
    async fn check(
        &self,
        campaign: &Campaign,
        identity: &Identity,
        ctx: &EvalContext,
    ) -> Result<EligibilityResult> {
        let Some(required) = campaign.required_balance else {
            return Ok(config_missing("token_balance 门控缺少 required_balance"));
        };
        let Some(contract) = campaign.contract_addresses.first() else {
            return Ok(config_missing("token_balance 门控缺少合约地址"));
        };
        let chain_id = campaign.chain_id.unwrap_or(self.token.chain_id as i64);

        let (found, degraded, from_cache) = if self.is_gating_token(contract, chain_id) {
            match self
                .cache
                .read(identity.id, Some(identity.wallets.clone()), false)
                .await
            {
                Ok(snapshot) => {
                    ctx.add_calls(snapshot.rpc_calls);
                    (snapshot.total, snapshot.degraded, snapshot.from_cache)
                }
                Err(EngineError::Resolver(e)) => return resolver_failure(e),
                Err(e) => return Err(e),
            }
        } else {
            match self
                .resolver
                .resolve_erc20(&identity.wallets, contract, chain_id as u64, DEFAULT_DECIMALS)
                .await
            {
                Ok(resolved) => {
                    ctx.add_calls(resolved.rpc_calls);
                    (resolved.total, false, false)
                }
                Err(e) => return resolver_failure(e),
            }
        };

        if degraded {
            warn!(
                campaign_id = campaign.id,
                identity_id = identity.id,
                "使用降级余额进行资格判定"
            );
        }

        let detail = EligibilityDetail::TokenBalance {
            found,
            required,
            degraded,
            from_cache,
        };

        Ok(if found >= required {
            EligibilityResult::eligible("token_balance_met", detail)
        } else {
            EligibilityResult::ineligible("token_balance_not_met", detail)
        })
    }
}

// ---------------------------------------------------------------------------
// combined
// ---------------------------------------------------------------------------

/// 组合门控
///
/// 配置的子检查按 AND 语义组合；全部执行完后一次性报告
/// 所有未通过的子检查。配置形态上允许将来扩展 OR，但在产品
/// 意图明确之前只实现 AND。
pub struct CombinedChecker {
    inner: HashMap<GatingType, Arc<dyn EligibilityChecker>>,
}

impl CombinedChecker {
    pub fn new(inner: HashMap<GatingType, Arc<dyn EligibilityChecker>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl EligibilityChecker for CombinedChecker {
    async fn check(
        &self,
        campaign: &Campaign,
        identity: &Identity,
        ctx: &EvalContext,
    ) -> Result<EligibilityResult> {
        let checks = &campaign.combined_checks.0;
        if checks.is_empty() {
            return Ok(config_missing("combined 门控未配置子检查"));
        }

        let mut failed_checks = Vec::new();
        for check in checks {
            if *check == GatingType::Combined {
                return Ok(config_missing("combined 门控不允许嵌套自身"));
            }
            let Some(checker) = self.inner.get(check) else {
                return Ok(config_missing(format!("未知的子检查类型: {:?}", check)));
            };

            let result = checker.check(campaign, identity, ctx).await?;
            if !result.eligible {
                failed_checks.push(*check);
            }
        }

        let eligible = failed_checks.is_empty();
        let detail = EligibilityDetail::Combined { failed_checks };

        Ok(if eligible {
            EligibilityResult::eligible("combined_checks_met", detail)
        } else {
            EligibilityResult::ineligible("combined_check_failed", detail)
        })
    }
}

// ---------------------------------------------------------------------------
// membership_flag
// ---------------------------------------------------------------------------

/// 会员标记门控
///
/// 标记的核验时间只随明细透出，不参与判定。
pub struct MembershipChecker;

#[async_trait]
impl EligibilityChecker for MembershipChecker {
    async fn check(
        &self,
        _campaign: &Campaign,
        identity: &Identity,
        _ctx: &EvalContext,
    ) -> Result<EligibilityResult> {
        let detail = EligibilityDetail::Membership {
            member: identity.is_member,
            verified_at: identity.member_verified_at,
        };

        Ok(if identity.is_member {
            EligibilityResult::eligible("membership_active", detail)
        } else {
            EligibilityResult::ineligible("membership_missing", detail)
        })
    }
}
