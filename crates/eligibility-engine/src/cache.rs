//! 代币余额缓存
//!
//! 把解析器包在合并器与持久化余额记录之后，按分层新鲜度策略决定
//! 是读缓存还是触发链上解析。链上数据不可靠时回退到最后已知的
//! 非零余额并标记 degraded——绝不把"无法确定"当作零余额写回。

use std::sync::Arc;
use std::time::Duration;

use chain_resolver::{BalanceResolver, ResolvedBalance, ResolverError};
use chrono::{DateTime, Utc};
use gate_shared::config::{BalanceCacheConfig, GatingTokenConfig};
use gate_shared::observability::metric;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::coalescer::Coalescer;
use crate::error::{EngineError, Result};
use crate::models::BalanceRecord;
use crate::repository::{BalanceStore, IdentityDirectory};

/// 余额读取结果快照
#[derive(Debug, Clone)]
pub struct BalanceSnapshot {
    pub identity_id: i64,
    pub token_contract: String,
    pub total: Decimal,
    /// 逐地址明细（JSON）
    pub breakdown: Value,
    /// 是否来自缓存（false 表示刚完成链上解析）
    pub from_cache: bool,
    /// 是否为降级结果（链上不可靠，使用最后已知值）
    pub degraded: bool,
    pub updated_at: DateTime<Utc>,
    /// 本次读取发出的 RPC 调用次数（缓存命中为 0）
    pub rpc_calls: usize,
}

impl BalanceSnapshot {
    fn from_record(record: &BalanceRecord, degraded: bool) -> Self {
        Self {
            identity_id: record.identity_id,
            token_contract: record.token_contract.clone(),
            total: record.total,
            breakdown: record.breakdown.clone(),
            from_cache: true,
            degraded,
            updated_at: record.updated_at,
            rpc_calls: 0,
        }
    }
}

/// 代币余额缓存
///
/// 只缓存配置的门控代币；其他合约的读取由调用方直连解析器。
pub struct TokenBalanceCache {
    resolver: Arc<BalanceResolver>,
    coalescer: Coalescer<ResolvedBalance, ResolverError>,
    store: Arc<dyn BalanceStore>,
    directory: Arc<dyn IdentityDirectory>,
    token: GatingTokenConfig,
    config: BalanceCacheConfig,
}

impl TokenBalanceCache {
    pub fn new(
        resolver: Arc<BalanceResolver>,
        store: Arc<dyn BalanceStore>,
        directory: Arc<dyn IdentityDirectory>,
        token: GatingTokenConfig,
        config: BalanceCacheConfig,
    ) -> Self {
        Self {
            resolver,
            coalescer: Coalescer::new(),
            store,
            directory,
            token: GatingTokenConfig {
                contract: token.contract.to_lowercase(),
                ..token
            },
            config,
        }
    }

    /// 门控代币合约地址（小写）
    pub fn token_contract(&self) -> &str {
        &self.token.contract
    }

    fn coalesce_key(&self, identity_id: i64) -> String {
        format!("balance:{}:{}", identity_id, self.token.contract)
    }

    /// 缓存记录是否仍可信
    ///
    /// 零值重验窗口内的任何值（含零）都可信；非零值放宽到通用窗口；
    /// 零值一旦超过重验窗口必须重新解析，避免写入时的瞬时缺失
    /// 造成长期的错误"不符合资格"。
    fn is_fresh(&self, record: &BalanceRecord, now: DateTime<Utc>) -> bool {
        let age = record.age(now);
        if age < chrono::Duration::seconds(self.config.zero_revalidate_seconds) {
            return true;
        }
        record.is_positive() && age < chrono::Duration::seconds(self.config.fresh_window_seconds)
    }

    /// 读取余额
    ///
    /// `wallets` 省略时通过身份目录解析；`force_refresh` 跳过所有
    /// 新鲜度层级（例如用户刚关联新钱包后调用方有理由不信任缓存）。
    #[instrument(skip(self, wallets))]
    pub async fn read(
        &self,
        identity_id: i64,
        wallets: Option<Vec<String>>,
        force_refresh: bool,
    ) -> Result<BalanceSnapshot> {
        let record = self.store.get(identity_id, &self.token.contract).await?;
        let now = Utc::now();

        if !force_refresh {
            if let Some(record) = record.as_ref().filter(|r| self.is_fresh(r, now)) {
                metrics::counter!(metric::CACHE_HITS).increment(1);
                debug!(identity_id, total = %record.total, "余额缓存命中");
                return Ok(BalanceSnapshot::from_record(record, false));
            }
        }

        metrics::counter!(metric::CACHE_MISSES).increment(1);

        let wallets = match wallets {
            Some(w) => w,
            None => self.directory.wallet_addresses(identity_id).await?,
        };

        let key = self.coalesce_key(identity_id);
        if force_refresh {
            // 调用方明确不信任缓存时，合并器的短期结果也一并作废
            self.coalescer.invalidate(&key);
        }

        let resolver = self.resolver.clone();
        let contract = self.token.contract.clone();
        let chain_id = self.token.chain_id;
        let decimals = self.token.decimals;
        let outcome = self
            .coalescer
            .coalesce(
                &key,
                Duration::from_secs(self.config.coalesce_ttl_seconds),
                move || async move {
                    resolver
                        .resolve_erc20(&wallets, &contract, chain_id, decimals)
                        .await
                },
            )
            .await;

        match outcome {
            Ok(resolved) => {
                let breakdown = serde_json::to_value(&resolved.per_address)
                    .map_err(|e| EngineError::Internal(format!("余额明细序列化失败: {}", e)))?;
                let stored = self
                    .store
                    .upsert(identity_id, &self.token.contract, resolved.total, breakdown)
                    .await?;

                Ok(BalanceSnapshot {
                    identity_id,
                    token_contract: stored.token_contract,
                    total: stored.total,
                    breakdown: stored.breakdown,
                    from_cache: false,
                    degraded: false,
                    updated_at: stored.updated_at,
                    rpc_calls: resolved.rpc_calls,
                })
            }
            Err(err @ ResolverError::UnreliableData { .. }) => {
                // 回退到最后已知的非零余额；此时绝不写回记录
                if let Some(record) = record.filter(|r| r.is_positive()) {
                    warn!(
                        identity_id,
                        error = %err,
                        fallback_total = %record.total,
                        "链上数据不可靠，使用最后已知余额（降级）"
                    );
                    return Ok(BalanceSnapshot::from_record(&record, true));
                }
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// 仅读缓存
    ///
    /// 返回可用的最后缓存值（即使已过期），没有缓存时返回 None。
    /// 永远不会触发链上解析，供接受陈旧数据的低延迟读取路径使用。
    pub async fn read_cache_only(&self, identity_id: i64) -> Result<Option<BalanceSnapshot>> {
        let record = self.store.get(identity_id, &self.token.contract).await?;
        Ok(record.map(|r| BalanceSnapshot::from_record(&r, false)))
    }

    /// 作废该身份的合并器短期缓存
    pub fn invalidate(&self, identity_id: i64) {
        self.coalescer.invalidate(&self.coalesce_key(identity_id));
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
