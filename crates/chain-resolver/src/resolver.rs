//! 余额解析器
//!
//! 对一组钱包地址发起链上 balance-of 读取并聚合总额。
//! 逐地址顺序读取并插入小间隔（避免触发上游限流），
//! 单个地址的失败独立记录；失败比例超过阈值时返回
//! UnreliableData 而不是可能被低估的部分总额。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, U256};
use gate_shared::config::ChainConfig;
use gate_shared::observability::metric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::abi;
use crate::address::{parse_contract, sanitize_addresses};
use crate::error::{ResolverError, Result};
use crate::failover::{FailoverPolicy, call_with_failover};
use crate::rpc::ChainReader;

// ---------------------------------------------------------------------------
// 结果类型
// ---------------------------------------------------------------------------

/// 单个地址的余额
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub address: String,
    pub amount: Decimal,
}

/// 聚合余额解析结果
#[derive(Debug, Clone)]
pub struct ResolvedBalance {
    /// 所有成功读取地址的余额总和
    pub total: Decimal,
    /// 逐地址明细
    pub per_address: Vec<AddressBalance>,
    /// 参与读取的地址数
    pub attempted: usize,
    /// 读取失败的地址数
    pub failed: usize,
    /// 实际发出的 RPC 调用次数（含重试）
    pub rpc_calls: usize,
}

impl ResolvedBalance {
    /// 快速资格判断：总额是否达到要求
    pub fn meets(&self, required: Decimal) -> bool {
        self.total >= required
    }
}

/// 单个合集的持有量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractHolding {
    pub contract: String,
    pub amount: Decimal,
}

/// NFT 持有量聚合结果
#[derive(Debug, Clone)]
pub struct NftHoldings {
    /// 所有合集、所有地址的持有量总和
    pub total: Decimal,
    /// 逐合集明细
    pub per_contract: Vec<ContractHolding>,
    /// 参与读取的（合集 × 地址）对数
    pub attempted: usize,
    /// 读取失败的对数
    pub failed: usize,
    /// 实际发出的 RPC 调用次数（含重试）
    pub rpc_calls: usize,
}

impl NftHoldings {
    /// 快速资格判断：持有量是否达到要求
    pub fn meets(&self, required: Decimal) -> bool {
        self.total >= required
    }
}

// ---------------------------------------------------------------------------
// BalanceResolver
// ---------------------------------------------------------------------------

/// 余额解析器
#[derive(Clone)]
pub struct BalanceResolver {
    reader: Arc<dyn ChainReader>,
    chain: ChainConfig,
    policy: FailoverPolicy,
}

impl BalanceResolver {
    /// 从链配置构造解析器
    pub fn new(reader: Arc<dyn ChainReader>, config: &ChainConfig) -> Self {
        Self {
            reader,
            policy: FailoverPolicy::from_config(config),
            chain: config.clone(),
        }
    }

    /// 端点查询统一走链配置，不另建索引
    fn endpoints(&self, chain_id: u64) -> Result<&[String]> {
        self.chain
            .endpoints_for(chain_id)
            .ok_or_else(|| ResolverError::Config(format!("链 {} 未配置 RPC 端点", chain_id)))
    }

    /// 逐地址读取之间的间隔，随序号缓慢增大
    async fn pace(&self, index: usize) {
        if index == 0 {
            return;
        }
        let delay = Duration::from_millis(
            self.chain.inter_call_delay_ms + self.chain.inter_call_delay_step_ms * index as u64,
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// 单次带故障转移的 uint256 读取
    async fn read_uint(
        &self,
        endpoints: &[String],
        contract: &str,
        data: &str,
        operation: &str,
        rpc_calls: &AtomicUsize,
    ) -> Result<U256> {
        let raw = call_with_failover(&self.policy, endpoints, operation, |endpoint| {
            let reader = self.reader.clone();
            let to = contract.to_string();
            let data = data.to_string();
            async move {
                rpc_calls.fetch_add(1, Ordering::Relaxed);
                reader.call(&endpoint, &to, &data).await
            }
        })
        .await?;

        abi::decode_uint(&raw)
    }

    /// 判定失败比例并给出聚合结果；超阈值时返回 UnreliableData
    fn guard_reliability(&self, failed: usize, attempted: usize) -> Result<()> {
        if attempted > 0 && (failed as f64 / attempted as f64) > self.chain.max_failed_ratio {
            metrics::counter!(metric::RESOLVER_UNRELIABLE).increment(1);
            return Err(ResolverError::UnreliableData {
                failed,
                total: attempted,
            });
        }
        Ok(())
    }

    /// 解析 ERC-20 代币余额
    ///
    /// 清洗输入地址，逐地址 balanceOf，按合约精度转换后求和。
    #[instrument(skip(self, addresses), fields(count = addresses.len()))]
    pub async fn resolve_erc20(
        &self,
        addresses: &[String],
        contract: &str,
        chain_id: u64,
        decimals: u32,
    ) -> Result<ResolvedBalance> {
        let endpoints = self.endpoints(chain_id)?;
        let contract_addr = parse_contract(contract)?;
        let contract_hex = format!("{:#x}", contract_addr);

        let sanitized = sanitize_addresses(addresses);
        if sanitized.valid.is_empty() {
            return Err(ResolverError::InvalidAddress(
                "输入中没有合法的钱包地址".to_string(),
            ));
        }

        let rpc_calls = AtomicUsize::new(0);
        let mut per_address = Vec::with_capacity(sanitized.valid.len());
        let mut total = Decimal::ZERO;
        let mut failed = 0usize;

        for (index, owner) in sanitized.valid.iter().enumerate() {
            self.pace(index).await;

            let data = abi::encode_balance_of(*owner);
            match self
                .read_uint(endpoints, &contract_hex, &data, "erc20_balance_of", &rpc_calls)
                .await
                .and_then(|raw| abi::to_decimal(raw, decimals))
            {
                Ok(amount) => {
                    total += amount;
                    per_address.push(AddressBalance {
                        address: format!("{:#x}", owner),
                        amount,
                    });
                }
                Err(e) => {
                    warn!(owner = %owner, error = %e, "地址余额读取失败");
                    failed += 1;
                }
            }
        }

        let attempted = sanitized.valid.len();
        let calls = rpc_calls.load(Ordering::Relaxed);
        metrics::counter!(metric::RESOLVER_RPC_CALLS).increment(calls as u64);

        self.guard_reliability(failed, attempted)?;

        debug!(%total, attempted, failed, calls, "ERC-20 余额解析完成");
        Ok(ResolvedBalance {
            total,
            per_address,
            attempted,
            failed,
            rpc_calls: calls,
        })
    }

    /// 解析 ERC-721 持有量
    ///
    /// 对每个合集、每个地址各发起一次 balanceOf，按合集聚合。
    #[instrument(skip(self, addresses, contracts), fields(collections = contracts.len()))]
    pub async fn resolve_erc721(
        &self,
        addresses: &[String],
        contracts: &[String],
        chain_id: u64,
    ) -> Result<NftHoldings> {
        let endpoints = self.endpoints(chain_id)?;
        if contracts.is_empty() {
            return Err(ResolverError::Config("未配置 NFT 合约地址".to_string()));
        }

        let sanitized = sanitize_addresses(addresses);
        if sanitized.valid.is_empty() {
            return Err(ResolverError::InvalidAddress(
                "输入中没有合法的钱包地址".to_string(),
            ));
        }

        let rpc_calls = AtomicUsize::new(0);
        let mut per_contract = Vec::with_capacity(contracts.len());
        let mut total = Decimal::ZERO;
        let mut failed = 0usize;
        let mut index = 0usize;

        for contract in contracts {
            let contract_addr = parse_contract(contract)?;
            let contract_hex = format!("{:#x}", contract_addr);
            let mut contract_total = Decimal::ZERO;

            for owner in &sanitized.valid {
                self.pace(index).await;
                index += 1;

                let data = abi::encode_balance_of(*owner);
                match self
                    .read_uint(endpoints, &contract_hex, &data, "erc721_balance_of", &rpc_calls)
                    .await
                    .and_then(|raw| abi::to_decimal(raw, 0))
                {
                    Ok(amount) => contract_total += amount,
                    Err(e) => {
                        warn!(owner = %owner, contract = contract.as_str(), error = %e, "NFT 持有量读取失败");
                        failed += 1;
                    }
                }
            }

            total += contract_total;
            per_contract.push(ContractHolding {
                contract: contract_hex,
                amount: contract_total,
            });
        }

        let attempted = contracts.len() * sanitized.valid.len();
        let calls = rpc_calls.load(Ordering::Relaxed);
        metrics::counter!(metric::RESOLVER_RPC_CALLS).increment(calls as u64);

        self.guard_reliability(failed, attempted)?;

        debug!(%total, attempted, failed, calls, "ERC-721 持有量解析完成");
        Ok(NftHoldings {
            total,
            per_contract,
            attempted,
            failed,
            rpc_calls: calls,
        })
    }

    /// 解析 ERC-1155 持有量
    ///
    /// 对调用方给定的 token id 集合逐一 balanceOf(owner, id) 并求和。
    #[instrument(skip(self, addresses, token_ids), fields(token_ids = token_ids.len()))]
    pub async fn resolve_erc1155(
        &self,
        addresses: &[String],
        contract: &str,
        chain_id: u64,
        token_ids: &[String],
    ) -> Result<NftHoldings> {
        let endpoints = self.endpoints(chain_id)?;
        if token_ids.is_empty() {
            return Err(ResolverError::Config(
                "ERC-1155 门控未配置 token id".to_string(),
            ));
        }

        let contract_addr = parse_contract(contract)?;
        let contract_hex = format!("{:#x}", contract_addr);

        let ids = token_ids
            .iter()
            .map(|raw| abi::parse_token_id(raw))
            .collect::<Result<Vec<U256>>>()?;

        let sanitized = sanitize_addresses(addresses);
        if sanitized.valid.is_empty() {
            return Err(ResolverError::InvalidAddress(
                "输入中没有合法的钱包地址".to_string(),
            ));
        }

        let rpc_calls = AtomicUsize::new(0);
        let mut total = Decimal::ZERO;
        let mut failed = 0usize;
        let mut index = 0usize;

        for id in &ids {
            for owner in &sanitized.valid {
                self.pace(index).await;
                index += 1;

                let data = abi::encode_balance_of_id(*owner, *id);
                match self
                    .read_uint(endpoints, &contract_hex, &data, "erc1155_balance_of", &rpc_calls)
                    .await
                    .and_then(|raw| abi::to_decimal(raw, 0))
                {
                    Ok(amount) => total += amount,
                    Err(e) => {
                        warn!(owner = %owner, token_id = %id, error = %e, "ERC-1155 持有量读取失败");
                        failed += 1;
                    }
                }
            }
        }

        let attempted = ids.len() * sanitized.valid.len();
        let calls = rpc_calls.load(Ordering::Relaxed);
        metrics::counter!(metric::RESOLVER_RPC_CALLS).increment(calls as u64);

        self.guard_reliability(failed, attempted)?;

        debug!(%total, attempted, failed, calls, "ERC-1155 持有量解析完成");
        Ok(NftHoldings {
            total,
            per_contract: vec![ContractHolding {
                contract: contract_hex,
                amount: total,
            }],
            attempted,
            failed,
            rpc_calls: calls,
        })
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
