//! 链上余额解析
//!
//! 提供面向多端点 RPC 的余额读取能力，支持：
//! - ERC-20 / ERC-721 / ERC-1155 的 balance-of 聚合
//! - 端点轮换故障转移与指数退避
//! - 地址校验与过滤
//! - 失败比例守卫（绝不把"无法确定"报告为零）

pub mod abi;
pub mod address;
pub mod error;
pub mod failover;
pub mod resolver;
pub mod rpc;

pub use error::{ResolverError, Result};
pub use failover::FailoverPolicy;
pub use resolver::{
    AddressBalance, BalanceResolver, ContractHolding, NftHoldings, ResolvedBalance,
};
pub use rpc::{ChainReader, HttpChainReader};
