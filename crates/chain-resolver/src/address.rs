//! 钱包地址校验与归一化
//!
//! EVM 地址统一转为小写并去重；无法解析的地址被过滤并记录原因，
//! 解析流程使用剩余的合法地址继续。

use std::collections::HashSet;
use std::str::FromStr;

use alloy_primitives::Address;
use tracing::warn;

use crate::error::{ResolverError, Result};

/// 地址清洗结果
#[derive(Debug, Clone)]
pub struct SanitizedAddresses {
    /// 去重后的合法地址，保持首次出现的顺序
    pub valid: Vec<Address>,
    /// 被过滤掉的原始输入
    pub rejected: Vec<String>,
}

/// 清洗一组原始钱包地址
pub fn sanitize_addresses(raw: &[String]) -> SanitizedAddresses {
    let mut seen: HashSet<String> = HashSet::new();
    let mut valid = Vec::new();
    let mut rejected = Vec::new();

    for input in raw {
        let normalized = input.trim().to_lowercase();
        if normalized.is_empty() {
            rejected.push(input.clone());
            continue;
        }

        if !seen.insert(normalized.clone()) {
            continue;
        }

        match Address::from_str(&normalized) {
            Ok(address) => valid.push(address),
            Err(e) => {
                warn!(address = input.as_str(), error = %e, "忽略无效的钱包地址");
                rejected.push(input.clone());
            }
        }
    }

    SanitizedAddresses { valid, rejected }
}

/// 解析单个合约地址
pub fn parse_contract(raw: &str) -> Result<Address> {
    Address::from_str(raw.trim())
        .map_err(|e| ResolverError::InvalidAddress(format!("{}: {}", raw, e)))
}
