//! 身份实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 用户身份
///
/// 由外部身份目录装配；钱包集合在构造时完成归一化。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: i64,
    /// 归一化后的钱包地址集合（EVM 地址小写，去重，保持首次出现顺序）
    pub wallets: Vec<String>,
    /// 外部平台关联地址（按原样保留）
    pub external_addresses: Vec<String>,
    /// 会员标记
    pub is_member: bool,
    /// 会员标记最近一次核验时间（仅作参考，不参与判定）
    pub member_verified_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// 构造身份并归一化钱包集合
    pub fn new(
        id: i64,
        raw_wallets: Vec<String>,
        external_addresses: Vec<String>,
        is_member: bool,
        member_verified_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            wallets: normalize_wallets(&raw_wallets),
            external_addresses,
            is_member,
            member_verified_at,
        }
    }
}

/// 归一化钱包地址集合
///
/// EVM 形态（0x + 40 位十六进制）统一小写；非 EVM 地址保持原样。
/// 归一化后去重，保持首次出现的顺序。
pub fn normalize_wallets(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for wallet in raw {
        let trimmed = wallet.trim();
        if trimmed.is_empty() {
            continue;
        }

        let normalized = if looks_like_evm(trimmed) {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        };

        if seen.insert(normalized.clone()) {
            out.push(normalized);
        }
    }

    out
}

fn looks_like_evm(s: &str) -> bool {
    s.len() == 42
        && s.starts_with("0x")
        && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}
