//! 余额记录实体定义

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 持久化的余额记录
///
/// 以 (identity_id, token_contract) 为键，每次成功解析后整体覆盖。
/// updated_at 由数据库侧赋值，按键单调不减。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRecord {
    pub identity_id: i64,
    /// 门控代币合约地址（小写）
    pub token_contract: String,
    /// 各钱包余额之和
    pub total: Decimal,
    /// 逐地址明细（JSON），仅供展示与排障
    pub breakdown: Value,
    pub updated_at: DateTime<Utc>,
}

impl BalanceRecord {
    /// 记录年龄
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.updated_at
    }

    /// 余额是否为正
    pub fn is_positive(&self) -> bool {
        self.total > Decimal::ZERO
    }
}
