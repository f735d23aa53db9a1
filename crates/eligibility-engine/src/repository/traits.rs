//! 存储 Trait 定义
//!
//! 定义存储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::Result;
use crate::models::{BalanceRecord, Campaign, Identity};

/// 余额记录存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn get(&self, identity_id: i64, token_contract: &str) -> Result<Option<BalanceRecord>>;

    /// 以 (identity_id, token_contract) 为键整体覆盖，时间戳由存储侧赋值
    async fn upsert(
        &self,
        identity_id: i64,
        token_contract: &str,
        total: Decimal,
        breakdown: Value,
    ) -> Result<BalanceRecord>;
}

/// 活动使用量读取接口
///
/// 写入由订单管道负责（本核心范围之外），这里只读计数。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// 活动的全局使用次数
    async fn global_usage(&self, campaign_id: i64) -> Result<i64>;

    /// 指定身份对共享活动的使用次数
    async fn identity_usage(&self, campaign_id: i64, identity_id: i64) -> Result<i64>;

    /// 一次性活动是否已被该身份使用
    async fn is_used(&self, campaign_id: i64, identity_id: i64) -> Result<bool>;
}

/// 活动配置读取接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Campaign>>;

    /// 按声明顺序列出未过期的自动应用活动
    async fn list_auto_apply(&self) -> Result<Vec<Campaign>>;
}

/// 身份目录接口
///
/// 钱包集合与会员标记由外部身份系统维护，这里只读。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn identity(&self, identity_id: i64) -> Result<Option<Identity>>;

    /// 身份的归一化钱包地址集合
    async fn wallet_addresses(&self, identity_id: i64) -> Result<Vec<String>>;

    /// 全部身份 ID（批量评估使用）
    async fn list_identity_ids(&self) -> Result<Vec<i64>>;
}
