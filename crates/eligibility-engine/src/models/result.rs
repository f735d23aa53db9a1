//! 资格评估结果类型
//!
//! detail 是按门控类型封闭的变体集合，消费方可以穷举处理每种形态，
//! 不需要对开放的 JSON 字段做鸭子类型判断。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::GatingType;

/// 基础资格检查失败的具体规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionRule {
    /// 活动尚未开始
    NotStarted,
    /// 活动已过期
    Expired,
    /// 全局使用上限已达到
    GlobalCapReached,
    /// 单身份使用上限已达到
    IdentityCapReached,
    /// 一次性活动已被该身份使用
    AlreadyUsed,
}

/// 评估结果明细
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EligibilityDetail {
    /// 无门槛活动
    Open,
    /// 白名单匹配结果
    Whitelist { matched: bool },
    /// NFT 持有量
    NftHolding { found: Decimal, required: Decimal },
    /// 代币余额
    TokenBalance {
        found: Decimal,
        required: Decimal,
        /// 余额来自降级回退（链上读取不可靠时使用最后已知值）
        degraded: bool,
        from_cache: bool,
    },
    /// 组合条件，列出所有未通过的子检查
    Combined { failed_checks: Vec<GatingType> },
    /// 会员标记
    Membership {
        member: bool,
        verified_at: Option<DateTime<Utc>>,
    },
    /// 基础资格检查未通过
    Precondition { rule: PreconditionRule },
    /// 活动配置不完整
    Configuration { message: String },
    /// 评估所需数据当前不可用
    Unavailable { code: String },
}

/// 资格评估结果
///
/// 评估器的每条代码路径都以该类型收尾，绝不向调用方抛出异常。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResult {
    pub eligible: bool,
    /// 稳定的原因标识（如 campaign_expired / nft_holding_not_met）
    pub reason: String,
    pub detail: EligibilityDetail,
}

impl EligibilityResult {
    /// 构造通过结果
    pub fn eligible(reason: impl Into<String>, detail: EligibilityDetail) -> Self {
        Self {
            eligible: true,
            reason: reason.into(),
            detail,
        }
    }

    /// 构造不通过结果
    pub fn ineligible(reason: impl Into<String>, detail: EligibilityDetail) -> Self {
        Self {
            eligible: false,
            reason: reason.into(),
            detail,
        }
    }
}

/// 评估审计记录
///
/// 每次评估（通过或不通过）都会产出一条，用于分析，不参与控制流。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationAudit {
    pub id: Uuid,
    pub campaign_id: i64,
    pub identity_id: i64,
    pub eligible: bool,
    pub reason: String,
    /// 本次评估发出的链上读取次数
    pub resolver_calls: u64,
    pub duration_ms: u64,
    pub evaluated_at: DateTime<Utc>,
}
