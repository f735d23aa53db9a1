//! 资格引擎
//!
//! 面向代币门控优惠活动的资格判定核心，提供：
//! - 请求合并（并发相同请求只触发一次链上解析）
//! - 分层新鲜度的持久化余额缓存与降级回退
//! - 按门控类型分发的资格评估器
//! - 确定性的最优折扣选择
//! - 批量评估任务

pub mod audit;
pub mod batch;
pub mod cache;
pub mod coalescer;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod repository;
pub mod selector;

pub use audit::{AuditSink, TracingAuditSink};
pub use batch::{BatchReport, BatchSweep};
pub use cache::{BalanceSnapshot, TokenBalanceCache};
pub use coalescer::Coalescer;
pub use error::{EngineError, Result};
pub use evaluator::{EligibilityChecker, EligibilityEvaluator, EvalContext};
pub use models::{
    BalanceRecord, Campaign, CampaignScope, EligibilityDetail, EligibilityResult, EvaluationAudit,
    GatingType, Identity, NftStandard, PreconditionRule,
};
pub use selector::{DiscountSelector, SelectionScope, select_best};
