//! 数据模型
//!
//! 资格引擎读取与产出的实体定义。

pub mod balance;
pub mod campaign;
pub mod enums;
pub mod identity;
pub mod result;

pub use balance::BalanceRecord;
pub use campaign::Campaign;
pub use enums::{CampaignScope, GatingType, NftStandard};
pub use identity::{Identity, normalize_wallets};
pub use result::{
    EligibilityDetail, EligibilityResult, EvaluationAudit, PreconditionRule,
};
