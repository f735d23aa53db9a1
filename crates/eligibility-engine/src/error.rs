//! 资格引擎错误类型

use chain_resolver::ResolverError;
use gate_shared::error::GateError;
use thiserror::Error;

/// 资格引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("链上解析错误: {0}")]
    Resolver(#[from] ResolverError),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("基础设施错误: {0}")]
    Infra(#[from] GateError),

    #[error("身份未找到: id={0}")]
    IdentityNotFound(i64),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Resolver(e) => e.code(),
            Self::Database(_) => "DATABASE_ERROR",
            Self::Infra(e) => e.code(),
            Self::IdentityNotFound(_) => "IDENTITY_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
