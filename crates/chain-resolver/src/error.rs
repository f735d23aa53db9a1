//! 解析器错误类型
//!
//! 所有变体均可 Clone（载荷为 String/数值），这样同一次在途解析的结果
//! 可以通过共享 Future 广播给多个等待方。

use thiserror::Error;

/// 链上读取错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolverError {
    // ==================== 可重试错误 ====================
    #[error("网络瞬时故障: {0}")]
    TransientNetwork(String),

    #[error("RPC 端点限流: {endpoint}")]
    RateLimited { endpoint: String },

    // ==================== 不可重试错误 ====================
    /// RPC 节点返回了错误对象（如 execution reverted），重试无意义
    #[error("RPC 调用失败: code={code} {message}")]
    Rpc { code: i64, message: String },

    /// 读取失败的地址占比过高，总额可能被低估。
    /// 绝不允许把"无法确定"降级为零余额返回。
    #[error("余额数据不可靠: {failed}/{total} 个地址读取失败")]
    UnreliableData { failed: usize, total: usize },

    #[error("无效的钱包地址: {0}")]
    InvalidAddress(String),

    #[error("解析器配置错误: {0}")]
    Config(String),

    #[error("返回数据格式错误: {0}")]
    Malformed(String),

    #[error("金额超出可表示范围: {0}")]
    AmountOutOfRange(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, ResolverError>;

impl ResolverError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::TransientNetwork(_) => "TRANSIENT_NETWORK",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Rpc { .. } => "RPC_ERROR",
            Self::UnreliableData { .. } => "UNRELIABLE_DATA",
            Self::InvalidAddress(_) => "INVALID_ADDRESS",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Malformed(_) => "MALFORMED_RESPONSE",
            Self::AmountOutOfRange(_) => "AMOUNT_OUT_OF_RANGE",
        }
    }

    /// 是否为可重试错误
    ///
    /// 只有网络抖动和限流值得在故障转移组合子内重试，
    /// 其余错误换端点也不会有不同结果。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_) | Self::RateLimited { .. })
    }
}
