//! 可观测性模块
//!
//! 提供日志（tracing）与指标（metrics facade）的统一初始化。
//! 日志支持 pretty / json 两种输出格式，级别可通过 RUST_LOG 覆盖。

use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::ObservabilityConfig;

/// 初始化全局 tracing subscriber
///
/// 进程内只能调用一次，重复调用返回错误。
pub fn init(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = if config.log_format == "json" {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// 指标名称常量
///
/// 集中定义，保证各组件上报时命名一致。
pub mod metric {
    /// 解析器发出的 RPC 调用次数
    pub const RESOLVER_RPC_CALLS: &str = "gate_resolver_rpc_calls_total";
    /// 解析失败（数据不可靠）次数
    pub const RESOLVER_UNRELIABLE: &str = "gate_resolver_unreliable_total";
    /// 资格评估次数（按结果分标签）
    pub const EVALUATIONS: &str = "gate_evaluations_total";
    /// 单次评估耗时
    pub const EVALUATION_DURATION: &str = "gate_evaluation_duration_seconds";
    /// 余额缓存命中次数
    pub const CACHE_HITS: &str = "gate_balance_cache_hits_total";
    /// 余额缓存未命中（触发链上解析）次数
    pub const CACHE_MISSES: &str = "gate_balance_cache_misses_total";
}
