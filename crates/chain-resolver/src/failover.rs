//! 端点故障转移与重试
//!
//! 提供声明式的故障转移策略，对任意链上读取操作应用
//! "轮换端点 + 指数退避"的重试机制。重试预算固定为
//! 端点数 × 每端点尝试次数，因此任何调用都不会无限挂起。

use std::future::Future;
use std::time::Duration;

use gate_shared::config::ChainConfig;
use tracing::{info, warn};

use crate::error::{ResolverError, Result};

// ---------------------------------------------------------------------------
// FailoverPolicy — 故障转移策略配置
// ---------------------------------------------------------------------------

/// 故障转移策略配置
///
/// 可重试错误（网络抖动、限流）按"端点 1 -> 端点 2 -> ... -> 端点 1 -> ..."
/// 的顺序轮换重试，每次失败后按指数退避等待。
#[derive(Debug, Clone)]
pub struct FailoverPolicy {
    /// 每个端点的尝试次数（总预算 = 端点数 × 该值）
    pub attempts_per_endpoint: u32,
    /// 首次重试前的等待时间
    pub initial_backoff: Duration,
    /// 退避时间上限
    pub max_backoff: Duration,
    /// 每次重试的退避倍数
    pub multiplier: f64,
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self {
            attempts_per_endpoint: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

impl FailoverPolicy {
    /// 从链配置构造策略
    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            attempts_per_endpoint: config.attempts_per_endpoint,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: 2.0,
        }
    }

    /// 总重试预算
    pub fn budget(&self, endpoint_count: usize) -> u32 {
        self.attempts_per_endpoint * endpoint_count as u32
    }

    /// 计算第 N 次失败后的等待时间（attempt 从 0 开始）
    ///
    /// 公式: initial_backoff * multiplier^attempt，结果不超过 max_backoff。
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_backoff.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }
}

// ---------------------------------------------------------------------------
// call_with_failover — 跨端点重试执行器
// ---------------------------------------------------------------------------

/// 在端点列表上执行带故障转移的异步操作
///
/// 可重试错误触发端点轮换与退避；不可重试错误立即向上传播。
/// 预算耗尽后返回最后一次的错误。
pub async fn call_with_failover<T, F, Fut>(
    policy: &FailoverPolicy,
    endpoints: &[String],
    operation_name: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if endpoints.is_empty() {
        return Err(ResolverError::Config(format!(
            "操作 {} 没有可用的 RPC 端点",
            operation_name
        )));
    }

    let budget = policy.budget(endpoints.len());
    let mut attempt: u32 = 0;
    let mut last_err: Option<ResolverError> = None;

    for _round in 0..policy.attempts_per_endpoint {
        for endpoint in endpoints {
            match call(endpoint.clone()).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation = operation_name, attempt, "链上读取在重试后成功");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    warn!(
                        operation = operation_name,
                        endpoint = endpoint.as_str(),
                        error = %err,
                        "链上读取失败且不可重试，直接返回错误"
                    );
                    return Err(err);
                }
                Err(err) => {
                    attempt += 1;
                    let exhausted = attempt >= budget;
                    warn!(
                        operation = operation_name,
                        endpoint = endpoint.as_str(),
                        attempt,
                        budget,
                        error = %err,
                        "链上读取失败，将轮换端点重试"
                    );
                    last_err = Some(err);

                    if !exhausted {
                        tokio::time::sleep(policy.backoff_for_attempt(attempt - 1)).await;
                    }
                }
            }
        }
    }

    warn!(
        operation = operation_name,
        budget, "重试预算已耗尽，放弃读取"
    );
    Err(last_err.unwrap_or_else(|| {
        ResolverError::Config(format!("操作 {} 的重试预算为零", operation_name))
    }))
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> FailoverPolicy {
        FailoverPolicy {
            attempts_per_endpoint: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    fn endpoints(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://rpc-{}.example", i)).collect()
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = FailoverPolicy {
            attempts_per_endpoint: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            multiplier: 2.0,
        };

        assert_eq!(policy.backoff_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for_attempt(1), Duration::from_millis(200));
        // 第 3 次起受限于 max_backoff
        assert_eq!(policy.backoff_for_attempt(2), Duration::from_millis(300));
        assert_eq!(policy.backoff_for_attempt(5), Duration::from_millis(300));
    }

    #[test]
    fn test_budget() {
        let policy = fast_policy();
        assert_eq!(policy.budget(3), 6);
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = call_with_failover(&fast_policy(), &endpoints(2), "test_op", |_ep| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ResolverError>(7u32)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rotates_to_second_endpoint() {
        let result = call_with_failover(&fast_policy(), &endpoints(2), "test_op", |ep| async move {
            if ep.contains("rpc-0") {
                Err(ResolverError::RateLimited { endpoint: ep })
            } else {
                Ok(99u32)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 99);
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32> =
            call_with_failover(&fast_policy(), &endpoints(3), "test_op", |_ep| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ResolverError::TransientNetwork("连接重置".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        // 预算 = 3 端点 × 2 次 = 6 次调用
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32> =
            call_with_failover(&fast_policy(), &endpoints(3), "test_op", |_ep| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ResolverError::Rpc {
                        code: 3,
                        message: "execution reverted".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_endpoint_list_is_config_error() {
        let result: Result<u32> =
            call_with_failover(&fast_policy(), &[], "test_op", |_ep| async move { Ok(1) }).await;

        assert!(matches!(result, Err(ResolverError::Config(_))));
    }
}
