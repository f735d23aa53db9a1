//! 请求合并器
//!
//! 按键空间对异步操作做通用记忆化：短 TTL 结果缓存 + 在途请求去重。
//! 并发到达的相同键请求共享同一个底层 Future，只触发一次真实调用。
//! 该组件对余额和活动一无所知；状态全部在内存中，重启丢失无害。

use std::future::Future;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

type SharedCall<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// 请求合并器
///
/// 显式构造、注入使用的服务实例；内部用并发安全的 map 保存
/// 结果缓存与在途标记。
pub struct Coalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// 已完成结果缓存：键 -> (值, 写入时刻)
    results: DashMap<String, (T, Instant)>,
    /// 在途请求：键 -> 共享 Future
    in_flight: DashMap<String, SharedCall<T, E>>,
}

impl<T, E> Coalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// 创建新的合并器
    pub fn new() -> Self {
        Self {
            results: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    /// 合并执行
    ///
    /// 1. 结果缓存内存在且未超过 ttl：直接返回缓存值；
    /// 2. 相同键的请求已在途：等待同一个共享 Future；
    /// 3. 否则执行 `op`，成功结果写入缓存，完成后（无论成败）释放在途标记。
    pub async fn coalesce<F, Fut>(&self, key: &str, ttl: Duration, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if let Some(entry) = self.results.get(key) {
            let (value, written_at) = entry.value();
            if written_at.elapsed() < ttl {
                debug!(key, "合并器结果缓存命中");
                return Ok(value.clone());
            }
        }

        // 原子地加入或创建在途 Future；创建动作本身是同步的，
        // 不会在持有分片锁时跨越 await 点。
        let call = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                debug!(key, "合并到已在途的相同请求");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let call = op().boxed().shared();
                slot.insert(call.clone());
                call
            }
        };

        let result = call.await;

        if let Ok(value) = &result {
            self.results
                .insert(key.to_string(), (value.clone(), Instant::now()));
        }
        // 失败结果不缓存；在途标记在成败两种情况下都要释放
        self.in_flight.remove(key);

        result
    }

    /// 使指定键的缓存失效
    ///
    /// 用于已知状态变更之后的显式清理（如手动刷新余额）。
    pub fn invalidate(&self, key: &str) {
        self.results.remove(key);
    }

    /// 清空全部结果缓存
    pub fn invalidate_all(&self) {
        self.results.clear();
    }

    /// 当前缓存的结果数量
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// 结果缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl<T, E> Default for Coalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ttl() -> Duration {
        Duration::from_secs(30)
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_invocation() {
        let coalescer: Arc<Coalescer<u64, String>> = Arc::new(Coalescer::new());
        let calls = Arc::new(AtomicU32::new(0));

        let op = |calls: Arc<AtomicU32>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            // 保持在途足够久，让并发请求都撞上同一个 Future
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<u64, String>(42)
        };

        let (a, b, c, d, e) = tokio::join!(
            coalescer.coalesce("k", ttl(), || op(calls.clone())),
            coalescer.coalesce("k", ttl(), || op(calls.clone())),
            coalescer.coalesce("k", ttl(), || op(calls.clone())),
            coalescer.coalesce("k", ttl(), || op(calls.clone())),
            coalescer.coalesce("k", ttl(), || op(calls.clone())),
        );

        for value in [a, b, c, d, e] {
            assert_eq!(value.unwrap(), 42);
        }
        // 5 个并发请求只触发 1 次真实调用
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_result_served_from_cache() {
        let coalescer: Coalescer<u64, String> = Coalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value = coalescer
                .coalesce("k", ttl(), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<u64, String>(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_result_triggers_new_call() {
        let coalescer: Coalescer<u64, String> = Coalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            coalescer
                .coalesce("k", Duration::from_millis(5), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<u64, String>(1)
                })
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let coalescer: Coalescer<u64, String> = Coalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let result = coalescer
                .coalesce("k", ttl(), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u64, String>("上游故障".to_string())
                })
                .await;
            assert!(result.is_err());
        }

        // 失败不缓存，第二次仍然发起调用
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(coalescer.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_busts_cache() {
        let coalescer: Coalescer<u64, String> = Coalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        for round in 0..2 {
            let calls = calls.clone();
            coalescer
                .coalesce("k", ttl(), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<u64, String>(1)
                })
                .await
                .unwrap();

            if round == 0 {
                coalescer.invalidate("k");
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let coalescer: Coalescer<u64, String> = Coalescer::new();
        let calls = Arc::new(AtomicU32::new(0));

        for key in ["a", "b"] {
            let calls = calls.clone();
            coalescer
                .coalesce(key, ttl(), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<u64, String>(1)
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(coalescer.len(), 2);
    }
}
