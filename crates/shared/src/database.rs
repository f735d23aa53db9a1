//! 数据库连接管理模块
//!
//! 提供 PostgreSQL 连接池的构建与启动期健康检查。
//! sqlx 的 PgPool 本身就是可克隆的共享句柄，仓储层直接持有它，
//! 不再额外包装。

use crate::config::DatabaseConfig;
use crate::error::{GateError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// 按配置构建连接池
#[instrument(skip(config))]
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect(&config.url)
        .await?;

    info!("Database connection pool created");
    Ok(pool)
}

/// 启动期健康检查
///
/// 服务装配前先验证数据库可达，失败时尽早退出而不是在第一次
/// 业务查询时才暴露。
pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(GateError::from)
}
