//! 批量资格评估任务入口
//!
//! 装配配置、数据库、链上解析器、余额缓存、评估器与选择器，
//! 对全部身份跑一轮全站范围的资格评估。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chain_resolver::{BalanceResolver, HttpChainReader};
use gate_shared::{config::AppConfig, database, observability};
use tracing::info;

use eligibility_engine::repository::{
    PgBalanceStore, PgCampaignStore, PgIdentityDirectory, PgUsageStore,
};
use eligibility_engine::{
    BatchSweep, DiscountSelector, EligibilityEvaluator, SelectionScope, TokenBalanceCache,
    TracingAuditSink, repository::IdentityDirectory,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置，失败时回退到默认值
    let config = AppConfig::load("eligibility-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    // 2. 初始化可观测性
    observability::init(&config.observability)?;
    info!("Starting eligibility-engine batch sweep...");
    info!(environment = %config.environment, "Configuration loaded");

    // 3. 初始化数据库连接并验证可达
    let pool = database::connect(&config.database).await?;
    database::health_check(&pool).await?;
    info!("Database connection established");

    // 4. 装配链上解析器
    let reader = Arc::new(HttpChainReader::new(Duration::from_secs(
        config.chain.request_timeout_seconds,
    ))?);
    let resolver = Arc::new(BalanceResolver::new(reader, &config.chain));

    // 5. 装配存储与服务
    let balance_store = Arc::new(PgBalanceStore::new(pool.clone()));
    let directory = Arc::new(PgIdentityDirectory::new(pool.clone()));
    let usage = Arc::new(PgUsageStore::new(pool.clone()));
    let campaigns = Arc::new(PgCampaignStore::new(pool.clone()));

    let cache = Arc::new(TokenBalanceCache::new(
        resolver.clone(),
        balance_store,
        directory.clone(),
        config.gating_token.clone(),
        config.cache.clone(),
    ));

    let evaluator = Arc::new(EligibilityEvaluator::new(
        resolver,
        cache,
        usage,
        Arc::new(TracingAuditSink),
        config.gating_token.clone(),
    ));
    let selector = Arc::new(DiscountSelector::new(evaluator));
    info!("Services initialized");

    // 6. 执行一轮全站范围的批量评估
    let sweep = BatchSweep::new(
        selector,
        directory.clone(),
        campaigns,
        Duration::from_secs(config.batch.identity_spacing_seconds),
    );

    let identity_ids = directory.list_identity_ids().await?;
    let report = sweep.run(&identity_ids, &SelectionScope::SiteWide).await?;

    info!(
        processed = report.processed,
        failures = report.failures,
        "Batch sweep finished"
    );

    pool.close().await;
    Ok(())
}
