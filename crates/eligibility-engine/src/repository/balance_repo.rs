//! 余额记录仓储

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;

use super::traits::BalanceStore;
use crate::error::Result;
use crate::models::BalanceRecord;

/// 余额记录仓储
///
/// 唯一的持久化写入是按 (identity_id, token_contract) 的简单 upsert，
/// 时间戳由数据库赋值，last-writer-wins。
pub struct PgBalanceStore {
    pool: PgPool,
}

impl PgBalanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceStore for PgBalanceStore {
    async fn get(&self, identity_id: i64, token_contract: &str) -> Result<Option<BalanceRecord>> {
        let record = sqlx::query_as::<_, BalanceRecord>(
            r#"
            SELECT identity_id, token_contract, total, breakdown, updated_at
            FROM balance_records
            WHERE identity_id = $1 AND token_contract = $2
            "#,
        )
        .bind(identity_id)
        .bind(token_contract)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn upsert(
        &self,
        identity_id: i64,
        token_contract: &str,
        total: Decimal,
        breakdown: Value,
    ) -> Result<BalanceRecord> {
        let record = sqlx::query_as::<_, BalanceRecord>(
            r#"
            INSERT INTO balance_records (identity_id, token_contract, total, breakdown, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (identity_id, token_contract)
            DO UPDATE SET total = EXCLUDED.total,
                          breakdown = EXCLUDED.breakdown,
                          updated_at = now()
            RETURNING identity_id, token_contract, total, breakdown, updated_at
            "#,
        )
        .bind(identity_id)
        .bind(token_contract)
        .bind(total)
        .bind(breakdown)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }
}
