//! 批量资格评估
//!
//! 逐个身份顺序处理并插入多秒间隔，避免对上游 RPC 形成压力。
//! 单个身份的失败只记录不中断，批次继续推进。

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::error::{EngineError, Result};
use crate::repository::{CampaignStore, IdentityDirectory};
use crate::selector::{DiscountSelector, SelectionScope};

/// 单个身份的处理结果
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub identity_id: i64,
    /// 胜出活动 ID，无可应用活动时为 None
    pub winner: Option<i64>,
    /// 处理失败时的错误描述
    pub error: Option<String>,
}

/// 批次报告
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub failures: usize,
    pub outcomes: Vec<BatchOutcome>,
}

/// 批量评估任务
pub struct BatchSweep {
    selector: Arc<DiscountSelector>,
    directory: Arc<dyn IdentityDirectory>,
    campaigns: Arc<dyn CampaignStore>,
    /// 相邻身份之间的间隔
    spacing: Duration,
}

impl BatchSweep {
    pub fn new(
        selector: Arc<DiscountSelector>,
        directory: Arc<dyn IdentityDirectory>,
        campaigns: Arc<dyn CampaignStore>,
        spacing: Duration,
    ) -> Self {
        Self {
            selector,
            directory,
            campaigns,
            spacing,
        }
    }

    /// 对一组身份执行一轮评估
    #[instrument(skip(self, identity_ids, scope), fields(count = identity_ids.len()))]
    pub async fn run(&self, identity_ids: &[i64], scope: &SelectionScope) -> Result<BatchReport> {
        let campaigns = self.campaigns.list_auto_apply().await?;
        info!(
            identities = identity_ids.len(),
            campaigns = campaigns.len(),
            "批量评估开始"
        );

        let mut report = BatchReport::default();

        for (index, identity_id) in identity_ids.iter().copied().enumerate() {
            if index > 0 && !self.spacing.is_zero() {
                tokio::time::sleep(self.spacing).await;
            }

            let outcome = match self.directory.identity(identity_id).await {
                Ok(Some(identity)) => {
                    let winner = self.selector.select(&campaigns, scope, &identity).await;
                    BatchOutcome {
                        identity_id,
                        winner: winner.map(|c| c.id),
                        error: None,
                    }
                }
                Ok(None) => BatchOutcome {
                    identity_id,
                    winner: None,
                    error: Some(EngineError::IdentityNotFound(identity_id).to_string()),
                },
                Err(e) => {
                    warn!(identity_id, error = %e, "身份处理失败，批次继续");
                    BatchOutcome {
                        identity_id,
                        winner: None,
                        error: Some(e.to_string()),
                    }
                }
            };

            if outcome.error.is_some() {
                report.failures += 1;
            }
            report.processed += 1;
            report.outcomes.push(outcome);
        }

        info!(
            processed = report.processed,
            failures = report.failures,
            "批量评估完成"
        );
        Ok(report)
    }
}
