//! 评估审计
//!
//! 每次评估产出一条审计记录，供分析使用。审计永远不参与控制流，
//! 记录失败也不影响评估结果。

use async_trait::async_trait;
use gate_shared::observability::metric;
use tracing::info;

use crate::models::EvaluationAudit;

/// 审计落点接口
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// 记录一次评估；实现方自行消化内部错误
    async fn record(&self, audit: &EvaluationAudit);
}

/// 基于 tracing 与指标的审计落点
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, audit: &EvaluationAudit) {
        info!(
            audit_id = %audit.id,
            campaign_id = audit.campaign_id,
            identity_id = audit.identity_id,
            eligible = audit.eligible,
            reason = audit.reason.as_str(),
            resolver_calls = audit.resolver_calls,
            duration_ms = audit.duration_ms,
            "eligibility evaluated"
        );

        let outcome = if audit.eligible { "eligible" } else { "ineligible" };
        metrics::counter!(metric::EVALUATIONS, "outcome" => outcome).increment(1);
        metrics::histogram!(metric::EVALUATION_DURATION)
            .record(audit.duration_ms as f64 / 1000.0);
    }
}
