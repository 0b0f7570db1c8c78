use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::declaration::Declaration;

pub mod orchestrator;
pub mod workers;

/// Ordinal seriousness of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];
}

/// How sure the producing worker is about its own finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// One structured compliance observation produced by one worker.
///
/// Findings are immutable once produced; the aggregator reads and groups
/// them but never rewrites them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Short machine identifier (namespaced, e.g. `SANCTIONS_EXACT_MATCH`).
    pub code: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub confidence: Confidence,
    /// Supporting evidence lines, in the order the worker observed them.
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Identifier of the worker that produced this finding.
    #[serde(default)]
    pub worker: String,
}

impl Finding {
    pub fn validate(&self) -> Result<(), FindingValidationError> {
        if self.code.trim().is_empty() {
            return Err(FindingValidationError::EmptyCode);
        }
        if self.title.trim().is_empty() {
            return Err(FindingValidationError::EmptyTitle {
                code: self.code.clone(),
            });
        }
        Ok(())
    }
}

/// Validation errors for findings emitted by workers.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingValidationError {
    #[error("finding code must not be blank")]
    EmptyCode,
    #[error("finding `{code}` title must not be blank")]
    EmptyTitle { code: String },
}

/// Complete result of one analysis worker for one run.
///
/// Carries either findings or an error, never both: a worker that failed
/// contributes zero evidence to the aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerOutcome {
    pub worker: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkerOutcome {
    pub fn success(worker: impl Into<String>, findings: Vec<Finding>, elapsed: Duration) -> Self {
        Self {
            worker: worker.into(),
            findings,
            elapsed_ms: elapsed.as_millis() as u64,
            error: None,
        }
    }

    pub fn failure(worker: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            worker: worker.into(),
            findings: Vec::new(),
            elapsed_ms: elapsed.as_millis() as u64,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Overall verdict tiers, worst first in the aggregation priority ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Clear,
    Low,
    Medium,
    High,
    Critical,
}

/// Counts of findings per severity across all successful outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Final aggregated verdict for one declaration. Built exactly once per
/// run from the complete set of worker outcomes; terminal and read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub declaration_id: String,
    pub timestamp: String,
    /// Outcomes in worker-dispatch order, not completion order.
    pub worker_outcomes: Vec<WorkerOutcome>,
    pub total_findings: usize,
    pub severity_counts: SeverityCounts,
    pub overall_risk: RiskTier,
    pub requires_manual_review: bool,
    /// Confidence in the verdict, 1.0 when nothing was found.
    pub confidence: f64,
    /// Sum of per-worker elapsed times (workload cost, not latency).
    pub processing_time_ms: u64,
    pub recommendations: Vec<String>,
}

/// Fatal errors for a whole compliance run. Failures inside a single
/// worker are never fatal; they surface on that worker's outcome instead.
#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("declaration is missing or empty; nothing to analyze")]
    MissingInput,
    #[error("aggregation incomplete: received {received} of {expected} worker outcomes")]
    AggregationIncomplete { expected: usize, received: usize },
}

/// One independent analysis check run against a declaration.
///
/// Implementations must be safe to call concurrently and must not share
/// run-scoped mutable state with other workers.
#[async_trait]
pub trait AnalysisWorker: Send + Sync {
    /// Stable identifier recorded on findings and outcomes.
    fn id(&self) -> &str;

    /// Fixed remediation line appended to report recommendations when this
    /// worker produced a critical or high finding.
    fn remediation_advice(&self) -> Option<&str> {
        None
    }

    /// Analyze one declaration, returning findings (possibly none) or an
    /// error. An error means the check was skipped, not that it passed.
    async fn analyze(&self, declaration: &Declaration) -> AnyResult<Vec<Finding>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_from_info_to_critical() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        let parsed: Severity = serde_json::from_str("\"info\"").unwrap();
        assert_eq!(parsed, Severity::Info);
    }

    #[test]
    fn finding_validation_rejects_blank_code() {
        let finding = Finding {
            code: "  ".into(),
            title: "t".into(),
            description: String::new(),
            severity: Severity::Low,
            confidence: Confidence::Medium,
            evidence: Vec::new(),
            metadata: BTreeMap::new(),
            worker: "w".into(),
        };
        assert!(matches!(
            finding.validate(),
            Err(FindingValidationError::EmptyCode)
        ));
    }

    #[test]
    fn failure_outcome_carries_no_findings() {
        let outcome = WorkerOutcome::failure("sanctions", "store down", Duration::from_millis(12));
        assert!(outcome.is_error());
        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.elapsed_ms, 12);
    }

    #[test]
    fn severity_counts_total_sums_all_tiers() {
        let counts = SeverityCounts {
            critical: 1,
            high: 2,
            medium: 3,
            low: 4,
            info: 5,
        };
        assert_eq!(counts.total(), 15);
    }
}
