use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::{
    AnalysisWorker, ComplianceError, ComplianceReport, RiskTier, Severity, SeverityCounts,
    WorkerOutcome,
};
use crate::declaration::Declaration;

const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(120);

const HOLD_INSTRUCTION: &str = "HOLD: Do not release shipment pending investigation";
const SUPERVISOR_INSTRUCTION: &str = "Requires supervisor approval before clearance";

const CRITICAL_DEDUCTION: f64 = 0.25;
const HIGH_DEDUCTION: f64 = 0.15;
const MEDIUM_DEDUCTION: f64 = 0.08;
const LOW_DEDUCTION: f64 = 0.03;
const INFO_DEDUCTION: f64 = 0.01;

/// Fans one declaration out to every registered worker concurrently and
/// folds the complete outcome set into a single report.
///
/// Workers are dispatched in registration order and their outcomes are
/// reported in that same order regardless of completion order.
pub struct Orchestrator {
    workers: Vec<Arc<dyn AnalysisWorker>>,
    worker_timeout: Duration,
    run_timeout: Duration,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            worker_timeout: DEFAULT_WORKER_TIMEOUT,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, worker_timeout: Duration, run_timeout: Duration) -> Self {
        self.worker_timeout = worker_timeout;
        self.run_timeout = run_timeout;
        self
    }

    /// Append a worker to the dispatch order.
    pub fn register(mut self, worker: Arc<dyn AnalysisWorker>) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn worker_ids(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.id()).collect()
    }

    /// Run one full compliance check: validate, fan out, fan in,
    /// aggregate. Fatal only on missing input or an incomplete fan-in;
    /// individual worker failures surface on their outcomes.
    #[instrument(name = "compliance_check", skip_all, fields(workers = self.workers.len()))]
    pub async fn run_compliance_check(
        &self,
        declaration: &Declaration,
    ) -> Result<ComplianceReport, ComplianceError> {
        if declaration.is_empty() {
            return Err(ComplianceError::MissingInput);
        }

        let declaration = Arc::new(declaration.clone());
        let completed = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(self.workers.len());
        for worker in &self.workers {
            let worker = Arc::clone(worker);
            let declaration = Arc::clone(&declaration);
            let completed = Arc::clone(&completed);
            let worker_timeout = self.worker_timeout;
            handles.push(tokio::spawn(async move {
                let start = Instant::now();
                let outcome = match timeout(worker_timeout, worker.analyze(&declaration)).await {
                    Ok(Ok(mut findings)) => {
                        for finding in &mut findings {
                            if finding.worker.is_empty() {
                                finding.worker = worker.id().to_string();
                            }
                        }
                        WorkerOutcome::success(worker.id(), findings, start.elapsed())
                    }
                    Ok(Err(err)) => {
                        warn!(worker = worker.id(), error = %format!("{err:#}"), "worker failed");
                        WorkerOutcome::failure(worker.id(), format!("{err:#}"), start.elapsed())
                    }
                    Err(_) => {
                        warn!(worker = worker.id(), "worker timed out");
                        WorkerOutcome::failure(
                            worker.id(),
                            format!("timed out after {}ms", worker_timeout.as_millis()),
                            start.elapsed(),
                        )
                    }
                };
                completed.fetch_add(1, Ordering::SeqCst);
                outcome
            }));
        }

        let expected = handles.len();
        // Abandoning the run must cancel the still-running workers, not
        // leave them detached.
        let mut guard = AbortGuard::new(handles.iter().map(|h| h.abort_handle()).collect());

        let joined = match timeout(self.run_timeout, join_all(handles)).await {
            Ok(joined) => {
                guard.disarm();
                joined
            }
            Err(_) => {
                let received = completed.load(Ordering::SeqCst);
                drop(guard);
                return Err(ComplianceError::AggregationIncomplete { expected, received });
            }
        };

        let mut outcomes = Vec::with_capacity(expected);
        for (worker, joined) in self.workers.iter().zip(joined) {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                // A panicked worker is isolated like any other failure.
                Err(err) => outcomes.push(WorkerOutcome::failure(
                    worker.id(),
                    format!("worker panicked: {err}"),
                    Duration::ZERO,
                )),
            }
        }

        Ok(self.aggregate(&declaration, outcomes))
    }

    fn aggregate(&self, declaration: &Declaration, outcomes: Vec<WorkerOutcome>) -> ComplianceReport {
        let mut counts = SeverityCounts::default();
        for outcome in outcomes.iter().filter(|o| !o.is_error()) {
            for finding in &outcome.findings {
                match finding.severity {
                    Severity::Critical => counts.critical += 1,
                    Severity::High => counts.high += 1,
                    Severity::Medium => counts.medium += 1,
                    Severity::Low => counts.low += 1,
                    Severity::Info => counts.info += 1,
                }
            }
        }

        let (overall_risk, requires_manual_review) = risk_tier(&counts);
        let recommendations = self.recommendations(&outcomes, overall_risk);
        let processing_time_ms = outcomes.iter().map(|o| o.elapsed_ms).sum();

        let report = ComplianceReport {
            declaration_id: declaration
                .declaration_id
                .clone()
                .unwrap_or_else(|| format!("decl-{}", Utc::now().format("%Y%m%d%H%M%S"))),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            total_findings: counts.total(),
            severity_counts: counts,
            overall_risk,
            requires_manual_review,
            confidence: confidence_score(&counts),
            processing_time_ms,
            recommendations,
            worker_outcomes: outcomes,
        };
        debug!(
            total_findings = report.total_findings,
            risk = ?report.overall_risk,
            "aggregation completed"
        );
        report
    }

    /// One fixed remediation line per worker with a critical/high
    /// finding, in dispatch order, after the risk-tier instruction.
    fn recommendations(&self, outcomes: &[WorkerOutcome], risk: RiskTier) -> Vec<String> {
        let mut recommendations = Vec::new();
        for (worker, outcome) in self.workers.iter().zip(outcomes) {
            if outcome.is_error() {
                continue;
            }
            let qualifying = outcome
                .findings
                .iter()
                .any(|f| matches!(f.severity, Severity::Critical | Severity::High));
            if qualifying {
                if let Some(advice) = worker.remediation_advice() {
                    recommendations.push(advice.to_string());
                }
            }
        }
        match risk {
            RiskTier::Critical => recommendations.insert(0, HOLD_INSTRUCTION.to_string()),
            RiskTier::High => recommendations.insert(0, SUPERVISOR_INSTRUCTION.to_string()),
            _ => {}
        }
        recommendations
    }
}

/// Strict priority ladder, first match wins.
fn risk_tier(counts: &SeverityCounts) -> (RiskTier, bool) {
    if counts.critical > 0 {
        (RiskTier::Critical, true)
    } else if counts.high > 0 {
        (RiskTier::High, true)
    } else if counts.medium > 1 {
        (RiskTier::Medium, true)
    } else if counts.medium > 0 || counts.low > 0 {
        (RiskTier::Low, false)
    } else {
        (RiskTier::Clear, false)
    }
}

/// Verdict confidence: maximal with zero findings, deducted per finding
/// by severity, never increased by more or worse findings.
fn confidence_score(counts: &SeverityCounts) -> f64 {
    let deduction = counts.critical as f64 * CRITICAL_DEDUCTION
        + counts.high as f64 * HIGH_DEDUCTION
        + counts.medium as f64 * MEDIUM_DEDUCTION
        + counts.low as f64 * LOW_DEDUCTION
        + counts.info as f64 * INFO_DEDUCTION;
    (1.0 - deduction).clamp(0.0, 1.0)
}

struct AbortGuard {
    handles: Vec<AbortHandle>,
    armed: bool,
}

impl AbortGuard {
    fn new(handles: Vec<AbortHandle>) -> Self {
        Self {
            handles,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            for handle in &self.handles {
                handle.abort();
            }
        }
    }
}
