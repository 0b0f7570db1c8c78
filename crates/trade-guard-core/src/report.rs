use std::fmt::Write;

use crate::analysis::{ComplianceReport, RiskTier, Severity};

/// Format styles supported in default reporter implementations.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a report string from a `ComplianceReport` using the desired format.
pub fn render_report(report: &ComplianceReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(report),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn render_human(report: &ComplianceReport) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "Compliance Report: {}", report.declaration_id)?;
    writeln!(out, "Generated: {}", report.timestamp)?;
    writeln!(
        out,
        "Overall Risk: {} ({})",
        tier_label(report.overall_risk),
        if report.requires_manual_review {
            "manual review required"
        } else {
            "no manual review"
        }
    )?;
    writeln!(out, "Confidence: {:.2}", report.confidence)?;
    writeln!(
        out,
        "Findings: {} (critical {}, high {}, medium {}, low {}, info {})",
        report.total_findings,
        report.severity_counts.critical,
        report.severity_counts.high,
        report.severity_counts.medium,
        report.severity_counts.low,
        report.severity_counts.info,
    )?;
    writeln!(out, "Worker Time: {}ms", report.processing_time_ms)?;

    for outcome in &report.worker_outcomes {
        writeln!(out)?;
        match &outcome.error {
            Some(error) => {
                writeln!(out, "[{}] FAILED ({}ms)", outcome.worker, outcome.elapsed_ms)?;
                writeln!(out, "  error: {}", sanitize_line(error))?;
            }
            None if outcome.findings.is_empty() => {
                writeln!(out, "[{}] clear ({}ms)", outcome.worker, outcome.elapsed_ms)?;
            }
            None => {
                writeln!(
                    out,
                    "[{}] {} finding(s) ({}ms)",
                    outcome.worker,
                    outcome.findings.len(),
                    outcome.elapsed_ms
                )?;
                for finding in &outcome.findings {
                    writeln!(
                        out,
                        "  - {} [{}] {}",
                        finding.code,
                        severity_label(finding.severity),
                        sanitize_line(&finding.title)
                    )?;
                    for evidence in &finding.evidence {
                        writeln!(out, "      {}", sanitize_line(evidence))?;
                    }
                }
            }
        }
    }

    if !report.recommendations.is_empty() {
        writeln!(out)?;
        writeln!(out, "Recommendations:")?;
        for recommendation in &report.recommendations {
            writeln!(out, "  - {recommendation}")?;
        }
    }

    Ok(out)
}

fn tier_label(tier: RiskTier) -> &'static str {
    match tier {
        RiskTier::Clear => "CLEAR",
        RiskTier::Low => "LOW",
        RiskTier::Medium => "MEDIUM",
        RiskTier::High => "HIGH",
        RiskTier::Critical => "CRITICAL",
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
        Severity::Critical => "critical",
    }
}

fn sanitize_line(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}
