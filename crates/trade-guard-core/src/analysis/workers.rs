use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{AnalysisWorker, Confidence, Finding, Severity};
use crate::declaration::{Declaration, Party};
use crate::llm::LlmClient;
use crate::reference::sanctions::{EntityScreener, MatchType, ScreeningResult};
use crate::reference::tariff::{validate_code, TariffReference};
use crate::reference::{SanctionsStore, TariffStore};

const MAX_RAW_EXCERPT: usize = 500;
const SIMILAR_CODE_SUGGESTIONS: usize = 5;

/// One model-backed worker definition from the roster file.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSpec {
    pub id: String,
    pub instructions: String,
    #[serde(default)]
    pub remediation: Option<String>,
}

/// Load a worker roster from YAML.
pub fn load_roster(raw: &str) -> Result<Vec<WorkerSpec>> {
    let specs: Vec<WorkerSpec> =
        serde_yaml::from_str(raw).context("invalid worker roster YAML")?;
    let mut seen = std::collections::HashSet::new();
    for spec in &specs {
        if spec.id.trim().is_empty() {
            anyhow::bail!("worker id must not be blank");
        }
        if !seen.insert(spec.id.clone()) {
            anyhow::bail!("duplicate worker id `{}`", spec.id);
        }
    }
    Ok(specs)
}

/// Analysis worker backed by a language-model completion service.
///
/// Model output is untrusted text; the parse ladder guarantees a worker
/// never fails because the model ignored the JSON contract.
pub struct LlmWorker {
    id: String,
    instructions: String,
    remediation: Option<String>,
    client: Arc<dyn LlmClient>,
}

impl LlmWorker {
    pub fn new(spec: WorkerSpec, client: Arc<dyn LlmClient>) -> Self {
        Self {
            id: spec.id,
            instructions: spec.instructions,
            remediation: spec.remediation,
            client,
        }
    }

    /// Strict JSON, then lenient JSON5, then the first `{..}` block, then
    /// a single informational finding wrapping the raw text.
    fn parse_findings(&self, raw: &str) -> Vec<Finding> {
        if let Some(findings) = self.try_parse_document(raw) {
            return findings;
        }
        if let Some(block) = extract_json_block(raw) {
            if let Some(findings) = self.try_parse_document(block) {
                return findings;
            }
        }
        warn!(worker = %self.id, "model output was not parseable; falling back");
        if raw.trim().is_empty() {
            return Vec::new();
        }
        vec![Finding {
            code: "ANALYSIS_COMPLETE".into(),
            title: format!("{} analysis", self.id),
            description: truncate(raw, MAX_RAW_EXCERPT),
            severity: Severity::Info,
            confidence: Confidence::Low,
            evidence: Vec::new(),
            metadata: BTreeMap::new(),
            worker: self.id.clone(),
        }]
    }

    fn try_parse_document(&self, raw: &str) -> Option<Vec<Finding>> {
        let document: ModelDocument = serde_json::from_str(raw)
            .ok()
            .or_else(|| json5::from_str(raw).ok())?;
        Some(
            document
                .findings
                .into_iter()
                .map(|f| self.convert(f))
                .collect(),
        )
    }

    fn convert(&self, raw: ModelFinding) -> Finding {
        Finding {
            code: raw.code.unwrap_or_else(|| "UNKNOWN".into()),
            title: raw.title.unwrap_or_else(|| "Finding".into()),
            description: raw.description.unwrap_or_default(),
            severity: parse_severity(raw.severity.as_deref()),
            confidence: parse_confidence(raw.confidence.as_deref()),
            evidence: raw.evidence,
            metadata: raw.metadata,
            worker: self.id.clone(),
        }
    }
}

#[async_trait]
impl AnalysisWorker for LlmWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn remediation_advice(&self) -> Option<&str> {
        self.remediation.as_deref()
    }

    #[instrument(name = "llm_worker", skip_all, fields(worker = %self.id))]
    async fn analyze(&self, declaration: &Declaration) -> Result<Vec<Finding>> {
        let prompt = declaration.to_prompt();
        let raw = self
            .client
            .complete(&self.instructions, &prompt)
            .await
            .with_context(|| format!("completion call failed for worker `{}`", self.id))?;
        let findings = self.parse_findings(&raw);
        debug!(findings = findings.len(), "model worker completed");
        Ok(findings)
    }
}

#[derive(Deserialize)]
struct ModelDocument {
    #[serde(default)]
    findings: Vec<ModelFinding>,
}

#[derive(Deserialize)]
struct ModelFinding {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    evidence: Vec<String>,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

static JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("json block pattern compiles"));

fn extract_json_block(raw: &str) -> Option<&str> {
    JSON_BLOCK.find(raw).map(|m| m.as_str())
}

/// Unknown severity strings degrade to medium rather than dropping the
/// finding.
fn parse_severity(raw: Option<&str>) -> Severity {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("info") => Severity::Info,
        Some("low") => Severity::Low,
        Some("high") => Severity::High,
        Some("critical") => Severity::Critical,
        _ => Severity::Medium,
    }
}

fn parse_confidence(raw: Option<&str>) -> Confidence {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("low") => Confidence::Low,
        Some("high") => Confidence::High,
        _ => Confidence::Medium,
    }
}

fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "…"
}

/// Screens the shipper and consignee against the sanctions list.
pub struct SanctionsWorker<S: SanctionsStore> {
    screener: EntityScreener<S>,
    strict: bool,
}

impl<S: SanctionsStore> SanctionsWorker<S> {
    pub const ID: &'static str = "sanctions-screening";

    pub fn new(screener: EntityScreener<S>) -> Self {
        Self {
            screener,
            strict: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn finding_for(&self, role: &str, party: &Party, result: &ScreeningResult) -> Option<Finding> {
        let top = result.matches.first()?;
        let severity = if result
            .matches
            .iter()
            .any(|m| m.match_type == MatchType::Exact)
        {
            Severity::Critical
        } else if top.relevance >= 0.8 {
            Severity::High
        } else {
            Severity::Medium
        };
        let confidence = match severity {
            Severity::Critical => Confidence::High,
            Severity::High => Confidence::Medium,
            _ => Confidence::Low,
        };
        let evidence = result
            .matches
            .iter()
            .map(|m| {
                format!(
                    "{} [{}] relevance {:.2} ({:?})",
                    m.entity.name, m.entity.regime_code, m.relevance, m.match_type
                )
            })
            .collect();
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "exact_matches".to_string(),
            serde_json::json!(result.exact_matches),
        );
        metadata.insert(
            "partial_matches".to_string(),
            serde_json::json!(result.partial_matches),
        );
        Some(Finding {
            code: format!("SANCTIONS_{}_MATCH", role.to_uppercase()),
            title: format!("Possible sanctions match for {role}"),
            description: format!(
                "{} `{}` matched {} entr{} on the sanctions list",
                role,
                party.name,
                result.matches.len(),
                if result.matches.len() == 1 { "y" } else { "ies" }
            ),
            severity,
            confidence,
            evidence,
            metadata,
            worker: Self::ID.to_string(),
        })
    }
}

#[async_trait]
impl<S: SanctionsStore + 'static> AnalysisWorker for SanctionsWorker<S> {
    fn id(&self) -> &str {
        Self::ID
    }

    fn remediation_advice(&self) -> Option<&str> {
        Some("Escalate to sanctions compliance officer for review")
    }

    #[instrument(name = "sanctions_worker", skip_all)]
    async fn analyze(&self, declaration: &Declaration) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for (role, party) in [
            ("shipper", &declaration.shipper),
            ("consignee", &declaration.consignee),
        ] {
            if party.name.trim().is_empty() {
                continue;
            }
            let country = (!party.country.trim().is_empty()).then_some(party.country.as_str());
            let result = self
                .screener
                .screen(&party.name, country, self.strict)
                .await
                .with_context(|| format!("sanctions screening failed for {role}"))?;
            if let Some(finding) = self.finding_for(role, party, &result) {
                findings.push(finding);
            }
        }
        Ok(findings)
    }
}

/// Validates every declared goods code against the tariff reference.
pub struct TariffWorker<S: TariffStore> {
    reference: TariffReference<S>,
}

impl<S: TariffStore> TariffWorker<S> {
    pub const ID: &'static str = "tariff-validation";

    pub fn new(reference: TariffReference<S>) -> Self {
        Self { reference }
    }
}

#[async_trait]
impl<S: TariffStore + 'static> AnalysisWorker for TariffWorker<S> {
    fn id(&self) -> &str {
        Self::ID
    }

    fn remediation_advice(&self) -> Option<&str> {
        Some("Verify tariff classification with a specialist")
    }

    #[instrument(name = "tariff_worker", skip_all)]
    async fn analyze(&self, declaration: &Declaration) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for (idx, line) in declaration.goods.iter().enumerate() {
            if line.code.trim().is_empty() {
                findings.push(Finding {
                    code: "TARIFF_CODE_MISSING".into(),
                    title: "Goods line has no tariff code".into(),
                    description: format!("Goods line {} declares no classification code", idx + 1),
                    severity: Severity::Medium,
                    confidence: Confidence::High,
                    evidence: vec![line.description.clone()],
                    metadata: BTreeMap::new(),
                    worker: Self::ID.to_string(),
                });
                continue;
            }

            let validation = validate_code(&line.code);
            if !validation.is_valid_format {
                findings.push(Finding {
                    code: "TARIFF_FORMAT_INVALID".into(),
                    title: "Tariff code format is invalid".into(),
                    description: format!(
                        "Goods line {} code `{}` failed format validation",
                        idx + 1,
                        line.code
                    ),
                    severity: Severity::High,
                    confidence: Confidence::High,
                    evidence: validation.issues.clone(),
                    metadata: BTreeMap::new(),
                    worker: Self::ID.to_string(),
                });
                continue;
            }

            let hit = self
                .reference
                .lookup(&line.code)
                .await
                .with_context(|| format!("tariff lookup failed for `{}`", line.code))?;
            if hit.is_none() {
                let similar = self
                    .reference
                    .find_similar(&line.code, SIMILAR_CODE_SUGGESTIONS)
                    .await
                    .context("similar-code search failed")?;
                let evidence = similar
                    .iter()
                    .map(|c| format!("{}: {}", c.code, c.description))
                    .collect();
                findings.push(Finding {
                    code: "TARIFF_CODE_UNKNOWN".into(),
                    title: "Tariff code not found in reference data".into(),
                    description: format!(
                        "Goods line {} code `{}` (normalized `{}`) is not in the tariff reference",
                        idx + 1,
                        line.code,
                        validation.normalized
                    ),
                    severity: Severity::Medium,
                    confidence: Confidence::Medium,
                    evidence,
                    metadata: BTreeMap::new(),
                    worker: Self::ID.to_string(),
                });
            }
        }
        Ok(findings)
    }
}
