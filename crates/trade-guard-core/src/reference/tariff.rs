use std::sync::Arc;

use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{ReferenceError, TariffStore};

/// Internal representation is always exactly this many digits.
pub const NORMALIZED_LEN: usize = 10;
const CHAPTER_LEN: usize = 2;
const MIN_DECLARED_DIGITS: usize = 4;
const MAX_KEYWORDS: usize = 5;

/// One tariff classification record. Chapter/heading/subheading are
/// prefixes of the normalized code; any stored copy must agree with the
/// recomputed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffCode {
    /// 10-digit normalized code.
    pub code: String,
    pub description: String,
    /// 2-digit chapter (first two digits of `code`).
    pub chapter: String,
    /// 4-digit heading.
    pub heading: String,
    /// 6-digit subheading.
    pub subheading: String,
    #[serde(default)]
    pub valid_from: String,
    #[serde(default)]
    pub valid_to: String,
}

impl TariffCode {
    /// Check the stored classification prefixes against the ones derived
    /// from the code itself.
    pub fn prefixes_consistent(&self) -> bool {
        let derived = CodeComponents::of(&self.code);
        self.chapter == derived.chapter
            && self.heading == derived.heading
            && self.subheading == derived.subheading
    }
}

/// Classification prefixes derived from a normalized code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeComponents {
    pub chapter: String,
    pub heading: String,
    pub subheading: String,
    pub full: String,
}

impl CodeComponents {
    /// Derive components from a code, normalizing first.
    pub fn of(code: &str) -> Self {
        let full = normalize_code(code);
        Self {
            chapter: full[..2].to_string(),
            heading: full[..4].to_string(),
            subheading: full[..6].to_string(),
            full,
        }
    }
}

/// Outcome of format validation for a declared code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeValidation {
    pub original: String,
    /// Digits of the original, before padding.
    pub stripped: String,
    pub normalized: String,
    pub is_valid_format: bool,
    pub issues: Vec<String>,
    pub components: Option<CodeComponents>,
}

/// Strip every non-digit character and right-pad with zeros to ten
/// digits. Padding is always on the right: a short code is ambiguous
/// about its trailing digits, never its leading ones.
pub fn normalize_code(raw: &str) -> String {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    while digits.len() < NORMALIZED_LEN {
        digits.push('0');
    }
    digits
}

/// Validate a declared code: digit count of the stripped original must be
/// within [4,10], then the chapter must parse into [1,99].
pub fn validate_code(raw: &str) -> CodeValidation {
    let stripped: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let normalized = normalize_code(raw);
    let mut result = CodeValidation {
        original: raw.to_string(),
        stripped: stripped.clone(),
        normalized,
        is_valid_format: false,
        issues: Vec::new(),
        components: None,
    };

    // A bare 2-digit chapter is accepted alongside full 4-10 digit codes.
    let len = stripped.len();
    if len > NORMALIZED_LEN {
        result.issues.push(format!(
            "Code too long ({len} digits, maximum {NORMALIZED_LEN})"
        ));
        return result;
    }
    if len != CHAPTER_LEN && len < MIN_DECLARED_DIGITS {
        result.issues.push(format!(
            "Code too short ({len} digits, minimum {MIN_DECLARED_DIGITS})"
        ));
        return result;
    }

    let components = CodeComponents::of(&stripped);
    match components.chapter.parse::<u32>() {
        Ok(chapter) if (1..=99).contains(&chapter) => {
            result.is_valid_format = true;
            result.components = Some(components);
        }
        Ok(chapter) => {
            result.issues.push(format!("Invalid chapter code: {chapter}"));
        }
        Err(_) => {
            result
                .issues
                .push(format!("Invalid chapter code: {}", components.chapter));
        }
    }
    result
}

/// Normalizes, validates, looks up, and fuzzy-searches tariff codes on
/// top of a read-only store. Safe for concurrent use by multiple workers.
pub struct TariffReference<S: TariffStore> {
    store: Arc<S>,
}

impl<S: TariffStore> TariffReference<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Exact lookup by normalized code. The chapter partition key is
    /// always derived from the code, never supplied by the caller.
    pub async fn lookup(&self, raw: &str) -> Result<Option<TariffCode>, ReferenceError> {
        let normalized = normalize_code(raw);
        let chapter = &normalized[..2];
        trace!(code = %normalized, chapter, "tariff lookup");
        self.store.get(chapter, &normalized).await
    }

    /// Keyword search against descriptions, at most five keywords.
    pub async fn search_descriptions(
        &self,
        keywords: &[String],
        chapter: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<TariffCode>, ReferenceError> {
        let capped = &keywords[..keywords.len().min(MAX_KEYWORDS)];
        self.store
            .search_descriptions(capped, chapter, max_results)
            .await
    }

    /// Codes sharing the declared code's 4-digit heading. An invalid
    /// input format yields an empty list rather than a guess.
    pub async fn find_similar(
        &self,
        raw: &str,
        max_results: usize,
    ) -> Result<Vec<TariffCode>, ReferenceError> {
        let validation = validate_code(raw);
        let Some(components) = validation.components else {
            debug!(code = raw, "similar-code search skipped for invalid format");
            return Ok(Vec::new());
        };
        let mut similar = self.store.codes_by_heading(&components.heading).await?;
        similar.truncate(max_results);
        Ok(similar)
    }

    /// All codes in one chapter, capped.
    pub async fn codes_by_chapter(
        &self,
        chapter: &str,
        max_results: usize,
    ) -> Result<Vec<TariffCode>, ReferenceError> {
        self.store.codes_by_chapter(chapter, max_results).await
    }
}

/// In-memory tariff store, also the backing for the file-loaded store.
pub struct MemoryTariffStore {
    /// Kept sorted by code so every listing is deterministic.
    records: Vec<TariffCode>,
}

impl MemoryTariffStore {
    /// Records with prefixes that disagree with the code would silently
    /// miss every chapter-keyed lookup, so they are rejected up front.
    pub fn new(mut records: Vec<TariffCode>) -> Self {
        for record in &records {
            debug_assert!(
                record.prefixes_consistent(),
                "tariff code `{}` stored prefixes disagree with the code",
                record.code
            );
        }
        records.sort_by(|a, b| a.code.cmp(&b.code));
        Self { records }
    }
}

#[async_trait]
impl TariffStore for MemoryTariffStore {
    async fn get(&self, chapter: &str, code: &str) -> Result<Option<TariffCode>, ReferenceError> {
        Ok(self
            .records
            .iter()
            .find(|r| r.chapter == chapter && r.code == code)
            .cloned())
    }

    async fn codes_by_chapter(
        &self,
        chapter: &str,
        max_results: usize,
    ) -> Result<Vec<TariffCode>, ReferenceError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.chapter == chapter)
            .take(max_results)
            .cloned()
            .collect())
    }

    async fn codes_by_heading(&self, heading: &str) -> Result<Vec<TariffCode>, ReferenceError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.heading == heading)
            .cloned()
            .collect())
    }

    async fn search_descriptions(
        &self,
        keywords: &[String],
        chapter: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<TariffCode>, ReferenceError> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(keywords)
            .map_err(|err| {
                ReferenceError::Unavailable(format!("failed to build keyword automaton: {err}"))
            })?;
        Ok(self
            .records
            .iter()
            .filter(|r| chapter.map_or(true, |c| r.chapter == c))
            .filter(|r| automaton.is_match(&r.description))
            .take(max_results)
            .cloned()
            .collect())
    }
}
