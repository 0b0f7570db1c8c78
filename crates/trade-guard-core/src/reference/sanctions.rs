use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ReferenceError, SanctionsStore};

const MAX_CANDIDATES: usize = 50;
const EXACT_RELEVANCE: f64 = 1.0;
const STRONG_PARTIAL_RELEVANCE: f64 = 0.8;
const PARTIAL_RELEVANCE: f64 = 0.5;
const COUNTRY_BOOST: f64 = 0.2;
const STRICT_THRESHOLD: f64 = 0.8;
const MIN_TOKEN_LEN: usize = 3;

/// What kind of party a listed entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Individual,
    Organization,
    Vessel,
}

/// One designation from the sanctions list. Read-only reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionedEntity {
    pub unique_id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub regime_code: String,
    pub regime_name: String,
    #[serde(default)]
    pub sanctions_imposed: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub address_country: String,
    #[serde(default)]
    pub date_designated: String,
}

/// How a candidate's name relates to the screened name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Case-folded names identical.
    Exact,
    /// One name contains the other as a substring.
    StrongPartial,
    /// Returned by the retrieval at all (e.g. token overlap).
    Partial,
}

/// One ranked candidate match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMatch {
    pub entity: SanctionedEntity,
    pub match_type: MatchType,
    pub relevance: f64,
}

/// Screening verdict for one name/country pair.
///
/// This is a screening heuristic, not a legal determination: false
/// positives are expected and carry their match type so a reviewer can
/// adjudicate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub matched: bool,
    /// Counted before any strict-mode filtering, for transparency.
    pub exact_matches: usize,
    pub partial_matches: usize,
    pub matches: Vec<EntityMatch>,
    pub screened_name: String,
    pub screened_country: Option<String>,
}

/// Fuzzy name/country screener over a read-only sanctions store.
pub struct EntityScreener<S: SanctionsStore> {
    store: Arc<S>,
}

impl<S: SanctionsStore> EntityScreener<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Screen an entity name against the list.
    ///
    /// Classification per candidate: exact (1.0), strong partial (0.8,
    /// substring either direction), partial (0.5, retrieved at all). A
    /// matching country adds +0.2 capped at 1.0. Strict mode drops
    /// matches below 0.8 from the ranked list only; the exact/partial
    /// counters always reflect the pre-filter classification.
    #[instrument(skip(self))]
    pub async fn screen(
        &self,
        name: &str,
        country: Option<&str>,
        strict: bool,
    ) -> Result<ScreeningResult, ReferenceError> {
        let query = name.trim().to_lowercase();
        let candidates = self
            .store
            .search_by_name(name, MAX_CANDIDATES, None)
            .await?;

        let mut exact_matches = 0;
        let mut partial_matches = 0;
        let mut matches = Vec::new();

        for entity in candidates {
            let candidate = entity.name.trim().to_lowercase();
            let (match_type, mut relevance) = if candidate == query {
                exact_matches += 1;
                (MatchType::Exact, EXACT_RELEVANCE)
            } else if query.contains(&candidate) || candidate.contains(&query) {
                partial_matches += 1;
                (MatchType::StrongPartial, STRONG_PARTIAL_RELEVANCE)
            } else {
                partial_matches += 1;
                (MatchType::Partial, PARTIAL_RELEVANCE)
            };

            if let Some(country) = country {
                let country = country.trim().to_lowercase();
                if !country.is_empty()
                    && (entity.nationality.to_lowercase().contains(&country)
                        || entity.address_country.to_lowercase().contains(&country))
                {
                    relevance = (relevance + COUNTRY_BOOST).min(EXACT_RELEVANCE);
                }
            }

            if strict && relevance < STRICT_THRESHOLD {
                continue;
            }

            matches.push(EntityMatch {
                entity,
                match_type,
                relevance,
            });
        }

        // Stable sort keeps retrieval order for equal relevance.
        matches.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal)
        });

        debug!(
            matches = matches.len(),
            exact_matches, partial_matches, "entity screening completed"
        );

        Ok(ScreeningResult {
            matched: !matches.is_empty(),
            exact_matches,
            partial_matches,
            matches,
            screened_name: name.to_string(),
            screened_country: country.map(str::to_string),
        })
    }

    /// Entities associated with a country through nationality or address.
    pub async fn search_by_country(
        &self,
        country: &str,
        max_results: usize,
    ) -> Result<Vec<SanctionedEntity>, ReferenceError> {
        self.store.search_by_country(country, max_results).await
    }

    /// Distinct sanction regime codes on the list.
    pub async fn regimes(&self) -> Result<Vec<String>, ReferenceError> {
        self.store.regimes().await
    }
}

/// In-memory sanctions store, also the backing for the file-loaded store.
pub struct MemorySanctionsStore {
    entities: Vec<SanctionedEntity>,
}

impl MemorySanctionsStore {
    pub fn new(entities: Vec<SanctionedEntity>) -> Self {
        Self { entities }
    }
}

/// Retrieval rule: containment in either direction, or overlap on any
/// query token of three or more characters.
fn name_candidate(entity_name: &str, query: &str) -> bool {
    let entity_name = entity_name.trim().to_lowercase();
    let query = query.trim().to_lowercase();
    if entity_name.is_empty() || query.is_empty() {
        return false;
    }
    if entity_name.contains(&query) || query.contains(&entity_name) {
        return true;
    }
    query
        .split_whitespace()
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .any(|token| entity_name.contains(token))
}

#[async_trait]
impl SanctionsStore for MemorySanctionsStore {
    async fn search_by_name(
        &self,
        name: &str,
        max_results: usize,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<SanctionedEntity>, ReferenceError> {
        Ok(self
            .entities
            .iter()
            .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
            .filter(|e| name_candidate(&e.name, name))
            .take(max_results)
            .cloned()
            .collect())
    }

    async fn search_by_country(
        &self,
        country: &str,
        max_results: usize,
    ) -> Result<Vec<SanctionedEntity>, ReferenceError> {
        let query = country.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .entities
            .iter()
            .filter(|e| {
                e.nationality.to_lowercase().contains(&query)
                    || e.address_country.to_lowercase().contains(&query)
            })
            .take(max_results)
            .cloned()
            .collect())
    }

    async fn regimes(&self) -> Result<Vec<String>, ReferenceError> {
        let mut regimes: Vec<String> = self
            .entities
            .iter()
            .map(|e| e.regime_code.clone())
            .collect();
        regimes.sort();
        regimes.dedup();
        Ok(regimes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn entity(name: &str, nationality: &str, country: &str) -> SanctionedEntity {
        SanctionedEntity {
            unique_id: format!("UID-{}", name.len()),
            name: name.into(),
            entity_type: EntityType::Organization,
            regime_code: "RUS".into(),
            regime_name: "Russia".into(),
            sanctions_imposed: "Asset freeze".into(),
            nationality: nationality.into(),
            address_country: country.into(),
            date_designated: "2022-03-01".into(),
        }
    }

    fn screener(entities: Vec<SanctionedEntity>) -> EntityScreener<MemorySanctionsStore> {
        EntityScreener::new(Arc::new(MemorySanctionsStore::new(entities)))
    }

    #[tokio::test]
    async fn identical_name_is_an_exact_match() {
        let screener = screener(vec![entity("Petrov Industrial Supplies", "Russia", "Russia")]);
        let result = screener
            .screen("Petrov Industrial Supplies", None, false)
            .await
            .unwrap();
        assert!(result.matched);
        assert_eq!(result.exact_matches, 1);
        assert_eq!(result.matches[0].match_type, MatchType::Exact);
        assert!((result.matches[0].relevance - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn contained_name_is_a_strong_partial() {
        let screener = screener(vec![entity("Petrov Industrial", "Russia", "Russia")]);
        let result = screener
            .screen("Petrov Industrial Supplies", None, false)
            .await
            .unwrap();
        assert_eq!(result.matches[0].match_type, MatchType::StrongPartial);
        assert!((result.matches[0].relevance - 0.8).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn country_boost_saturates_a_strong_partial() {
        let screener = screener(vec![entity("Petrov Industrial", "Russia", "Russia")]);
        let result = screener
            .screen("Petrov Industrial Supplies", Some("Russia"), false)
            .await
            .unwrap();
        // 0.8 + 0.2 hits the cap exactly.
        assert_eq!(result.matches[0].match_type, MatchType::StrongPartial);
        assert!((result.matches[0].relevance - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn country_boost_lifts_a_plain_partial() {
        let screener = screener(vec![entity("Petrov Metals Ltd", "Russia", "Russia")]);
        let result = screener
            .screen("Petrov Industrial Supplies", Some("Russia"), false)
            .await
            .unwrap();
        assert_eq!(result.matches[0].match_type, MatchType::Partial);
        assert!((result.matches[0].relevance - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn boost_caps_at_one() {
        let screener = screener(vec![entity("Petrov Industrial Supplies", "Russia", "Russia")]);
        let result = screener
            .screen("Petrov Industrial Supplies", Some("Russia"), false)
            .await
            .unwrap();
        assert!((result.matches[0].relevance - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn token_overlap_is_a_plain_partial() {
        let screener = screener(vec![entity("Petrov Metals Ltd", "Russia", "Russia")]);
        let result = screener
            .screen("Petrov Industrial Supplies", None, false)
            .await
            .unwrap();
        assert_eq!(result.matches[0].match_type, MatchType::Partial);
        assert!((result.matches[0].relevance - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn strict_mode_drops_weak_matches_but_keeps_counts() {
        let screener = screener(vec![entity("Petrov Metals Ltd", "Belarus", "Belarus")]);
        let result = screener
            .screen("Petrov Industrial Supplies", None, true)
            .await
            .unwrap();
        assert!(!result.matched);
        assert!(result.matches.is_empty());
        assert_eq!(result.partial_matches, 1);
    }

    #[tokio::test]
    async fn ranking_is_descending_and_stable() {
        let screener = screener(vec![
            entity("Petrov Metals Ltd", "", ""),
            entity("Petrov Industrial Supplies", "", ""),
            entity("Petrov Industrial", "", ""),
            entity("Petrov Shipping", "", ""),
        ]);
        let result = screener
            .screen("Petrov Industrial Supplies", None, false)
            .await
            .unwrap();
        let names: Vec<_> = result
            .matches
            .iter()
            .map(|m| m.entity.name.as_str())
            .collect();
        // Ties at 0.5 keep retrieval order.
        assert_eq!(
            names,
            vec![
                "Petrov Industrial Supplies",
                "Petrov Industrial",
                "Petrov Metals Ltd",
                "Petrov Shipping",
            ]
        );
    }

    #[tokio::test]
    async fn unrelated_names_do_not_match() {
        let screener = screener(vec![entity("Acme Corp", "", "")]);
        let result = screener.screen("Volga Traders", None, false).await.unwrap();
        assert!(!result.matched);
        assert_eq!(result.exact_matches, 0);
        assert_eq!(result.partial_matches, 0);
    }

    #[tokio::test]
    async fn country_search_checks_nationality_and_address() {
        let screener = screener(vec![
            entity("A", "Russian", "France"),
            entity("B", "French", "Russia"),
            entity("C", "German", "Germany"),
        ]);
        let hits = screener.search_by_country("russia", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn regimes_are_distinct_and_sorted() {
        let mut first = entity("A", "", "");
        first.regime_code = "IRN".into();
        let second = entity("B", "", "");
        let third = entity("C", "", "");
        let screener = screener(vec![first, second, third]);
        assert_eq!(screener.regimes().await.unwrap(), vec!["IRN", "RUS"]);
    }
}
