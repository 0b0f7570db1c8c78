use async_trait::async_trait;
use thiserror::Error;

pub mod file_store;
pub mod sanctions;
pub mod tariff;

pub use sanctions::{EntityType, SanctionedEntity};
pub use tariff::TariffCode;

/// Errors from the read-only reference stores. An unavailable store fails
/// only the workers that depend on it, never the whole run.
#[derive(Debug, Error, Clone)]
pub enum ReferenceError {
    #[error("reference store unavailable: {0}")]
    Unavailable(String),
}

/// Abstraction over the sanctions list backend so different stores
/// (files, in-memory, remote index) can be swapped transparently.
#[async_trait]
pub trait SanctionsStore: Send + Sync {
    /// Retrieve candidate entities for a name using case-insensitive
    /// containment (either direction) plus token overlap. Retrieval is
    /// deliberately loose; the screener classifies and ranks afterwards.
    async fn search_by_name(
        &self,
        name: &str,
        max_results: usize,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<SanctionedEntity>, ReferenceError>;

    /// Entities whose nationality or address country contains the query.
    async fn search_by_country(
        &self,
        country: &str,
        max_results: usize,
    ) -> Result<Vec<SanctionedEntity>, ReferenceError>;

    /// Distinct regime codes present in the list.
    async fn regimes(&self) -> Result<Vec<String>, ReferenceError>;
}

/// Abstraction over the tariff classification backend.
#[async_trait]
pub trait TariffStore: Send + Sync {
    /// Keyed read by chapter (partition) and full normalized code.
    async fn get(&self, chapter: &str, code: &str) -> Result<Option<TariffCode>, ReferenceError>;

    /// All codes in a 2-digit chapter, code ascending.
    async fn codes_by_chapter(
        &self,
        chapter: &str,
        max_results: usize,
    ) -> Result<Vec<TariffCode>, ReferenceError>;

    /// All codes under a 4-digit heading, code ascending.
    async fn codes_by_heading(&self, heading: &str) -> Result<Vec<TariffCode>, ReferenceError>;

    /// Case-insensitive keyword containment search over descriptions,
    /// optionally scoped to one chapter. Results code ascending, capped.
    async fn search_descriptions(
        &self,
        keywords: &[String],
        chapter: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<TariffCode>, ReferenceError>;
}
