use std::{collections::HashSet, fs, path::PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;

use super::sanctions::{EntityType, MemorySanctionsStore, SanctionedEntity};
use super::tariff::{MemoryTariffStore, TariffCode};
use super::{ReferenceError, SanctionsStore, TariffStore};

const SANCTIONS_FILE: &str = "sanctions.json";
const TARIFF_FILE: &str = "tariff_codes.json";

/// Loads the sanctions list from `sanctions.json` under a base directory.
pub struct FileSanctionsStore {
    base_path: PathBuf,
    cache: OnceCell<MemorySanctionsStore>,
}

impl FileSanctionsStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            cache: OnceCell::new(),
        }
    }

    fn load(&self) -> Result<MemorySanctionsStore> {
        let path = self.base_path.join(SANCTIONS_FILE);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read sanctions list at {}", path.display()))?;
        let entities: Vec<SanctionedEntity> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON structure in {}", path.display()))?;
        let mut seen = HashSet::new();
        for entity in &entities {
            if !seen.insert(entity.unique_id.clone()) {
                anyhow::bail!("duplicate sanctions entity id `{}`", entity.unique_id);
            }
        }
        Ok(MemorySanctionsStore::new(entities))
    }

    fn store(&self) -> Result<&MemorySanctionsStore, ReferenceError> {
        self.cache
            .get_or_try_init(|| self.load())
            .map_err(|err| ReferenceError::Unavailable(format!("{err:#}")))
    }
}

#[async_trait]
impl SanctionsStore for FileSanctionsStore {
    async fn search_by_name(
        &self,
        name: &str,
        max_results: usize,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<SanctionedEntity>, ReferenceError> {
        self.store()?
            .search_by_name(name, max_results, entity_type)
            .await
    }

    async fn search_by_country(
        &self,
        country: &str,
        max_results: usize,
    ) -> Result<Vec<SanctionedEntity>, ReferenceError> {
        self.store()?.search_by_country(country, max_results).await
    }

    async fn regimes(&self) -> Result<Vec<String>, ReferenceError> {
        self.store()?.regimes().await
    }
}

/// Loads tariff reference data from `tariff_codes.json` under a base
/// directory. Rejects records whose stored chapter/heading/subheading
/// disagree with the prefixes derived from the code.
pub struct FileTariffStore {
    base_path: PathBuf,
    cache: OnceCell<MemoryTariffStore>,
}

impl FileTariffStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            cache: OnceCell::new(),
        }
    }

    fn load(&self) -> Result<MemoryTariffStore> {
        let path = self.base_path.join(TARIFF_FILE);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read tariff data at {}", path.display()))?;
        let records: Vec<TariffCode> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON structure in {}", path.display()))?;
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.code.clone()) {
                anyhow::bail!("duplicate tariff code `{}`", record.code);
            }
            if !record.prefixes_consistent() {
                anyhow::bail!(
                    "tariff code `{}` stored prefixes disagree with the code",
                    record.code
                );
            }
        }
        Ok(MemoryTariffStore::new(records))
    }

    fn store(&self) -> Result<&MemoryTariffStore, ReferenceError> {
        self.cache
            .get_or_try_init(|| self.load())
            .map_err(|err| ReferenceError::Unavailable(format!("{err:#}")))
    }
}

#[async_trait]
impl TariffStore for FileTariffStore {
    async fn get(&self, chapter: &str, code: &str) -> Result<Option<TariffCode>, ReferenceError> {
        self.store()?.get(chapter, code).await
    }

    async fn codes_by_chapter(
        &self,
        chapter: &str,
        max_results: usize,
    ) -> Result<Vec<TariffCode>, ReferenceError> {
        self.store()?.codes_by_chapter(chapter, max_results).await
    }

    async fn codes_by_heading(&self, heading: &str) -> Result<Vec<TariffCode>, ReferenceError> {
        self.store()?.codes_by_heading(heading).await
    }

    async fn search_descriptions(
        &self,
        keywords: &[String],
        chapter: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<TariffCode>, ReferenceError> {
        self.store()?
            .search_descriptions(keywords, chapter, max_results)
            .await
    }
}
