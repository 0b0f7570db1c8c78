pub mod analysis;
pub mod declaration;
pub mod llm;
pub mod reference;
pub mod report;

pub use analysis::{
    orchestrator::Orchestrator, workers::load_roster, workers::LlmWorker,
    workers::SanctionsWorker, workers::TariffWorker, workers::WorkerSpec, AnalysisWorker, ComplianceError, ComplianceReport,
    Confidence, Finding, FindingValidationError, RiskTier, Severity, SeverityCounts,
    WorkerOutcome,
};
pub use declaration::{Declaration, GoodsLine, Party};
pub use llm::{client_from_settings, LlmClient, LlmSettings, NoopLlmClient, OpenAiClient};
pub use reference::{
    file_store::FileSanctionsStore, file_store::FileTariffStore, sanctions::EntityScreener,
    sanctions::MemorySanctionsStore, sanctions::ScreeningResult, tariff::MemoryTariffStore,
    tariff::TariffReference, EntityType, ReferenceError, SanctionedEntity, SanctionsStore,
    TariffCode, TariffStore,
};
pub use report::{render_report, OutputFormat};
