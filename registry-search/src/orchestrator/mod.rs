//! Run orchestration: sequential strategy execution, consolidation,
//! detail enrichment and reporting.
//!
//! All mutable run state (the seen-key set, the record collection and the
//! metrics) is owned by one [`Orchestrator`] and lent to the stages that
//! need it.

pub mod consolidate;
pub mod enrich;
pub mod report;
pub mod run;

pub use consolidate::Consolidator;
pub use enrich::{DetailEnricher, DetailRules, EnrichSummary, NOT_AVAILABLE};
pub use report::{QualityTier, RunMetrics, RunReport, StrategySummary};
pub use run::Orchestrator;
