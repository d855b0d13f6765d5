//! Run metrics and the final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::params::SearchParameters;
use crate::strategy::Strategy;
use crate::types::Record;

/// Coarse run quality, derived from the error count alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Excellent,
    Good,
    Satisfactory,
}

impl QualityTier {
    pub fn from_errors(errors: usize) -> Self {
        match errors {
            0 => Self::Excellent,
            1 => Self::Good,
            _ => Self::Satisfactory,
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Satisfactory => "satisfactory",
        })
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub strategies_executed: usize,
    /// Unique records consolidated. Duplicates are not counted.
    pub records_found: usize,
    /// Rows dropped by the exclusion filter, across all strategies.
    pub records_excluded: usize,
    pub errors: usize,
    pub duration_secs: f64,
    /// `(executed - errors) / executed`, or 0 when nothing executed.
    pub success_rate: f64,
}

impl RunMetrics {
    /// Fresh metrics stamped with the current time.
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            strategies_executed: 0,
            records_found: 0,
            records_excluded: 0,
            errors: 0,
            duration_secs: 0.0,
            success_rate: 0.0,
        }
    }

    /// Stamp the end time and compute the derived fields.
    pub fn finish(&mut self) {
        let finished = Utc::now();
        self.duration_secs = (finished - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        self.finished_at = Some(finished);
        self.success_rate = if self.strategies_executed == 0 {
            0.0
        } else {
            self.strategies_executed.saturating_sub(self.errors) as f64
                / self.strategies_executed as f64
        };
    }

    /// At least two formulations were actually tried.
    pub fn is_complete(&self) -> bool {
        self.strategies_executed >= 2
    }

    pub fn quality(&self) -> QualityTier {
        QualityTier::from_errors(self.errors)
    }
}

/// One line of the report's strategy list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub id: String,
    pub description: String,
    pub term: String,
}

impl From<&Strategy> for StrategySummary {
    fn from(strategy: &Strategy) -> Self {
        Self {
            id: strategy.id().to_string(),
            description: strategy.description.clone(),
            term: strategy.term.clone(),
        }
    }
}

/// Everything a run produced, built once at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub parameters: SearchParameters,
    pub metrics: RunMetrics,
    pub total_records: usize,
    pub strategies: Vec<StrategySummary>,
    /// True iff at least two strategies executed.
    pub complete: bool,
    pub quality: QualityTier,
    /// Records ordered by descending strategy weight, discovery order on ties.
    pub records: Vec<Record>,
}

impl RunReport {
    /// Assemble the report from finished metrics and sorted records.
    pub fn build(
        parameters: SearchParameters,
        metrics: RunMetrics,
        strategies: &[Strategy],
        records: Vec<Record>,
    ) -> Self {
        Self {
            complete: metrics.is_complete(),
            quality: metrics.quality(),
            total_records: records.len(),
            strategies: strategies.iter().map(StrategySummary::from).collect(),
            parameters,
            metrics,
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SearchInput;
    use crate::strategy::generate_strategies;

    fn metrics_with(executed: usize, errors: usize) -> RunMetrics {
        let mut metrics = RunMetrics::start();
        metrics.strategies_executed = executed;
        metrics.errors = errors;
        metrics.finish();
        metrics
    }

    #[test]
    fn quality_tiers() {
        assert_eq!(QualityTier::from_errors(0), QualityTier::Excellent);
        assert_eq!(QualityTier::from_errors(1), QualityTier::Good);
        assert_eq!(QualityTier::from_errors(2), QualityTier::Satisfactory);
        assert_eq!(QualityTier::from_errors(40), QualityTier::Satisfactory);
    }

    #[test]
    fn success_rate_is_fraction_of_executed() {
        let metrics = metrics_with(4, 1);
        assert!((metrics.success_rate - 0.75).abs() < f64::EPSILON);
        assert!(metrics.finished_at.is_some());
        assert!(metrics.duration_secs >= 0.0);
    }

    #[test]
    fn success_rate_zero_when_nothing_executed() {
        let metrics = metrics_with(0, 1);
        assert_eq!(metrics.success_rate, 0.0);
        assert!(!metrics.is_complete());
    }

    #[test]
    fn success_rate_never_negative() {
        let metrics = metrics_with(1, 3);
        assert_eq!(metrics.success_rate, 0.0);
    }

    #[test]
    fn completeness_needs_two_strategies() {
        assert!(!metrics_with(1, 0).is_complete());
        assert!(metrics_with(2, 0).is_complete());
    }

    #[test]
    fn report_summarises_strategies() {
        let params = SearchInput::for_term("dipirona").normalize().expect("valid");
        let strategies = generate_strategies(&params);
        let report = RunReport::build(params, metrics_with(4, 2), &strategies, Vec::new());
        assert_eq!(report.total_records, 0);
        assert_eq!(report.strategies.len(), 4);
        assert_eq!(report.strategies[1].id, "chemical_name");
        assert_eq!(report.strategies[1].term, "dipirona sódica");
        assert!(report.complete);
        assert_eq!(report.quality, QualityTier::Satisfactory);

        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["quality"], "satisfactory");
        assert_eq!(json["metrics"]["errors"], 2);
    }
}
