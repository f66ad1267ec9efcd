//! Evaluation records, summaries and reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ama_oracle::{prompts::UNANSWERABLE, FailedProbe, UpdateStrategy};
use ama_state::Correction;

use super::qa::QaPair;

/// Why a probe failed. Used for reporting only; never affects pass/fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Nothing usable was retrieved
    MissingInfo,
    /// Something was retrieved but it disagrees with the ground truth
    ContentDeviation,
}

impl FailureCategory {
    pub fn classify(retrieved_answer: &str) -> Self {
        let answer = retrieved_answer.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case(UNANSWERABLE) {
            Self::MissingInfo
        } else {
            Self::ContentDeviation
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingInfo => "missing_info",
            Self::ContentDeviation => "content_deviation",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one probe. A new evaluation pass produces new records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    pub true_answer: String,
    pub retrieved_answer: String,
    /// Rounded to 4 decimals; pass/fail was decided on the unrounded score
    pub similarity: f64,
    pub is_pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureCategory>,
}

impl EvaluationRecord {
    /// Build a record, deciding pass/fail with `similarity >= threshold`.
    pub fn scored(pair: &QaPair, retrieved_answer: String, similarity: f64, threshold: f64) -> Self {
        let similarity = if similarity.is_finite() {
            similarity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let is_pass = similarity >= threshold;
        let failure = (!is_pass).then(|| FailureCategory::classify(&retrieved_answer));
        Self {
            question: pair.question.clone(),
            true_answer: pair.true_answer.clone(),
            retrieved_answer,
            similarity: round4(similarity),
            is_pass,
            failure,
        }
    }

    pub fn correction(&self) -> Correction {
        Correction::new(self.question.clone(), self.true_answer.clone())
    }

    pub fn failed_probe(&self) -> FailedProbe {
        FailedProbe {
            question: self.question.clone(),
            true_answer: self.true_answer.clone(),
            retrieved_answer: self.retrieved_answer.clone(),
            category: self
                .failure
                .unwrap_or(FailureCategory::ContentDeviation)
                .to_string(),
        }
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Aggregate over one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub qa_count: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percentage in `[0, 100]`
    pub pass_rate: f64,
    pub need_reconstruct: bool,
}

impl EvaluationSummary {
    /// Summarise records. `need_reconstruct` is `pass_rate < threshold`; an
    /// empty record set never needs reconstruction.
    pub fn from_records(records: &[EvaluationRecord], pass_rate_threshold: f64) -> Self {
        let qa_count = records.len();
        if qa_count == 0 {
            return Self::default();
        }
        let passed = records.iter().filter(|r| r.is_pass).count();
        let pass_rate = (passed * 100) as f64 / qa_count as f64;
        Self {
            qa_count,
            passed,
            failed: qa_count - passed,
            pass_rate,
            need_reconstruct: pass_rate < pass_rate_threshold,
        }
    }
}

/// Failure counts by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub error_count: usize,
    pub error_types: BTreeMap<FailureCategory, usize>,
}

impl ErrorAnalysis {
    pub fn from_failed(failed: &[EvaluationRecord]) -> Self {
        let mut error_types = BTreeMap::new();
        for record in failed {
            if let Some(category) = record.failure {
                *error_types.entry(category).or_insert(0) += 1;
            }
        }
        Self {
            error_count: failed.len(),
            error_types,
        }
    }

    pub fn type_names(&self) -> Vec<String> {
        self.error_types.keys().map(ToString::to_string).collect()
    }
}

/// Full result of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub summary: EvaluationSummary,
    pub records: Vec<EvaluationRecord>,
    pub failed: Vec<EvaluationRecord>,
    pub error_analysis: ErrorAnalysis,
    pub qa_pairs: Vec<QaPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<UpdateStrategy>,
    pub duration_ms: u64,
}

impl EvaluationReport {
    pub fn corrections(&self) -> Vec<Correction> {
        self.failed.iter().map(EvaluationRecord::correction).collect()
    }
}

/// Evaluation result, distinguishing "nothing to evaluate" from a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// The question oracle produced no probes
    NoSignal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        duration_ms: u64,
    },
    Evaluated(EvaluationReport),
}

impl EvaluationOutcome {
    pub fn is_no_signal(&self) -> bool {
        matches!(self, Self::NoSignal { .. })
    }

    pub fn need_reconstruct(&self) -> bool {
        match self {
            Self::NoSignal { .. } => false,
            Self::Evaluated(report) => report.summary.need_reconstruct,
        }
    }

    /// Summary of the pass; all zeros for `NoSignal`.
    pub fn summary(&self) -> EvaluationSummary {
        match self {
            Self::NoSignal { .. } => EvaluationSummary::default(),
            Self::Evaluated(report) => report.summary.clone(),
        }
    }

    pub fn report(&self) -> Option<&EvaluationReport> {
        match self {
            Self::NoSignal { .. } => None,
            Self::Evaluated(report) => Some(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sim: f64) -> EvaluationRecord {
        EvaluationRecord::scored(&QaPair::new("q", "a"), "a".to_string(), sim, 0.8)
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(record(0.8).is_pass);
        assert!(!record(0.79999).is_pass);
    }

    #[test]
    fn test_similarity_rounded_after_decision() {
        let r = EvaluationRecord::scored(&QaPair::new("q", "a"), "x".into(), 0.79996, 0.79996);
        assert!(r.is_pass);
        assert_eq!(r.similarity, 0.8);
    }

    #[test]
    fn test_non_finite_similarity_is_zero() {
        let r = record(f64::NAN);
        assert_eq!(r.similarity, 0.0);
        assert!(!r.is_pass);
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(FailureCategory::classify(""), FailureCategory::MissingInfo);
        assert_eq!(
            FailureCategory::classify("unanswerable"),
            FailureCategory::MissingInfo
        );
        assert_eq!(
            FailureCategory::classify("Hotel Nikko"),
            FailureCategory::ContentDeviation
        );
        assert_eq!(record(0.9).failure, None);
    }

    #[test]
    fn test_summary_arithmetic() {
        let records: Vec<_> = [0.9, 0.9, 0.9, 0.9, 0.9, 0.9, 0.9, 0.1, 0.1, 0.1]
            .into_iter()
            .map(record)
            .collect();
        let s = EvaluationSummary::from_records(&records, 70.0);
        assert_eq!(s.passed + s.failed, s.qa_count);
        assert_eq!(s.pass_rate, 70.0);
        assert!(!s.need_reconstruct, "70.0 is not below 70.0");

        let s = EvaluationSummary::from_records(&records[1..], 70.0);
        assert!(s.need_reconstruct);
    }

    #[test]
    fn test_empty_summary_never_reconstructs() {
        let s = EvaluationSummary::from_records(&[], 70.0);
        assert_eq!(s.qa_count, 0);
        assert!(!s.need_reconstruct);
    }

    #[test]
    fn test_error_analysis_counts() {
        let mut a = record(0.1);
        a.failure = Some(FailureCategory::MissingInfo);
        let b = record(0.1);
        let analysis = ErrorAnalysis::from_failed(&[a, b.clone(), b]);
        assert_eq!(analysis.error_count, 3);
        assert_eq!(analysis.error_types[&FailureCategory::ContentDeviation], 2);
        assert_eq!(analysis.type_names(), vec!["missing_info", "content_deviation"]);

        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["error_types"]["missing_info"], 1);
    }

    #[test]
    fn test_no_signal_outcome() {
        let outcome = EvaluationOutcome::NoSignal {
            reason: None,
            duration_ms: 1,
        };
        assert!(outcome.is_no_signal());
        assert!(!outcome.need_reconstruct());
        assert_eq!(outcome.summary().qa_count, 0);
        assert_eq!(serde_json::to_value(&outcome).unwrap()["outcome"], "no_signal");
    }
}
