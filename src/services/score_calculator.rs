//! Dimension score calculation.
//!
//! One strategy menu covers every scoring path in the system: live dimension
//! scores pick their algorithm by validation type, and history records use
//! the linear-penalty strategy through the same calculator, so live and
//! historical views cannot drift apart.

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::validation_result::{Severity, ValidationResult, ViolationSubtype};
use crate::services::scoring_config::ScoringConfig;

/// Scoring strategy for a batch of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScoreAlgorithm {
    /// Pass ratio × 100, with flat subtype penalties on top.
    Percentage,
    /// Start at 100, deduct severity-weighted penalties up to a cap.
    PenaltyBased,
    /// Start at 100, deduct a base penalty scaled by severity escalation.
    SeverityWeighted,
    /// Fixed per-severity deductions; used for history records.
    LinearPenalty,
}

impl ScoreAlgorithm {
    /// Algorithm configured for a validation type; `None` for unknown types,
    /// which fall back to percentage scoring without subtype penalties.
    pub fn for_validation_type(validation_type: &str) -> Option<Self> {
        match validation_type {
            "field_completeness" | "relationships" => Some(ScoreAlgorithm::Percentage),
            "data_types" => Some(ScoreAlgorithm::PenaltyBased),
            "business_rules" => Some(ScoreAlgorithm::SeverityWeighted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreAlgorithm::Percentage => "percentage",
            ScoreAlgorithm::PenaltyBased => "penalty_based",
            ScoreAlgorithm::SeverityWeighted => "severity_weighted",
            ScoreAlgorithm::LinearPenalty => "linear_penalty",
        }
    }
}

/// One named deduction applied while scoring, for the diagnostic breakdown.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AppliedPenalty {
    pub reason: String,
    pub amount: f64,
}

/// Read-only diagnostic view of one dimension's scoring.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreBreakdown {
    pub validation_type: String,
    pub algorithm: ScoreAlgorithm,
    pub score: f64,
    pub total_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: usize,
    pub info_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub critical_count: usize,
    pub penalties: Vec<AppliedPenalty>,
}

pub struct ScoreCalculator {
    base_score: f64,
    max_penalty: f64,
    data_type_penalty_multiplier: f64,
    business_rule_base_penalty: f64,
    missing_required_field_penalty: f64,
    relationship_penalty: f64,
}

impl ScoreCalculator {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            base_score: config.base_score,
            max_penalty: config.max_penalty,
            data_type_penalty_multiplier: config.data_type_penalty_multiplier,
            business_rule_base_penalty: config.business_rule_base_penalty,
            missing_required_field_penalty: config.missing_required_field_penalty,
            relationship_penalty: config.relationship_penalty,
        }
    }

    /// Score one dimension's results on the 0–100 scale. Empty input is 0.
    pub fn dimension_score(&self, validation_type: &str, results: &[ValidationResult]) -> f64 {
        match ScoreAlgorithm::for_validation_type(validation_type) {
            Some(algorithm) => self.score(algorithm, results).0,
            None => self.percentage_score(results, false).0,
        }
    }

    /// Score results with an explicit algorithm, returning the applied
    /// penalties alongside the score.
    pub fn score(
        &self,
        algorithm: ScoreAlgorithm,
        results: &[ValidationResult],
    ) -> (f64, Vec<AppliedPenalty>) {
        if results.is_empty() {
            return (0.0, Vec::new());
        }
        match algorithm {
            ScoreAlgorithm::Percentage => self.percentage_score(results, true),
            ScoreAlgorithm::PenaltyBased => self.penalty_based_score(results),
            ScoreAlgorithm::SeverityWeighted => self.severity_weighted_score(results),
            ScoreAlgorithm::LinearPenalty => self.linear_penalty_score(results),
        }
    }

    /// Diagnostic breakdown of one dimension's scoring.
    pub fn score_breakdown(
        &self,
        validation_type: &str,
        results: &[ValidationResult],
    ) -> ScoreBreakdown {
        let algorithm =
            ScoreAlgorithm::for_validation_type(validation_type).unwrap_or(ScoreAlgorithm::Percentage);
        let (score, penalties) = if results.is_empty() {
            (0.0, Vec::new())
        } else {
            match ScoreAlgorithm::for_validation_type(validation_type) {
                Some(a) => self.score(a, results),
                None => self.percentage_score(results, false),
            }
        };

        let count = |severity: Severity| results.iter().filter(|r| r.severity == severity).count();

        ScoreBreakdown {
            validation_type: validation_type.to_string(),
            algorithm,
            score,
            total_checks: results.len(),
            passed_checks: results.iter().filter(|r| r.severity.is_passing()).count(),
            failed_checks: results.iter().filter(|r| !r.severity.is_passing()).count(),
            info_count: count(Severity::Info),
            warning_count: count(Severity::Warning),
            error_count: count(Severity::Error),
            critical_count: count(Severity::Critical),
            penalties,
        }
    }

    /// Pass ratio × 100. Failed results carrying a violation subtype incur an
    /// additional flat deduction on top of lowering the ratio; the double
    /// penalty is intentional.
    fn percentage_score(
        &self,
        results: &[ValidationResult],
        apply_subtype_penalties: bool,
    ) -> (f64, Vec<AppliedPenalty>) {
        if results.is_empty() {
            return (0.0, Vec::new());
        }

        let passed = results.iter().filter(|r| r.severity.is_passing()).count();
        let mut score = passed as f64 / results.len() as f64 * 100.0;
        let mut penalties = Vec::new();

        if apply_subtype_penalties {
            for result in results.iter().filter(|r| !r.severity.is_passing()) {
                let Some(subtype) = result.violation_subtype else {
                    continue;
                };
                let amount = match subtype {
                    ViolationSubtype::MissingRequiredField => self.missing_required_field_penalty,
                    ViolationSubtype::OrphanedRecord | ViolationSubtype::InvalidReference => {
                        self.relationship_penalty
                    }
                };
                penalties.push(AppliedPenalty {
                    reason: subtype.as_str().to_string(),
                    amount,
                });
                score -= amount;
            }
        }

        (score.clamp(0.0, 100.0), penalties)
    }

    /// Start at the base score and deduct `severity_weight × multiplier` per
    /// failed result, with the total deduction capped at `max_penalty`.
    fn penalty_based_score(&self, results: &[ValidationResult]) -> (f64, Vec<AppliedPenalty>) {
        let mut penalties = Vec::new();
        let mut total = 0.0;

        for result in results.iter().filter(|r| !r.severity.is_passing()) {
            let amount = result.severity.weight() * self.data_type_penalty_multiplier;
            penalties.push(AppliedPenalty {
                reason: format!("{}_failure", result.severity.as_str()),
                amount,
            });
            total += amount;
        }

        let score = (self.base_score - total.min(self.max_penalty)).max(0.0);
        (score, penalties)
    }

    /// Start at the base score and deduct the base penalty scaled by the
    /// severity escalation multiplier for every non-info result.
    fn severity_weighted_score(&self, results: &[ValidationResult]) -> (f64, Vec<AppliedPenalty>) {
        let mut penalties = Vec::new();
        let mut score = self.base_score;

        for result in results.iter().filter(|r| r.severity != Severity::Info) {
            let amount = self.business_rule_base_penalty * result.severity.escalation_multiplier();
            penalties.push(AppliedPenalty {
                reason: format!("{}_violation", result.severity.as_str()),
                amount,
            });
            score -= amount;
        }

        (score.clamp(0.0, 100.0), penalties)
    }

    /// Fixed per-severity deductions, floored at 0. This is the cheap scheme
    /// history records are scored with.
    fn linear_penalty_score(&self, results: &[ValidationResult]) -> (f64, Vec<AppliedPenalty>) {
        let mut penalties = Vec::new();
        let mut total = 0.0;

        for result in results.iter().filter(|r| r.severity.linear_penalty() > 0.0) {
            let amount = result.severity.linear_penalty();
            penalties.push(AppliedPenalty {
                reason: format!("{}_violation", result.severity.as_str()),
                amount,
            });
            total += amount;
        }

        ((self.base_score - total).max(0.0), penalties)
    }
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn result(severity: Severity, subtype: Option<ViolationSubtype>) -> ValidationResult {
        ValidationResult {
            id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            entity_type: "volunteer".to_string(),
            validation_type: "field_completeness".to_string(),
            field_name: None,
            severity,
            violation_subtype: subtype,
            message: None,
            expected_value: None,
            actual_value: None,
            created_at: Utc::now(),
        }
    }

    fn batch(severities: &[Severity]) -> Vec<ValidationResult> {
        severities.iter().map(|s| result(*s, None)).collect()
    }

    // ── algorithm selection ──────────────────────────────────────────

    #[test]
    fn test_algorithm_table() {
        assert_eq!(
            ScoreAlgorithm::for_validation_type("field_completeness"),
            Some(ScoreAlgorithm::Percentage)
        );
        assert_eq!(
            ScoreAlgorithm::for_validation_type("relationships"),
            Some(ScoreAlgorithm::Percentage)
        );
        assert_eq!(
            ScoreAlgorithm::for_validation_type("data_types"),
            Some(ScoreAlgorithm::PenaltyBased)
        );
        assert_eq!(
            ScoreAlgorithm::for_validation_type("business_rules"),
            Some(ScoreAlgorithm::SeverityWeighted)
        );
        assert_eq!(ScoreAlgorithm::for_validation_type("made_up"), None);
    }

    // ── empty input ──────────────────────────────────────────────────

    #[test]
    fn test_empty_results_score_zero_for_every_algorithm() {
        let calc = ScoreCalculator::default();
        for algorithm in [
            ScoreAlgorithm::Percentage,
            ScoreAlgorithm::PenaltyBased,
            ScoreAlgorithm::SeverityWeighted,
            ScoreAlgorithm::LinearPenalty,
        ] {
            assert_eq!(calc.score(algorithm, &[]).0, 0.0);
        }
        assert_eq!(calc.dimension_score("field_completeness", &[]), 0.0);
        assert_eq!(calc.dimension_score("unknown", &[]), 0.0);
    }

    // ── percentage ───────────────────────────────────────────────────

    #[test]
    fn test_percentage_eight_of_ten_is_eighty() {
        let calc = ScoreCalculator::default();
        let mut results = batch(&[Severity::Info; 6]);
        results.extend(batch(&[Severity::Warning, Severity::Warning]));
        results.extend(batch(&[Severity::Error, Severity::Critical]));

        assert_eq!(results.len(), 10);
        let score = calc.dimension_score("field_completeness", &results);
        assert!((score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_subtype_double_penalty() {
        let calc = ScoreCalculator::default();
        // 9 passing + 1 failing with a missing-required-field tag:
        // ratio gives 90, flat penalty takes 8 more
        let mut results = batch(&[Severity::Info; 9]);
        results.push(result(
            Severity::Error,
            Some(ViolationSubtype::MissingRequiredField),
        ));

        let score = calc.dimension_score("field_completeness", &results);
        assert!((score - 82.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_relationship_penalties() {
        let calc = ScoreCalculator::default();
        let mut results = batch(&[Severity::Info; 8]);
        results.push(result(Severity::Error, Some(ViolationSubtype::OrphanedRecord)));
        results.push(result(
            Severity::Error,
            Some(ViolationSubtype::InvalidReference),
        ));

        // 80 from the ratio, minus 6 + 6
        let score = calc.dimension_score("relationships", &results);
        assert!((score - 68.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_subtype_on_passing_result_not_penalized() {
        let calc = ScoreCalculator::default();
        let mut results = batch(&[Severity::Info; 9]);
        results.push(result(
            Severity::Warning,
            Some(ViolationSubtype::MissingRequiredField),
        ));

        let score = calc.dimension_score("field_completeness", &results);
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_type_skips_subtype_penalties() {
        let calc = ScoreCalculator::default();
        let mut results = batch(&[Severity::Info; 9]);
        results.push(result(
            Severity::Error,
            Some(ViolationSubtype::MissingRequiredField),
        ));

        let score = calc.dimension_score("custom_dimension", &results);
        assert!((score - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_floor_at_zero() {
        let calc = ScoreCalculator::default();
        let results: Vec<ValidationResult> = (0..30)
            .map(|_| result(Severity::Critical, Some(ViolationSubtype::MissingRequiredField)))
            .collect();
        let score = calc.dimension_score("field_completeness", &results);
        assert_eq!(score, 0.0);
    }

    // ── penalty-based ────────────────────────────────────────────────

    #[test]
    fn test_penalty_based_deductions() {
        let calc = ScoreCalculator::default();
        // one critical (1.0×10) + one error (0.8×10) = 18
        let results = batch(&[Severity::Critical, Severity::Error, Severity::Info]);
        let score = calc.dimension_score("data_types", &results);
        assert!((score - 82.0).abs() < 1e-9);
    }

    #[test]
    fn test_penalty_based_floor_at_fifty() {
        let calc = ScoreCalculator::default();
        // 20 criticals would be 200 points of deduction, capped at 50
        let results = batch(&[Severity::Critical; 20]);
        let score = calc.dimension_score("data_types", &results);
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_penalty_based_passing_results_not_deducted() {
        let calc = ScoreCalculator::default();
        let results = batch(&[Severity::Info, Severity::Warning]);
        let score = calc.dimension_score("data_types", &results);
        assert_eq!(score, 100.0);
    }

    // ── severity-weighted ────────────────────────────────────────────

    #[test]
    fn test_severity_weighted_deductions() {
        let calc = ScoreCalculator::default();
        // critical 7×2.0 + error 7×1.5 + warning 7×1.0 = 31.5
        let results = batch(&[Severity::Critical, Severity::Error, Severity::Warning]);
        let score = calc.dimension_score("business_rules", &results);
        assert!((score - 68.5).abs() < 1e-9);
    }

    #[test]
    fn test_severity_weighted_info_is_free() {
        let calc = ScoreCalculator::default();
        let results = batch(&[Severity::Info; 50]);
        let score = calc.dimension_score("business_rules", &results);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_severity_weighted_floor_at_zero() {
        let calc = ScoreCalculator::default();
        let results = batch(&[Severity::Critical; 20]);
        let score = calc.dimension_score("business_rules", &results);
        assert_eq!(score, 0.0);
    }

    // ── linear penalty ───────────────────────────────────────────────

    #[test]
    fn test_linear_penalty_formula() {
        let calc = ScoreCalculator::default();
        // 100 − 10×1 − 5×2 − 2×3 = 74; info free
        let results = batch(&[
            Severity::Critical,
            Severity::Error,
            Severity::Error,
            Severity::Warning,
            Severity::Warning,
            Severity::Warning,
            Severity::Info,
        ]);
        let (score, penalties) = calc.score(ScoreAlgorithm::LinearPenalty, &results);
        assert!((score - 74.0).abs() < 1e-9);
        assert_eq!(penalties.len(), 6);
    }

    #[test]
    fn test_linear_penalty_four_errors_is_eighty() {
        let calc = ScoreCalculator::default();
        let mut results = batch(&[Severity::Info; 16]);
        results.extend(batch(&[Severity::Error; 4]));
        let (score, _) = calc.score(ScoreAlgorithm::LinearPenalty, &results);
        assert!((score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_penalty_floor_at_zero() {
        let calc = ScoreCalculator::default();
        let results = batch(&[Severity::Critical; 15]);
        let (score, _) = calc.score(ScoreAlgorithm::LinearPenalty, &results);
        assert_eq!(score, 0.0);
    }

    // ── bounds across all algorithms ─────────────────────────────────

    #[test]
    fn test_scores_always_in_bounds() {
        let calc = ScoreCalculator::default();
        let mixes: Vec<Vec<ValidationResult>> = vec![
            batch(&[Severity::Critical; 40]),
            batch(&[Severity::Info; 40]),
            batch(&[Severity::Error, Severity::Warning, Severity::Info]),
        ];
        for results in &mixes {
            for vtype in [
                "field_completeness",
                "data_types",
                "business_rules",
                "relationships",
                "other",
            ] {
                let score = calc.dimension_score(vtype, results);
                assert!((0.0..=100.0).contains(&score), "{vtype}: {score}");
            }
        }
    }

    // ── breakdown ────────────────────────────────────────────────────

    #[test]
    fn test_breakdown_histogram_and_penalties() {
        let calc = ScoreCalculator::default();
        let mut results = batch(&[Severity::Info, Severity::Warning, Severity::Error]);
        results.push(result(
            Severity::Critical,
            Some(ViolationSubtype::MissingRequiredField),
        ));

        let breakdown = calc.score_breakdown("field_completeness", &results);
        assert_eq!(breakdown.algorithm, ScoreAlgorithm::Percentage);
        assert_eq!(breakdown.total_checks, 4);
        assert_eq!(breakdown.passed_checks, 2);
        assert_eq!(breakdown.failed_checks, 2);
        assert_eq!(breakdown.info_count, 1);
        assert_eq!(breakdown.warning_count, 1);
        assert_eq!(breakdown.error_count, 1);
        assert_eq!(breakdown.critical_count, 1);
        assert_eq!(breakdown.penalties.len(), 1);
        assert_eq!(breakdown.penalties[0].reason, "missing_required_field");
        // 50 from the ratio, minus 8
        assert!((breakdown.score - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_empty_input() {
        let calc = ScoreCalculator::default();
        let breakdown = calc.score_breakdown("data_types", &[]);
        assert_eq!(breakdown.score, 0.0);
        assert_eq!(breakdown.total_checks, 0);
        assert!(breakdown.penalties.is_empty());
    }
}
