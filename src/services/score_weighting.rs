//! Dimension weight resolution for composite quality scores.
//!
//! Resolves effective weights for (entity_type, validation_type) pairs from
//! the configured defaults plus an explicit override layer, and combines
//! per-dimension scores into one weighted composite. Resolved weight maps
//! always renormalize to sum 1.0.

use std::collections::HashMap;

use crate::models::validation_result::Severity;
use crate::services::scoring_config::{ScoringConfig, STANDARD_DIMENSIONS};

/// Weight below which a map is treated as empty (all-zero weights).
const MIN_TOTAL_WEIGHT: f64 = 1e-12;

pub struct ScoreWeightingEngine {
    defaults: HashMap<String, HashMap<String, f64>>,
    entity_overrides: HashMap<String, HashMap<String, f64>>,
    validation_type_overrides: HashMap<String, f64>,
}

impl ScoreWeightingEngine {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            defaults: config.entity_weights.clone(),
            entity_overrides: HashMap::new(),
            validation_type_overrides: HashMap::new(),
        }
    }

    /// Effective dimension weights for an entity type, renormalized to sum
    /// 1.0. Resolution order: override → entity default → "default" entry →
    /// equal weights over the four standard dimensions.
    pub fn entity_weights(&self, entity_type: &str) -> HashMap<String, f64> {
        let resolved = self
            .entity_overrides
            .get(entity_type)
            .or_else(|| self.defaults.get(entity_type))
            .or_else(|| self.defaults.get("default"));

        match resolved {
            Some(map) if total_weight(map) > MIN_TOTAL_WEIGHT => normalized(map),
            _ => equal_weight_fallback(),
        }
    }

    /// Weight of one validation type within an entity's weight map. An
    /// engine-wide validation-type override takes precedence; absent
    /// dimensions default to 1.0.
    pub fn validation_type_weight(&self, entity_type: &str, validation_type: &str) -> f64 {
        if let Some(weight) = self.validation_type_overrides.get(validation_type) {
            return *weight;
        }
        self.entity_weights(entity_type)
            .get(validation_type)
            .copied()
            .unwrap_or(1.0)
    }

    /// Impact weight for a severity level.
    pub fn severity_weight(&self, severity: Severity) -> f64 {
        severity.weight()
    }

    /// Install an entity-level weight override. All values must be finite
    /// and non-negative; invalid input keeps the engine usable by storing
    /// the equal-weight fallback instead.
    pub fn set_entity_weight_override(&mut self, entity_type: &str, weights: HashMap<String, f64>) {
        let valid = !weights.is_empty()
            && weights.values().all(|w| w.is_finite() && *w >= 0.0)
            && total_weight(&weights) > MIN_TOTAL_WEIGHT;

        let stored = if valid {
            normalized(&weights)
        } else {
            tracing::warn!(
                entity_type = entity_type,
                "Invalid weight override, falling back to equal weights"
            );
            equal_weight_fallback()
        };
        self.entity_overrides.insert(entity_type.to_string(), stored);
    }

    /// Install an engine-wide weight override for one validation type.
    pub fn set_validation_type_override(&mut self, validation_type: &str, weight: f64) {
        if !weight.is_finite() || weight < 0.0 {
            tracing::warn!(
                validation_type = validation_type,
                weight = weight,
                "Invalid validation-type weight override, ignoring"
            );
            return;
        }
        self.validation_type_overrides
            .insert(validation_type.to_string(), weight);
    }

    /// Drop all overrides, restoring configured defaults.
    pub fn clear_overrides(&mut self) {
        self.entity_overrides.clear();
        self.validation_type_overrides.clear();
    }

    /// Weighted average of per-dimension scores, optionally restricted to a
    /// subset of dimensions. Returns 0.0 when scores are empty or the
    /// applicable weights sum to zero.
    pub fn weighted_score(
        &self,
        scores: &HashMap<String, f64>,
        entity_type: &str,
        validation_types: Option<&[String]>,
    ) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }

        let weights = self.entity_weights(entity_type);
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;

        for (dimension, score) in scores {
            if let Some(subset) = validation_types {
                if !subset.iter().any(|v| v == dimension) {
                    continue;
                }
            }
            let weight = weights.get(dimension).copied().unwrap_or(0.0);
            weighted_sum += score * weight;
            weight_sum += weight;
        }

        if weight_sum > MIN_TOTAL_WEIGHT {
            weighted_sum / weight_sum
        } else {
            0.0
        }
    }
}

fn total_weight(map: &HashMap<String, f64>) -> f64 {
    map.values().sum()
}

fn normalized(map: &HashMap<String, f64>) -> HashMap<String, f64> {
    let total = total_weight(map);
    map.iter().map(|(k, v)| (k.clone(), v / total)).collect()
}

fn equal_weight_fallback() -> HashMap<String, f64> {
    STANDARD_DIMENSIONS
        .iter()
        .map(|d| (d.to_string(), 1.0 / STANDARD_DIMENSIONS.len() as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ScoreWeightingEngine {
        ScoreWeightingEngine::new(&ScoringConfig::default())
    }

    fn weight_map(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    // ── weight resolution ────────────────────────────────────────────

    #[test]
    fn test_entity_weights_sum_to_one() {
        let engine = engine();
        for entity in ["volunteer", "organization", "event", "unknown_entity"] {
            let sum: f64 = engine.entity_weights(entity).values().sum();
            assert!((sum - 1.0).abs() < 1e-9, "{entity}: {sum}");
        }
    }

    #[test]
    fn test_unknown_entity_falls_back_to_default_entry() {
        let engine = engine();
        let weights = engine.entity_weights("galaxy");
        assert!((weights["field_completeness"] - 0.30).abs() < 1e-9);
    }

    #[test]
    fn test_override_takes_precedence_and_renormalizes() {
        let mut engine = engine();
        // Deliberately does not sum to 1
        engine.set_entity_weight_override(
            "volunteer",
            weight_map(&[("field_completeness", 3.0), ("data_types", 1.0)]),
        );

        let weights = engine.entity_weights("volunteer");
        let sum: f64 = weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!((weights["field_completeness"] - 0.75).abs() < 1e-9);
        assert!((weights["data_types"] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_override_falls_back_to_equal_weights() {
        let mut engine = engine();
        engine.set_entity_weight_override(
            "volunteer",
            weight_map(&[("field_completeness", -1.0), ("data_types", 2.0)]),
        );

        let weights = engine.entity_weights("volunteer");
        assert_eq!(weights.len(), 4);
        for dimension in STANDARD_DIMENSIONS {
            assert!((weights[dimension] - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_sum_override_falls_back_to_equal_weights() {
        let mut engine = engine();
        engine.set_entity_weight_override("event", weight_map(&[("field_completeness", 0.0)]));
        let weights = engine.entity_weights("event");
        assert!((weights["business_rules"] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_clear_overrides_restores_defaults() {
        let mut engine = engine();
        engine.set_entity_weight_override(
            "volunteer",
            weight_map(&[("field_completeness", 1.0)]),
        );
        engine.clear_overrides();
        let weights = engine.entity_weights("volunteer");
        assert!((weights["field_completeness"] - 0.35).abs() < 1e-9);
    }

    // ── validation-type weight ───────────────────────────────────────

    #[test]
    fn test_validation_type_weight_from_entity_map() {
        let engine = engine();
        let w = engine.validation_type_weight("volunteer", "field_completeness");
        assert!((w - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_validation_type_weight_defaults_to_one() {
        let engine = engine();
        assert_eq!(engine.validation_type_weight("volunteer", "nonexistent"), 1.0);
    }

    #[test]
    fn test_validation_type_override_wins() {
        let mut engine = engine();
        engine.set_validation_type_override("field_completeness", 0.9);
        assert_eq!(
            engine.validation_type_weight("volunteer", "field_completeness"),
            0.9
        );
    }

    #[test]
    fn test_negative_validation_type_override_ignored() {
        let mut engine = engine();
        engine.set_validation_type_override("data_types", -0.5);
        assert!((engine.validation_type_weight("volunteer", "data_types") - 0.20).abs() < 1e-9);
    }

    // ── severity weight ──────────────────────────────────────────────

    #[test]
    fn test_severity_weight_table() {
        let engine = engine();
        assert_eq!(engine.severity_weight(Severity::Critical), 1.0);
        assert_eq!(engine.severity_weight(Severity::Error), 0.8);
        assert_eq!(engine.severity_weight(Severity::Warning), 0.5);
        assert_eq!(engine.severity_weight(Severity::Info), 0.2);
    }

    // ── weighted score ───────────────────────────────────────────────

    #[test]
    fn test_weighted_score_empty_is_zero() {
        let engine = engine();
        assert_eq!(engine.weighted_score(&HashMap::new(), "volunteer", None), 0.0);
    }

    #[test]
    fn test_weighted_score_combines_dimensions() {
        let engine = engine();
        let scores = weight_map(&[
            ("field_completeness", 90.0),
            ("data_types", 80.0),
            ("business_rules", 70.0),
            ("relationships", 60.0),
        ]);
        // volunteer weights: 0.35/0.20/0.25/0.20
        let expected = 90.0 * 0.35 + 80.0 * 0.20 + 70.0 * 0.25 + 60.0 * 0.20;
        let score = engine.weighted_score(&scores, "volunteer", None);
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_score_subset_restriction() {
        let engine = engine();
        let scores = weight_map(&[("field_completeness", 90.0), ("data_types", 50.0)]);
        let subset = vec!["field_completeness".to_string()];
        let score = engine.weighted_score(&scores, "volunteer", Some(&subset));
        assert!((score - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_score_unknown_dimensions_only_is_zero() {
        let engine = engine();
        let scores = weight_map(&[("made_up_dimension", 90.0)]);
        assert_eq!(engine.weighted_score(&scores, "volunteer", None), 0.0);
    }

    #[test]
    fn test_weighted_score_stays_in_bounds() {
        let engine = engine();
        let scores = weight_map(&[
            ("field_completeness", 100.0),
            ("data_types", 100.0),
            ("business_rules", 100.0),
            ("relationships", 100.0),
        ]);
        let score = engine.weighted_score(&scores, "student", None);
        assert!((score - 100.0).abs() < 1e-9);
    }
}
