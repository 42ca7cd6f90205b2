//! Scoring configuration value object.
//!
//! All tunable scoring behavior lives here: default dimension weights per
//! entity type, per-entity quality thresholds, dynamic threshold adjustment
//! factors, and scoring-algorithm parameters. The tables are an immutable
//! base layer; runtime overrides live in the engines that consume this
//! config, never in shared process state.

use std::collections::HashMap;

/// The four standard validation dimensions.
pub const STANDARD_DIMENSIONS: [&str; 4] = [
    "field_completeness",
    "data_types",
    "business_rules",
    "relationships",
];

/// Entity types scored by default in comprehensive reports.
pub const DEFAULT_ENTITY_TYPES: [&str; 7] = [
    "volunteer",
    "organization",
    "event",
    "student",
    "teacher",
    "school",
    "district",
];

/// Fallback entity threshold when no table entry or override exists.
pub const GLOBAL_THRESHOLD_FALLBACK: f64 = 75.0;

/// Additive per-entity threshold adjustment factors. Each factor is a small
/// signed contribution; the adjusted threshold is clamped to [50, 95].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdAdjustment {
    pub historical_performance: f64,
    pub business_criticality: f64,
    pub data_volume: f64,
    pub compliance: f64,
}

impl ThresholdAdjustment {
    pub fn total(&self) -> f64 {
        self.historical_performance + self.business_criticality + self.data_volume + self.compliance
    }
}

/// Immutable scoring configuration, constructed once per service instance.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// entity_type → validation_type → weight. Includes a "default" entry.
    pub entity_weights: HashMap<String, HashMap<String, f64>>,
    /// entity_type → pass/fail quality threshold (0–100).
    pub entity_thresholds: HashMap<String, f64>,
    /// entity_type → additive dynamic threshold adjustment.
    pub threshold_adjustments: HashMap<String, ThresholdAdjustment>,
    /// Whether entity thresholds pass through the dynamic adjustment step.
    pub dynamic_threshold_adjustment: bool,

    /// Starting score for penalty-style algorithms.
    pub base_score: f64,
    /// Cap on the total deduction in the penalty-based algorithm.
    pub max_penalty: f64,
    /// Per-failure multiplier applied to severity weight in the
    /// penalty-based algorithm.
    pub data_type_penalty_multiplier: f64,
    /// Base deduction per violation in the severity-weighted algorithm.
    pub business_rule_base_penalty: f64,
    /// Flat extra deduction per missing-required-field violation.
    pub missing_required_field_penalty: f64,
    /// Flat extra deduction per orphaned/invalid-reference violation.
    pub relationship_penalty: f64,

    /// Pattern detection skips the O(n²) autocorrelation scan above this
    /// series length.
    pub cycle_detection_cap: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            entity_weights: default_entity_weights(),
            entity_thresholds: default_entity_thresholds(),
            threshold_adjustments: default_threshold_adjustments(),
            dynamic_threshold_adjustment: true,
            base_score: 100.0,
            max_penalty: 50.0,
            data_type_penalty_multiplier: 10.0,
            business_rule_base_penalty: 7.0,
            missing_required_field_penalty: 8.0,
            relationship_penalty: 6.0,
            cycle_detection_cap: 5000,
        }
    }
}

fn weights(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect()
}

fn default_entity_weights() -> HashMap<String, HashMap<String, f64>> {
    let mut map = HashMap::new();
    map.insert(
        "default".to_string(),
        weights(&[
            ("field_completeness", 0.30),
            ("data_types", 0.25),
            ("business_rules", 0.25),
            ("relationships", 0.20),
        ]),
    );
    map.insert(
        "volunteer".to_string(),
        weights(&[
            ("field_completeness", 0.35),
            ("data_types", 0.20),
            ("business_rules", 0.25),
            ("relationships", 0.20),
        ]),
    );
    map.insert(
        "organization".to_string(),
        weights(&[
            ("field_completeness", 0.30),
            ("data_types", 0.20),
            ("business_rules", 0.30),
            ("relationships", 0.20),
        ]),
    );
    map.insert(
        "event".to_string(),
        weights(&[
            ("field_completeness", 0.30),
            ("data_types", 0.25),
            ("business_rules", 0.20),
            ("relationships", 0.25),
        ]),
    );
    map.insert(
        "student".to_string(),
        weights(&[
            ("field_completeness", 0.40),
            ("data_types", 0.25),
            ("business_rules", 0.20),
            ("relationships", 0.15),
        ]),
    );
    map.insert(
        "teacher".to_string(),
        weights(&[
            ("field_completeness", 0.35),
            ("data_types", 0.25),
            ("business_rules", 0.20),
            ("relationships", 0.20),
        ]),
    );
    map.insert(
        "school".to_string(),
        weights(&[
            ("field_completeness", 0.30),
            ("data_types", 0.20),
            ("business_rules", 0.25),
            ("relationships", 0.25),
        ]),
    );
    map.insert(
        "district".to_string(),
        weights(&[
            ("field_completeness", 0.30),
            ("data_types", 0.20),
            ("business_rules", 0.25),
            ("relationships", 0.25),
        ]),
    );
    map
}

fn default_entity_thresholds() -> HashMap<String, f64> {
    [
        ("volunteer", 75.0),
        ("organization", 80.0),
        ("event", 70.0),
        ("student", 80.0),
        ("teacher", 75.0),
        ("school", 78.0),
        ("district", 82.0),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), *v))
    .collect()
}

fn default_threshold_adjustments() -> HashMap<String, ThresholdAdjustment> {
    let mut map = HashMap::new();
    map.insert(
        "organization".to_string(),
        ThresholdAdjustment {
            historical_performance: 0.5,
            business_criticality: 2.0,
            data_volume: 0.5,
            compliance: 2.0,
        },
    );
    map.insert(
        "district".to_string(),
        ThresholdAdjustment {
            historical_performance: 0.5,
            business_criticality: 1.5,
            data_volume: 1.0,
            compliance: 2.0,
        },
    );
    map.insert(
        "school".to_string(),
        ThresholdAdjustment {
            historical_performance: 0.5,
            business_criticality: 1.0,
            data_volume: 1.0,
            compliance: 1.5,
        },
    );
    // Student records carry the heaviest compliance obligations.
    map.insert(
        "student".to_string(),
        ThresholdAdjustment {
            historical_performance: 0.0,
            business_criticality: 1.0,
            data_volume: -0.5,
            compliance: 2.5,
        },
    );
    map.insert(
        "teacher".to_string(),
        ThresholdAdjustment {
            historical_performance: 0.0,
            business_criticality: 1.0,
            data_volume: 0.0,
            compliance: 1.0,
        },
    );
    map.insert(
        "volunteer".to_string(),
        ThresholdAdjustment {
            historical_performance: 0.5,
            business_criticality: 0.5,
            data_volume: -0.5,
            compliance: 0.5,
        },
    );
    map.insert(
        "event".to_string(),
        ThresholdAdjustment {
            historical_performance: 0.0,
            business_criticality: -1.0,
            data_volume: -1.0,
            compliance: 0.0,
        },
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_cover_all_entity_types() {
        let config = ScoringConfig::default();
        for entity in DEFAULT_ENTITY_TYPES {
            assert!(config.entity_weights.contains_key(entity), "{entity} missing");
        }
        assert!(config.entity_weights.contains_key("default"));
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let config = ScoringConfig::default();
        for (entity, map) in &config.entity_weights {
            let sum: f64 = map.values().sum();
            assert!((sum - 1.0).abs() < 1e-9, "{entity} weights sum to {sum}");
        }
    }

    #[test]
    fn test_default_thresholds_in_range() {
        let config = ScoringConfig::default();
        for (entity, threshold) in &config.entity_thresholds {
            assert!((0.0..=100.0).contains(threshold), "{entity}: {threshold}");
        }
    }

    #[test]
    fn test_organization_adjusted_above_event() {
        let config = ScoringConfig::default();
        let org = config.threshold_adjustments["organization"];
        let event = config.threshold_adjustments["event"];
        assert!(org.business_criticality > event.business_criticality);
        assert!(org.compliance > event.compliance);
        assert!(org.total() > event.total());
    }
}
