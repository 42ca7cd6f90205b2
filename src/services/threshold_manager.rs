//! Quality threshold resolution and absolute tier classification.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::scoring_config::{
    ScoringConfig, ThresholdAdjustment, GLOBAL_THRESHOLD_FALLBACK,
};

/// Bounds for dynamically adjusted entity thresholds.
const ADJUSTED_MIN: f64 = 50.0;
const ADJUSTED_MAX: f64 = 95.0;

/// Bounds for per-validation-type thresholds.
const VALIDATION_TYPE_MIN: f64 = 50.0;
const VALIDATION_TYPE_MAX: f64 = 100.0;

/// Absolute quality tier, classified by fixed score bands regardless of the
/// per-entity configured threshold. The threshold-relative view lives on the
/// history record as `target_status`; the two are distinct concepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityTier {
    /// Classify a 0–100 score: excellent ≥90, good ≥80, fair ≥70, else poor.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            QualityTier::Excellent
        } else if score >= 80.0 {
            QualityTier::Good
        } else if score >= 70.0 {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Excellent => "excellent",
            QualityTier::Good => "good",
            QualityTier::Fair => "fair",
            QualityTier::Poor => "poor",
        }
    }
}

pub struct ThresholdManager {
    defaults: HashMap<String, f64>,
    adjustments: HashMap<String, ThresholdAdjustment>,
    dynamic_adjustment: bool,
    entity_overrides: HashMap<String, f64>,
    validation_type_overrides: HashMap<String, f64>,
}

impl ThresholdManager {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            defaults: config.entity_thresholds.clone(),
            adjustments: config.threshold_adjustments.clone(),
            dynamic_adjustment: config.dynamic_threshold_adjustment,
            entity_overrides: HashMap::new(),
            validation_type_overrides: HashMap::new(),
        }
    }

    /// Pass/fail quality threshold for an entity type: override → configured
    /// default → 75.0 fallback, then the additive dynamic adjustment bounded
    /// to [50, 95]. Explicit overrides skip the adjustment step.
    pub fn entity_threshold(&self, entity_type: &str) -> f64 {
        if let Some(threshold) = self.entity_overrides.get(entity_type) {
            return *threshold;
        }

        let base = self
            .defaults
            .get(entity_type)
            .copied()
            .unwrap_or(GLOBAL_THRESHOLD_FALLBACK);

        if !self.dynamic_adjustment {
            return base;
        }

        let adjustment = self
            .adjustments
            .get(entity_type)
            .map(ThresholdAdjustment::total)
            .unwrap_or(0.0);
        (base + adjustment).clamp(ADJUSTED_MIN, ADJUSTED_MAX)
    }

    /// Threshold for one validation dimension: explicit per-type override if
    /// set, else the entity threshold scaled by the dimension's importance
    /// factor, clamped to [50, 100].
    pub fn validation_type_threshold(&self, entity_type: &str, validation_type: &str) -> f64 {
        if let Some(threshold) = self.validation_type_overrides.get(validation_type) {
            return *threshold;
        }

        let scaled = self.entity_threshold(entity_type) * importance_factor(validation_type);
        scaled.clamp(VALIDATION_TYPE_MIN, VALIDATION_TYPE_MAX)
    }

    /// Absolute tier for a score. The entity type does not alter the bands.
    pub fn quality_tier(&self, score: f64) -> QualityTier {
        QualityTier::from_score(score)
    }

    /// Install an entity threshold override; out-of-range values are ignored.
    pub fn set_entity_threshold_override(&mut self, entity_type: &str, threshold: f64) {
        if !(0.0..=100.0).contains(&threshold) || !threshold.is_finite() {
            tracing::warn!(
                entity_type = entity_type,
                threshold = threshold,
                "Invalid entity threshold override, ignoring"
            );
            return;
        }
        self.entity_overrides
            .insert(entity_type.to_string(), threshold);
    }

    /// Install a validation-type threshold override; out-of-range values are
    /// ignored.
    pub fn set_validation_type_threshold(&mut self, validation_type: &str, threshold: f64) {
        if !(0.0..=100.0).contains(&threshold) || !threshold.is_finite() {
            tracing::warn!(
                validation_type = validation_type,
                threshold = threshold,
                "Invalid validation-type threshold override, ignoring"
            );
            return;
        }
        self.validation_type_overrides
            .insert(validation_type.to_string(), threshold);
    }

    /// Drop all overrides, restoring configured defaults.
    pub fn clear_overrides(&mut self) {
        self.entity_overrides.clear();
        self.validation_type_overrides.clear();
    }
}

/// Relative importance of each validation dimension when deriving per-type
/// thresholds from the entity threshold.
fn importance_factor(validation_type: &str) -> f64 {
    match validation_type {
        "business_rules" => 1.2,
        "data_types" => 1.1,
        "field_completeness" => 1.0,
        "relationships" => 0.9,
        _ => 1.0,
    }
}
