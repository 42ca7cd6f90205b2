//! Validation history model: durable per-run quality records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Slope dead band: absolute per-record change below this counts as stable.
pub const TREND_DEAD_BAND: f64 = 0.1;

/// Trend magnitude cutoffs used when describing a trend in words.
const TREND_MAGNITUDE_WEAK: f64 = 0.1;
const TREND_MAGNITUDE_MODERATE: f64 = 0.5;
const TREND_MAGNITUDE_STRONG: f64 = 1.0;

/// Confidence above which a trend description is stated without hedging.
const TREND_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Direction of a quality-score trend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "trend_direction", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
            TrendDirection::InsufficientData => "insufficient_data",
        }
    }
}

/// Result of classifying a chronologically ordered score series.
#[derive(Debug, Clone, Copy)]
pub struct TrendClassification {
    pub direction: TrendDirection,
    /// Average per-record change: `(last − first) / count`.
    pub slope: f64,
}

/// Classify a score series by its endpoint slope with a ±0.1 dead band.
///
/// Fewer than two points cannot establish a direction.
pub fn classify_trend(scores: &[f64]) -> TrendClassification {
    if scores.len() < 2 {
        return TrendClassification {
            direction: TrendDirection::InsufficientData,
            slope: 0.0,
        };
    }

    let slope = (scores[scores.len() - 1] - scores[0]) / scores.len() as f64;
    let direction = if slope > TREND_DEAD_BAND {
        TrendDirection::Improving
    } else if slope < -TREND_DEAD_BAND {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    TrendClassification { direction, slope }
}

/// Whether a record's quality score meets the threshold captured at
/// creation time. This is the threshold-relative view, distinct from the
/// absolute tier bands in [`crate::services::threshold_manager::QualityTier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    OnTarget,
    BelowTarget,
}

/// One validation run's quality outcome for one (entity_type, validation_type).
///
/// Created once by the history service and immutable afterwards, except for
/// the externally-set anomaly flag and bulk retention deletes.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ValidationHistory {
    pub id: Uuid,
    pub run_id: Uuid,
    pub entity_type: String,
    pub validation_type: String,
    pub quality_score: f64,
    pub total_checks: i32,
    pub passed_checks: i32,
    pub failed_checks: i32,
    pub success_rate: f64,
    pub critical_violations: i32,
    pub error_violations: i32,
    pub warning_violations: i32,
    pub info_violations: i32,
    pub total_violations: i32,
    pub execution_time_seconds: Option<f64>,
    pub memory_usage_mb: Option<f64>,
    pub cpu_usage_percent: Option<f64>,
    pub field_completeness: Option<f64>,
    pub data_type_accuracy: Option<f64>,
    pub relationship_integrity: Option<f64>,
    pub business_rule_compliance: Option<f64>,
    pub quality_threshold: f64,
    pub trend_direction: Option<TrendDirection>,
    pub trend_magnitude: Option<f64>,
    pub trend_confidence: Option<f64>,
    pub is_anomaly: bool,
    pub created_at: DateTime<Utc>,
}

impl ValidationHistory {
    /// Violations as a percentage of total checks (0 when no checks ran).
    pub fn violation_rate(&self) -> f64 {
        if self.total_checks > 0 {
            self.total_violations as f64 / self.total_checks as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Threshold-relative status of this record.
    pub fn target_status(&self) -> TargetStatus {
        if self.quality_score >= self.quality_threshold {
            TargetStatus::OnTarget
        } else {
            TargetStatus::BelowTarget
        }
    }

    /// Human-readable description of the trend fields.
    pub fn trend_description(&self) -> String {
        let Some(direction) = self.trend_direction else {
            return "no trend data".to_string();
        };
        if direction == TrendDirection::InsufficientData {
            return "insufficient data for a trend".to_string();
        }

        let magnitude = self.trend_magnitude.unwrap_or(0.0).abs();
        let strength = if magnitude < TREND_MAGNITUDE_WEAK {
            "minimal"
        } else if magnitude < TREND_MAGNITUDE_MODERATE {
            "weak"
        } else if magnitude < TREND_MAGNITUDE_STRONG {
            "moderate"
        } else {
            "strong"
        };

        let confidence = self.trend_confidence.unwrap_or(0.0);
        if confidence >= TREND_CONFIDENCE_THRESHOLD {
            format!("{} {} trend", strength, direction.as_str())
        } else {
            format!("{} {} trend (low confidence)", strength, direction.as_str())
        }
    }

    /// Full serializable view of this record, including derived fields.
    pub fn snapshot(&self) -> ValidationHistorySnapshot {
        ValidationHistorySnapshot {
            violation_rate: self.violation_rate(),
            target_status: self.target_status(),
            trend_description: self.trend_description(),
            record: self.clone(),
        }
    }
}

/// JSON view of a history record with its derived properties attached.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ValidationHistorySnapshot {
    #[serde(flatten)]
    pub record: ValidationHistory,
    pub violation_rate: f64,
    pub target_status: TargetStatus,
    pub trend_description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(score: f64, threshold: f64) -> ValidationHistory {
        ValidationHistory {
            id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            entity_type: "volunteer".to_string(),
            validation_type: "field_completeness".to_string(),
            quality_score: score,
            total_checks: 20,
            passed_checks: 16,
            failed_checks: 4,
            success_rate: 80.0,
            critical_violations: 0,
            error_violations: 4,
            warning_violations: 0,
            info_violations: 0,
            total_violations: 4,
            execution_time_seconds: Some(1.5),
            memory_usage_mb: None,
            cpu_usage_percent: None,
            field_completeness: Some(80.0),
            data_type_accuracy: None,
            relationship_integrity: None,
            business_rule_compliance: None,
            quality_threshold: threshold,
            trend_direction: None,
            trend_magnitude: None,
            trend_confidence: None,
            is_anomaly: false,
            created_at: Utc::now(),
        }
    }

    // ── classify_trend ───────────────────────────────────────────────

    #[test]
    fn test_trend_insufficient_with_fewer_than_two_points() {
        assert_eq!(
            classify_trend(&[70.0]).direction,
            TrendDirection::InsufficientData
        );
        assert_eq!(
            classify_trend(&[]).direction,
            TrendDirection::InsufficientData
        );
    }

    #[test]
    fn test_trend_dead_band_is_stable() {
        // slope = 0.05 / 2 = 0.025, inside the ±0.1 dead band
        let t = classify_trend(&[70.0, 70.05]);
        assert_eq!(t.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_trend_improving_outside_dead_band() {
        // slope = 3 / 2 = 1.5
        let t = classify_trend(&[70.0, 73.0]);
        assert_eq!(t.direction, TrendDirection::Improving);
        assert!((t.slope - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_trend_declining() {
        let t = classify_trend(&[90.0, 80.0, 70.0]);
        assert_eq!(t.direction, TrendDirection::Declining);
    }

    // ── derived properties ───────────────────────────────────────────

    #[test]
    fn test_violation_rate() {
        let r = record(80.0, 75.0);
        assert!((r.violation_rate() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_violation_rate_no_checks() {
        let mut r = record(0.0, 75.0);
        r.total_checks = 0;
        r.total_violations = 0;
        assert_eq!(r.violation_rate(), 0.0);
    }

    #[test]
    fn test_target_status_relative_to_own_threshold() {
        assert_eq!(record(80.0, 75.0).target_status(), TargetStatus::OnTarget);
        assert_eq!(record(74.9, 75.0).target_status(), TargetStatus::BelowTarget);
        // Same score, different captured threshold
        assert_eq!(record(80.0, 85.0).target_status(), TargetStatus::BelowTarget);
    }

    #[test]
    fn test_trend_description_without_trend() {
        assert_eq!(record(80.0, 75.0).trend_description(), "no trend data");
    }

    #[test]
    fn test_trend_description_with_confident_trend() {
        let mut r = record(80.0, 75.0);
        r.trend_direction = Some(TrendDirection::Improving);
        r.trend_magnitude = Some(1.5);
        r.trend_confidence = Some(0.8);
        assert_eq!(r.trend_description(), "strong improving trend");
    }

    #[test]
    fn test_trend_description_low_confidence() {
        let mut r = record(80.0, 75.0);
        r.trend_direction = Some(TrendDirection::Declining);
        r.trend_magnitude = Some(0.3);
        r.trend_confidence = Some(0.2);
        assert_eq!(r.trend_description(), "weak declining trend (low confidence)");
    }

    #[test]
    fn test_snapshot_includes_derived_fields() {
        let r = record(80.0, 75.0);
        let json = serde_json::to_value(r.snapshot()).unwrap();
        assert_eq!(json["entity_type"], "volunteer");
        assert_eq!(json["target_status"], "on_target");
        assert!((json["violation_rate"].as_f64().unwrap() - 20.0).abs() < 1e-9);
    }
}
