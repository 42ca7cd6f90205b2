//! Validation metric model: named numeric measurements tied to a run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::validation_history::TrendDirection;

/// Minimum series length for the model-level trend calculation.
const MIN_TREND_POINTS: usize = 3;

/// Percent-change dead band below which a metric counts as stable.
const STABLE_CHANGE_PERCENT: f64 = 5.0;

/// One named numeric measurement produced during a validation run. Consumed
/// only by the aggregation component, independent of result rows.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ValidationMetric {
    pub id: Uuid,
    pub run_id: Uuid,
    pub metric_name: String,
    pub metric_value: f64,
    pub metric_category: Option<String>,
    pub metric_unit: Option<String>,
    pub entity_type: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Trend of one metric series, computed by [`ValidationMetric::calculate_trend`].
///
/// This is a first-vs-last percent-change view, intentionally simpler than
/// the slope-based classification used for quality-score history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricTrend {
    pub direction: TrendDirection,
    pub change_percent: f64,
    pub data_points: usize,
}

impl ValidationMetric {
    /// Classify the trend of a chronologically ordered value series.
    pub fn calculate_trend(values: &[f64]) -> MetricTrend {
        if values.len() < MIN_TREND_POINTS {
            return MetricTrend {
                direction: TrendDirection::InsufficientData,
                change_percent: 0.0,
                data_points: values.len(),
            };
        }

        let first = values[0];
        let last = values[values.len() - 1];

        let change_percent = if first.abs() > f64::EPSILON {
            (last - first) / first.abs() * 100.0
        } else if last.abs() > f64::EPSILON {
            100.0 * last.signum()
        } else {
            0.0
        };

        let direction = if change_percent.abs() < STABLE_CHANGE_PERCENT {
            TrendDirection::Stable
        } else if change_percent > 0.0 {
            TrendDirection::Improving
        } else {
            TrendDirection::Declining
        };

        MetricTrend {
            direction,
            change_percent,
            data_points: values.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_requires_three_points() {
        let trend = ValidationMetric::calculate_trend(&[90.0, 95.0]);
        assert_eq!(trend.direction, TrendDirection::InsufficientData);
        assert_eq!(trend.data_points, 2);
    }

    #[test]
    fn test_trend_improving() {
        let trend = ValidationMetric::calculate_trend(&[80.0, 85.0, 92.0]);
        assert_eq!(trend.direction, TrendDirection::Improving);
        assert!((trend.change_percent - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_declining() {
        let trend = ValidationMetric::calculate_trend(&[90.0, 85.0, 70.0]);
        assert_eq!(trend.direction, TrendDirection::Declining);
    }

    #[test]
    fn test_trend_stable_within_dead_band() {
        let trend = ValidationMetric::calculate_trend(&[90.0, 91.0, 92.0]);
        // 2.2% change is inside the 5% dead band
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_trend_zero_baseline() {
        let trend = ValidationMetric::calculate_trend(&[0.0, 10.0, 20.0]);
        assert_eq!(trend.direction, TrendDirection::Improving);
        assert!((trend.change_percent - 100.0).abs() < 1e-9);
    }
}
