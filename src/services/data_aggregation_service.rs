//! Statistical aggregation over validation metric time series.
//!
//! Rolling averages, multi-window comparison, trend/cycle/seasonal pattern
//! detection, z-score anomaly detection, and aggregation sizing advice. All
//! statistics run over series pulled fully into memory; the math lives in
//! pure functions below the service.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::validation_metric::{MetricTrend, ValidationMetric};
use crate::services::scoring_config::ScoringConfig;

/// |z| above this flags a point as anomalous.
pub const ANOMALY_Z_THRESHOLD: f64 = 2.0;

/// Autocorrelation above this reports a candidate cycle.
const CYCLE_AUTOCORRELATION_THRESHOLD: f64 = 0.7;

/// Largest lag examined by cycle detection.
const CYCLE_MAX_LAG: usize = 30;

/// Weekly seasonality requirements.
const SEASONAL_MIN_WEEKS: usize = 4;
const SEASONAL_MIN_POINTS_PER_WEEK: usize = 2;
const SEASONAL_CV_THRESHOLD: f64 = 0.2;

/// |slope| bands for linear trend strength.
const SLOPE_STABLE: f64 = 0.01;
const SLOPE_WEAK: f64 = 0.1;
const SLOPE_MODERATE: f64 = 0.5;

/// Metrics need at least this many points before the summary runs pattern
/// detection on them.
const SUMMARY_PATTERN_MIN_POINTS: usize = 5;

/// One (timestamp, value) sample of a metric series.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, ToSchema)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// One averaged window position.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RollingWindowPoint {
    pub window_end: DateTime<Utc>,
    pub average: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RollingAverages {
    pub metric_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub window_size: usize,
    pub period_days: i32,
    pub data_points: usize,
    pub rolling_averages: Vec<RollingWindowPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Smoothing-vs-lag tradeoff for one window size.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WindowComparison {
    pub window_size: usize,
    pub windows: usize,
    /// Mean per-window standard deviation; lower reads as more stable.
    pub stability: f64,
    /// Mean absolute delta between consecutive averages; higher reacts faster.
    pub responsiveness: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MovingWindows {
    pub metric_name: String,
    pub period_days: i32,
    pub data_points: usize,
    pub comparisons: Vec<WindowComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One detected pattern in a metric series.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "pattern_type", rename_all = "snake_case")]
pub enum TrendPattern {
    LinearTrend {
        slope: f64,
        intercept: f64,
        r_squared: f64,
        direction: String,
        strength: String,
        confidence: f64,
    },
    Cycle {
        cycle_length: usize,
        autocorrelation: f64,
    },
    WeeklySeasonal {
        weeks_observed: usize,
        coefficient_of_variation: f64,
        weekly_means: Vec<f64>,
    },
    Anomalies {
        threshold: f64,
        mean: f64,
        std_dev: f64,
        indices: Vec<usize>,
        values: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrendPatterns {
    pub metric_name: String,
    pub data_points: usize,
    pub patterns: Vec<TrendPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Basic statistics and trend for one metric in the data summary.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricSummaryEntry {
    pub metric_name: String,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub latest_value: f64,
    pub trend: MetricTrend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<TrendPattern>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DataSummary {
    pub period_days: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_type: Option<String>,
    pub metrics: Vec<MetricSummaryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Advisory output of the aggregation sizing heuristic. Informational only;
/// nothing enforces the recommendation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AggregationAdvice {
    pub metric_name: String,
    pub record_count: i64,
    pub strategy: String,
    pub recommended_window_size: usize,
    pub estimated_response_time_ms: f64,
    pub target_response_time_ms: f64,
    pub meets_target: bool,
}

pub struct DataAggregationService {
    db: PgPool,
    cycle_detection_cap: usize,
}

impl DataAggregationService {
    pub fn new(db: PgPool) -> Self {
        Self::with_config(db, &ScoringConfig::default())
    }

    pub fn with_config(db: PgPool, config: &ScoringConfig) -> Self {
        Self {
            db,
            cycle_detection_cap: config.cycle_detection_cap,
        }
    }

    /// Slide a fixed window over the series, one averaged point per window
    /// position. Fewer than `window_size` points yields an empty list with a
    /// diagnostic message.
    pub async fn calculate_rolling_averages(
        &self,
        metric_name: &str,
        entity_type: Option<&str>,
        window_size: usize,
        days: i32,
    ) -> Result<RollingAverages> {
        let points = self.fetch_metric_points(metric_name, entity_type, days).await?;

        let (rolling_averages, message) = if window_size == 0 {
            (Vec::new(), Some("Window size must be at least 1".to_string()))
        } else if points.len() < window_size {
            (
                Vec::new(),
                Some(format!(
                    "Insufficient data: {} points for window size {}",
                    points.len(),
                    window_size
                )),
            )
        } else {
            (rolling_windows(&points, window_size), None)
        };

        Ok(RollingAverages {
            metric_name: metric_name.to_string(),
            entity_type: entity_type.map(|s| s.to_string()),
            window_size,
            period_days: days,
            data_points: points.len(),
            rolling_averages,
            message,
        })
    }

    /// Run rolling averages at several window sizes and derive a stability
    /// and responsiveness score per size, so a caller can trade smoothing
    /// against lag.
    pub async fn calculate_moving_windows(
        &self,
        metric_name: &str,
        entity_type: Option<&str>,
        window_sizes: &[usize],
        days: i32,
    ) -> Result<MovingWindows> {
        let points = self.fetch_metric_points(metric_name, entity_type, days).await?;

        let mut comparisons = Vec::new();
        for &window_size in window_sizes {
            if window_size == 0 || points.len() < window_size {
                continue;
            }
            let windows = rolling_windows(&points, window_size);
            comparisons.push(compare_window(window_size, &windows));
        }

        let message = if comparisons.is_empty() {
            Some(format!(
                "Insufficient data: {} points for requested window sizes",
                points.len()
            ))
        } else {
            None
        };

        Ok(MovingWindows {
            metric_name: metric_name.to_string(),
            period_days: days,
            data_points: points.len(),
            comparisons,
            message,
        })
    }

    /// Run the four pattern detectors over a metric series.
    pub async fn detect_trend_patterns(
        &self,
        metric_name: &str,
        entity_type: Option<&str>,
        days: i32,
        min_pattern_length: usize,
    ) -> Result<TrendPatterns> {
        let points = self.fetch_metric_points(metric_name, entity_type, days).await?;

        if points.len() < min_pattern_length {
            return Ok(TrendPatterns {
                metric_name: metric_name.to_string(),
                data_points: points.len(),
                patterns: Vec::new(),
                message: Some(format!(
                    "Insufficient data: {} points, need at least {}",
                    points.len(),
                    min_pattern_length
                )),
            });
        }

        Ok(TrendPatterns {
            metric_name: metric_name.to_string(),
            data_points: points.len(),
            patterns: detect_patterns(&points, self.cycle_detection_cap),
            message: None,
        })
    }

    /// Per-metric statistics, trend, and optional pattern detection for
    /// every metric observed in the window.
    pub async fn generate_data_summary(
        &self,
        entity_type: Option<&str>,
        validation_type: Option<&str>,
        days: i32,
        include_patterns: bool,
    ) -> Result<DataSummary> {
        #[derive(sqlx::FromRow)]
        struct SummaryMetricRow {
            metric_name: String,
            metric_value: f64,
            timestamp: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, SummaryMetricRow>(
            r#"
            SELECT metric_name, metric_value, timestamp
            FROM validation_metrics
            WHERE timestamp >= NOW() - make_interval(days => $3)
              AND ($1::TEXT IS NULL OR entity_type = $1)
              AND ($2::TEXT IS NULL OR metric_category = $2)
            ORDER BY metric_name, timestamp ASC
            "#,
        )
        .bind(entity_type)
        .bind(validation_type)
        .bind(days)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let mut grouped: BTreeMap<String, Vec<MetricPoint>> = BTreeMap::new();
        for row in rows {
            grouped.entry(row.metric_name).or_default().push(MetricPoint {
                timestamp: row.timestamp,
                value: row.metric_value,
            });
        }

        let message = grouped
            .is_empty()
            .then(|| "No metrics found in the requested window".to_string());

        let metrics = grouped
            .into_iter()
            .map(|(metric_name, points)| {
                let values: Vec<f64> = points.iter().map(|p| p.value).collect();
                let patterns = (include_patterns && points.len() >= SUMMARY_PATTERN_MIN_POINTS)
                    .then(|| detect_patterns(&points, self.cycle_detection_cap));

                MetricSummaryEntry {
                    metric_name,
                    count: values.len(),
                    mean: mean(&values),
                    min: values.iter().copied().fold(f64::INFINITY, f64::min),
                    max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    std_dev: std_dev(&values),
                    latest_value: *values.last().unwrap_or(&0.0),
                    trend: ValidationMetric::calculate_trend(&values),
                    patterns,
                }
            })
            .collect();

        Ok(DataSummary {
            period_days: days,
            entity_type: entity_type.map(|s| s.to_string()),
            validation_type: validation_type.map(|s| s.to_string()),
            metrics,
            message,
        })
    }

    /// Pure sizing heuristic over the dataset size; advisory only.
    pub async fn optimize_aggregation_performance(
        &self,
        metric_name: &str,
        entity_type: Option<&str>,
        target_response_time_ms: f64,
    ) -> Result<AggregationAdvice> {
        let record_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM validation_metrics
            WHERE metric_name = $1
              AND ($2::TEXT IS NULL OR entity_type = $2)
            "#,
        )
        .bind(metric_name)
        .bind(entity_type)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(sizing_advice(metric_name, record_count, target_response_time_ms))
    }

    async fn fetch_metric_points(
        &self,
        metric_name: &str,
        entity_type: Option<&str>,
        days: i32,
    ) -> Result<Vec<MetricPoint>> {
        sqlx::query_as::<_, MetricPoint>(
            r#"
            SELECT timestamp, metric_value AS value
            FROM validation_metrics
            WHERE metric_name = $1
              AND ($2::TEXT IS NULL OR entity_type = $2)
              AND timestamp >= NOW() - make_interval(days => $3)
            ORDER BY timestamp ASC
            "#,
        )
        .bind(metric_name)
        .bind(entity_type)
        .bind(days)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }
}

// ── statistics ──────────────────────────────────────────────────────

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// One averaged point per window position over a fixed-size sliding window.
fn rolling_windows(points: &[MetricPoint], window_size: usize) -> Vec<RollingWindowPoint> {
    points
        .windows(window_size)
        .map(|window| {
            let values: Vec<f64> = window.iter().map(|p| p.value).collect();
            RollingWindowPoint {
                window_end: window[window_size - 1].timestamp,
                average: mean(&values),
                std_dev: std_dev(&values),
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect()
}

fn compare_window(window_size: usize, windows: &[RollingWindowPoint]) -> WindowComparison {
    let stability = mean(&windows.iter().map(|w| w.std_dev).collect::<Vec<_>>());
    let deltas: Vec<f64> = windows
        .windows(2)
        .map(|pair| (pair[1].average - pair[0].average).abs())
        .collect();

    WindowComparison {
        window_size,
        windows: windows.len(),
        stability,
        responsiveness: mean(&deltas),
    }
}

/// Ordinary least squares against index positions: (slope, intercept, r²).
fn linear_regression(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len();
    if n < 2 {
        return (0.0, values.first().copied().unwrap_or(0.0), 0.0);
    }

    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = mean(values);

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    for (i, value) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        covariance += dx * (value - mean_y);
        variance_x += dx * dx;
    }

    let slope = covariance / variance_x;
    let intercept = mean_y - slope * mean_x;

    let ss_tot: f64 = values.iter().map(|v| (v - mean_y).powi(2)).sum();
    if ss_tot <= f64::EPSILON {
        return (slope, intercept, 0.0);
    }
    let ss_res: f64 = values
        .iter()
        .enumerate()
        .map(|(i, v)| (v - (intercept + slope * i as f64)).powi(2))
        .sum();

    (slope, intercept, 1.0 - ss_res / ss_tot)
}

/// Normalized autocorrelation of the series at a lag.
fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    if lag >= values.len() {
        return 0.0;
    }
    let m = mean(values);
    let denominator: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    if denominator <= f64::EPSILON {
        return 0.0;
    }
    let numerator: f64 = (0..values.len() - lag)
        .map(|i| (values[i] - m) * (values[i + lag] - m))
        .sum();
    numerator / denominator
}

/// Indices whose |z| exceeds the threshold against the full-series mean and
/// population standard deviation. A flat series has no outliers.
pub fn zscore_outlier_indices(values: &[f64], threshold: f64) -> Vec<usize> {
    let m = mean(values);
    let sd = std_dev(values);
    if sd <= f64::EPSILON {
        return Vec::new();
    }
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| ((*v - m) / sd).abs() > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Run all four detectors and concatenate their findings.
fn detect_patterns(points: &[MetricPoint], cycle_detection_cap: usize) -> Vec<TrendPattern> {
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let mut patterns = Vec::new();

    // Linear trend
    let (slope, intercept, r_squared) = linear_regression(&values);
    let strength = if slope.abs() < SLOPE_STABLE {
        "stable"
    } else if slope.abs() < SLOPE_WEAK {
        "weak"
    } else if slope.abs() < SLOPE_MODERATE {
        "moderate"
    } else {
        "strong"
    };
    let direction = if slope.abs() < SLOPE_STABLE {
        "stable"
    } else if slope > 0.0 {
        "increasing"
    } else {
        "decreasing"
    };
    patterns.push(TrendPattern::LinearTrend {
        slope,
        intercept,
        r_squared,
        direction: direction.to_string(),
        strength: strength.to_string(),
        confidence: (r_squared * values.len() as f64 / 10.0).min(1.0),
    });

    // Cyclical patterns via brute-force autocorrelation. The scan is O(n²),
    // so oversized series skip it entirely.
    if values.len() <= cycle_detection_cap {
        let max_lag = (values.len() / 2).min(CYCLE_MAX_LAG);
        for lag in 2..=max_lag {
            let correlation = autocorrelation(&values, lag);
            if correlation > CYCLE_AUTOCORRELATION_THRESHOLD {
                patterns.push(TrendPattern::Cycle {
                    cycle_length: lag,
                    autocorrelation: correlation,
                });
            }
        }
    } else {
        tracing::warn!(
            data_points = values.len(),
            cap = cycle_detection_cap,
            "Series exceeds cycle detection cap, skipping autocorrelation scan"
        );
    }

    // Weekly seasonality
    if let Some(pattern) = weekly_seasonality(points) {
        patterns.push(pattern);
    }

    // Anomalies: one aggregate entry listing every flagged index.
    let indices = zscore_outlier_indices(&values, ANOMALY_Z_THRESHOLD);
    if !indices.is_empty() {
        patterns.push(TrendPattern::Anomalies {
            threshold: ANOMALY_Z_THRESHOLD,
            mean: mean(&values),
            std_dev: std_dev(&values),
            values: indices.iter().map(|&i| values[i]).collect(),
            indices,
        });
    }

    patterns
}

/// Flag a weekly pattern when weekly means vary enough across at least four
/// ISO weeks with two or more points each.
fn weekly_seasonality(points: &[MetricPoint]) -> Option<TrendPattern> {
    let mut weeks: BTreeMap<(i32, u32), Vec<f64>> = BTreeMap::new();
    for point in points {
        let iso = point.timestamp.iso_week();
        weeks
            .entry((iso.year(), iso.week()))
            .or_default()
            .push(point.value);
    }

    let weekly_means: Vec<f64> = weeks
        .values()
        .filter(|values| values.len() >= SEASONAL_MIN_POINTS_PER_WEEK)
        .map(|values| mean(values))
        .collect();

    if weekly_means.len() < SEASONAL_MIN_WEEKS {
        return None;
    }

    let overall = mean(&weekly_means);
    if overall.abs() <= f64::EPSILON {
        return None;
    }
    let coefficient_of_variation = std_dev(&weekly_means) / overall.abs();
    if coefficient_of_variation <= SEASONAL_CV_THRESHOLD {
        return None;
    }

    Some(TrendPattern::WeeklySeasonal {
        weeks_observed: weekly_means.len(),
        coefficient_of_variation,
        weekly_means,
    })
}

/// Threshold the dataset size into an aggregation strategy with a fixed
/// window recommendation and a linear response-time estimate.
fn sizing_advice(metric_name: &str, record_count: i64, target_response_time_ms: f64) -> AggregationAdvice {
    let (strategy, recommended_window_size, ms_per_record) = if record_count < 1_000 {
        ("full_scan", 10, 0.10)
    } else if record_count < 10_000 {
        ("sampled_aggregation", 50, 0.05)
    } else {
        ("incremental_aggregation", 100, 0.02)
    };

    let estimated_response_time_ms = record_count as f64 * ms_per_record;

    AggregationAdvice {
        metric_name: metric_name.to_string(),
        record_count,
        strategy: strategy.to_string(),
        recommended_window_size,
        estimated_response_time_ms,
        target_response_time_ms,
        meets_target: estimated_response_time_ms <= target_response_time_ms,
    }
}
