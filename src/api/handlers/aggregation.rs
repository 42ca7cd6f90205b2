//! Metric aggregation and pattern detection API handlers.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::api::SharedState;
use crate::error::Result;
use crate::services::data_aggregation_service::{
    AggregationAdvice, DataAggregationService, DataSummary, MovingWindows, RollingAverages,
    TrendPatterns,
};

const DEFAULT_LOOKBACK_DAYS: i32 = 30;
const DEFAULT_WINDOW_SIZE: usize = 7;
const DEFAULT_MIN_PATTERN_LENGTH: usize = 10;
const DEFAULT_TARGET_RESPONSE_MS: f64 = 1000.0;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rolling-averages", get(get_rolling_averages))
        .route("/moving-windows", get(get_moving_windows))
        .route("/patterns", get(get_trend_patterns))
        .route("/summary", get(get_data_summary))
        .route("/performance-advice", get(get_performance_advice))
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct RollingQuery {
    pub metric_name: String,
    pub entity_type: Option<String>,
    pub window_size: Option<usize>,
    pub days: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct MovingWindowsQuery {
    pub metric_name: String,
    pub entity_type: Option<String>,
    /// Comma-separated window sizes, e.g. "3,7,14".
    pub window_sizes: Option<String>,
    pub days: Option<i32>,
}

impl MovingWindowsQuery {
    fn parse_window_sizes(&self) -> Vec<usize> {
        let parsed: Vec<usize> = self
            .window_sizes
            .as_deref()
            .unwrap_or("")
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .filter(|size| *size > 0)
            .collect();
        if parsed.is_empty() {
            vec![3, 7, 14]
        } else {
            parsed
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct PatternsQuery {
    pub metric_name: String,
    pub entity_type: Option<String>,
    pub days: Option<i32>,
    pub min_pattern_length: Option<usize>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct SummaryQuery {
    pub entity_type: Option<String>,
    pub validation_type: Option<String>,
    pub days: Option<i32>,
    pub include_patterns: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct AdviceQuery {
    pub metric_name: String,
    pub entity_type: Option<String>,
    pub target_response_time_ms: Option<f64>,
}

/// GET /api/v1/aggregation/rolling-averages
#[utoipa::path(
    get,
    path = "/rolling-averages",
    context_path = "/api/v1/aggregation",
    tag = "aggregation",
    params(RollingQuery),
    responses(
        (status = 200, description = "Rolling averages over a metric series", body = RollingAverages),
    )
)]
pub async fn get_rolling_averages(
    State(state): State<SharedState>,
    Query(query): Query<RollingQuery>,
) -> Result<Json<RollingAverages>> {
    let service = DataAggregationService::new(state.db.clone());
    let averages = service
        .calculate_rolling_averages(
            &query.metric_name,
            query.entity_type.as_deref(),
            query.window_size.unwrap_or(DEFAULT_WINDOW_SIZE),
            query.days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
        )
        .await?;
    Ok(Json(averages))
}

/// GET /api/v1/aggregation/moving-windows
#[utoipa::path(
    get,
    path = "/moving-windows",
    context_path = "/api/v1/aggregation",
    tag = "aggregation",
    params(MovingWindowsQuery),
    responses(
        (status = 200, description = "Stability/responsiveness comparison across window sizes", body = MovingWindows),
    )
)]
pub async fn get_moving_windows(
    State(state): State<SharedState>,
    Query(query): Query<MovingWindowsQuery>,
) -> Result<Json<MovingWindows>> {
    let service = DataAggregationService::new(state.db.clone());
    let windows = service
        .calculate_moving_windows(
            &query.metric_name,
            query.entity_type.as_deref(),
            &query.parse_window_sizes(),
            query.days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
        )
        .await?;
    Ok(Json(windows))
}

/// GET /api/v1/aggregation/patterns
#[utoipa::path(
    get,
    path = "/patterns",
    context_path = "/api/v1/aggregation",
    tag = "aggregation",
    params(PatternsQuery),
    responses(
        (status = 200, description = "Detected trend/cycle/seasonal/anomaly patterns", body = TrendPatterns),
    )
)]
pub async fn get_trend_patterns(
    State(state): State<SharedState>,
    Query(query): Query<PatternsQuery>,
) -> Result<Json<TrendPatterns>> {
    let service = DataAggregationService::new(state.db.clone());
    let patterns = service
        .detect_trend_patterns(
            &query.metric_name,
            query.entity_type.as_deref(),
            query.days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            query.min_pattern_length.unwrap_or(DEFAULT_MIN_PATTERN_LENGTH),
        )
        .await?;
    Ok(Json(patterns))
}

/// GET /api/v1/aggregation/summary
#[utoipa::path(
    get,
    path = "/summary",
    context_path = "/api/v1/aggregation",
    tag = "aggregation",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Per-metric statistics and trends", body = DataSummary),
    )
)]
pub async fn get_data_summary(
    State(state): State<SharedState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DataSummary>> {
    let service = DataAggregationService::new(state.db.clone());
    let summary = service
        .generate_data_summary(
            query.entity_type.as_deref(),
            query.validation_type.as_deref(),
            query.days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            query.include_patterns.unwrap_or(false),
        )
        .await?;
    Ok(Json(summary))
}

/// GET /api/v1/aggregation/performance-advice
#[utoipa::path(
    get,
    path = "/performance-advice",
    context_path = "/api/v1/aggregation",
    tag = "aggregation",
    params(AdviceQuery),
    responses(
        (status = 200, description = "Advisory aggregation sizing", body = AggregationAdvice),
    )
)]
pub async fn get_performance_advice(
    State(state): State<SharedState>,
    Query(query): Query<AdviceQuery>,
) -> Result<Json<AggregationAdvice>> {
    let service = DataAggregationService::new(state.db.clone());
    let advice = service
        .optimize_aggregation_performance(
            &query.metric_name,
            query.entity_type.as_deref(),
            query
                .target_response_time_ms
                .unwrap_or(DEFAULT_TARGET_RESPONSE_MS),
        )
        .await?;
    Ok(Json(advice))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        get_rolling_averages,
        get_moving_windows,
        get_trend_patterns,
        get_data_summary,
        get_performance_advice,
    ),
    components(schemas(
        RollingQuery,
        MovingWindowsQuery,
        PatternsQuery,
        SummaryQuery,
        AdviceQuery,
        RollingAverages,
        MovingWindows,
        TrendPatterns,
        DataSummary,
        AggregationAdvice,
    ))
)]
pub struct AggregationApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window_sizes() {
        let query = MovingWindowsQuery {
            metric_name: "field_completeness".to_string(),
            entity_type: None,
            window_sizes: Some("3, 7,14".to_string()),
            days: None,
        };
        assert_eq!(query.parse_window_sizes(), vec![3, 7, 14]);
    }

    #[test]
    fn test_parse_window_sizes_defaults() {
        let query = MovingWindowsQuery {
            metric_name: "field_completeness".to_string(),
            entity_type: None,
            window_sizes: None,
            days: None,
        };
        assert_eq!(query.parse_window_sizes(), vec![3, 7, 14]);
    }

    #[test]
    fn test_parse_window_sizes_drops_invalid_entries() {
        let query = MovingWindowsQuery {
            metric_name: "field_completeness".to_string(),
            entity_type: None,
            window_sizes: Some("0,abc,5".to_string()),
            days: None,
        };
        assert_eq!(query.parse_window_sizes(), vec![5]);
    }
}
