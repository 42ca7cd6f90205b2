//! Validation history API handlers.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::SharedState;
use crate::error::Result;
use crate::models::validation_history::ValidationHistorySnapshot;
use crate::services::validation_history_service::{
    HistorySummaryStatistics, QualityTrendPoint, ValidationHistoryService,
};

const DEFAULT_LOOKBACK_DAYS: i32 = 30;
const DEFAULT_LIMIT: i64 = 50;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_history))
        .route("/trends", get(get_quality_trends))
        .route("/anomalies", get(get_anomalies))
        .route("/statistics", get(get_statistics))
        .route("/populate", post(populate_history))
        .route("/cleanup", post(cleanup_history))
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct HistoryQuery {
    pub entity_type: String,
    pub validation_type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct TrendsQuery {
    pub entity_type: Option<String>,
    pub days: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct AnomaliesQuery {
    pub entity_type: Option<String>,
    pub days: Option<i32>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct StatisticsQuery {
    pub days: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct PopulateQuery {
    pub days: Option<i32>,
    /// Create history for one specific run instead of a window sweep.
    pub run_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PopulateResponse {
    pub rows_created: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    pub rows_removed: u64,
    pub retention_days: i32,
}

/// GET /api/v1/history
#[utoipa::path(
    get,
    path = "/",
    context_path = "/api/v1/history",
    tag = "history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Recent history records, newest first", body = Vec<ValidationHistorySnapshot>),
    )
)]
pub async fn list_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ValidationHistorySnapshot>>> {
    let service = ValidationHistoryService::new(state.db.clone());
    let records = service
        .get_entity_history(
            &query.entity_type,
            query.validation_type.as_deref(),
            query.limit.unwrap_or(DEFAULT_LIMIT),
        )
        .await?;
    Ok(Json(records.iter().map(|r| r.snapshot()).collect()))
}

/// GET /api/v1/history/trends
#[utoipa::path(
    get,
    path = "/trends",
    context_path = "/api/v1/history",
    tag = "history",
    params(TrendsQuery),
    responses(
        (status = 200, description = "Daily average quality scores", body = Vec<QualityTrendPoint>),
    )
)]
pub async fn get_quality_trends(
    State(state): State<SharedState>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<Vec<QualityTrendPoint>>> {
    let service = ValidationHistoryService::new(state.db.clone());
    let trends = service
        .get_quality_trends(
            query.entity_type.as_deref(),
            query.days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
        )
        .await?;
    Ok(Json(trends))
}

/// GET /api/v1/history/anomalies
#[utoipa::path(
    get,
    path = "/anomalies",
    context_path = "/api/v1/history",
    tag = "history",
    params(AnomaliesQuery),
    responses(
        (status = 200, description = "History records flagged as anomalies", body = Vec<ValidationHistorySnapshot>),
    )
)]
pub async fn get_anomalies(
    State(state): State<SharedState>,
    Query(query): Query<AnomaliesQuery>,
) -> Result<Json<Vec<ValidationHistorySnapshot>>> {
    let service = ValidationHistoryService::new(state.db.clone());
    let records = service
        .get_anomalies(
            query.entity_type.as_deref(),
            query.days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            query.limit.unwrap_or(DEFAULT_LIMIT),
        )
        .await?;
    Ok(Json(records.iter().map(|r| r.snapshot()).collect()))
}

/// GET /api/v1/history/statistics
#[utoipa::path(
    get,
    path = "/statistics",
    context_path = "/api/v1/history",
    tag = "history",
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Aggregate history statistics", body = HistorySummaryStatistics),
    )
)]
pub async fn get_statistics(
    State(state): State<SharedState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<HistorySummaryStatistics>> {
    let service = ValidationHistoryService::new(state.db.clone());
    let statistics = service
        .get_summary_statistics(query.days.unwrap_or(DEFAULT_LOOKBACK_DAYS))
        .await?;
    Ok(Json(statistics))
}

/// POST /api/v1/history/populate - derive history from recent completed runs
#[utoipa::path(
    post,
    path = "/populate",
    context_path = "/api/v1/history",
    tag = "history",
    params(PopulateQuery),
    responses(
        (status = 200, description = "History rows created", body = PopulateResponse),
    )
)]
pub async fn populate_history(
    State(state): State<SharedState>,
    Query(query): Query<PopulateQuery>,
) -> Result<Json<PopulateResponse>> {
    let service = ValidationHistoryService::new(state.db.clone());
    let rows_created = match query.run_id {
        Some(run_id) => service.create_history_from_run(run_id, None).await?.len() as u64,
        None => {
            service
                .populate_history_from_recent_runs(
                    query.days.unwrap_or(state.config.history_population_days),
                )
                .await?
        }
    };
    Ok(Json(PopulateResponse { rows_created }))
}

/// POST /api/v1/history/cleanup - delete records past retention
#[utoipa::path(
    post,
    path = "/cleanup",
    context_path = "/api/v1/history",
    tag = "history",
    responses(
        (status = 200, description = "History rows removed", body = CleanupResponse),
    )
)]
pub async fn cleanup_history(State(state): State<SharedState>) -> Result<Json<CleanupResponse>> {
    let retention_days = state.config.history_retention_days;
    let service = ValidationHistoryService::new(state.db.clone());
    let rows_removed = service.cleanup_old_records(retention_days).await?;
    Ok(Json(CleanupResponse {
        rows_removed,
        retention_days,
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_history,
        get_quality_trends,
        get_anomalies,
        get_statistics,
        populate_history,
        cleanup_history,
    ),
    components(schemas(
        HistoryQuery,
        TrendsQuery,
        AnomaliesQuery,
        StatisticsQuery,
        PopulateQuery,
        PopulateResponse,
        CleanupResponse,
        ValidationHistorySnapshot,
        QualityTrendPoint,
        HistorySummaryStatistics,
    ))
)]
pub struct HistoryApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_query_deserialize() {
        let json = r#"{"entity_type": "volunteer", "validation_type": "field_completeness", "limit": 10}"#;
        let q: HistoryQuery = serde_json::from_str(json).unwrap();
        assert_eq!(q.entity_type, "volunteer");
        assert_eq!(q.validation_type.as_deref(), Some("field_completeness"));
        assert_eq!(q.limit, Some(10));
    }

    #[test]
    fn test_populate_query_defaults() {
        let json = r#"{}"#;
        let q: PopulateQuery = serde_json::from_str(json).unwrap();
        assert!(q.days.is_none());
        assert!(q.run_id.is_none());
    }
}
