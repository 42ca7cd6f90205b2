//! Quality scoring API handlers.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::SharedState;
use crate::error::Result;
use crate::services::quality_scoring_service::QualityScoringService;
use crate::services::score_calculator::ScoreBreakdown;

const DEFAULT_LOOKBACK_DAYS: i32 = 30;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/entities/{entity_type}/score", get(get_entity_score))
        .route(
            "/entities/{entity_type}/dimensions/{validation_type}/breakdown",
            get(get_dimension_breakdown),
        )
        .route("/report", get(get_quality_report))
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct EntityScoreQuery {
    pub run_id: Option<Uuid>,
    pub days: Option<i32>,
    pub include_details: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct ReportQuery {
    /// Comma-separated entity types; all standard entities when omitted.
    pub entity_types: Option<String>,
    pub days: Option<i32>,
    pub include_trends: Option<bool>,
}

impl ReportQuery {
    fn parse_entity_types(&self) -> Option<Vec<String>> {
        let raw = self.entity_types.as_deref()?;
        let parsed: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        (!parsed.is_empty()).then_some(parsed)
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct BreakdownQuery {
    pub days: Option<i32>,
}

/// GET /api/v1/quality/entities/{entity_type}/score
#[utoipa::path(
    get,
    path = "/entities/{entity_type}/score",
    context_path = "/api/v1/quality",
    tag = "quality",
    params(
        ("entity_type" = String, Path, description = "Entity type to score"),
        EntityScoreQuery,
    ),
    responses(
        (status = 200, description = "Composite quality score for the entity type", body = crate::services::quality_scoring_service::EntityQualityScore),
    )
)]
pub async fn get_entity_score(
    State(state): State<SharedState>,
    Path(entity_type): Path<String>,
    Query(query): Query<EntityScoreQuery>,
) -> Result<Json<crate::services::quality_scoring_service::EntityQualityScore>> {
    let service = QualityScoringService::new(state.db.clone());
    let score = service
        .calculate_entity_quality_score(
            &entity_type,
            query.run_id,
            query.days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            query.include_details.unwrap_or(false),
        )
        .await?;
    Ok(Json(score))
}

/// GET /api/v1/quality/entities/{entity_type}/dimensions/{validation_type}/breakdown
#[utoipa::path(
    get,
    path = "/entities/{entity_type}/dimensions/{validation_type}/breakdown",
    context_path = "/api/v1/quality",
    tag = "quality",
    params(
        ("entity_type" = String, Path, description = "Entity type"),
        ("validation_type" = String, Path, description = "Validation dimension"),
        BreakdownQuery,
    ),
    responses(
        (status = 200, description = "Diagnostic scoring breakdown for one dimension", body = ScoreBreakdown),
    )
)]
pub async fn get_dimension_breakdown(
    State(state): State<SharedState>,
    Path((entity_type, validation_type)): Path<(String, String)>,
    Query(query): Query<BreakdownQuery>,
) -> Result<Json<ScoreBreakdown>> {
    let service = QualityScoringService::new(state.db.clone());
    let breakdown = service
        .dimension_breakdown(
            &entity_type,
            &validation_type,
            query.days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
        )
        .await?;
    Ok(Json(breakdown))
}

/// GET /api/v1/quality/report
#[utoipa::path(
    get,
    path = "/report",
    context_path = "/api/v1/quality",
    tag = "quality",
    params(ReportQuery),
    responses(
        (status = 200, description = "Comprehensive cross-entity quality report", body = crate::services::quality_scoring_service::QualityReport),
    )
)]
pub async fn get_quality_report(
    State(state): State<SharedState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<crate::services::quality_scoring_service::QualityReport>> {
    let service = QualityScoringService::new(state.db.clone());
    let report = service
        .calculate_comprehensive_quality_report(
            query.parse_entity_types(),
            query.days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            query.include_trends.unwrap_or(true),
        )
        .await?;
    Ok(Json(report))
}

#[derive(OpenApi)]
#[openapi(
    paths(get_entity_score, get_dimension_breakdown, get_quality_report),
    components(schemas(
        EntityScoreQuery,
        ReportQuery,
        BreakdownQuery,
        crate::services::quality_scoring_service::EntityQualityScore,
        crate::services::quality_scoring_service::QualityReport,
        ScoreBreakdown,
    ))
)]
pub struct QualityApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_types_comma_separated() {
        let query = ReportQuery {
            entity_types: Some("volunteer, organization ,event".to_string()),
            days: None,
            include_trends: None,
        };
        assert_eq!(
            query.parse_entity_types(),
            Some(vec![
                "volunteer".to_string(),
                "organization".to_string(),
                "event".to_string()
            ])
        );
    }

    #[test]
    fn test_parse_entity_types_none_when_absent() {
        let query = ReportQuery {
            entity_types: None,
            days: None,
            include_trends: None,
        };
        assert!(query.parse_entity_types().is_none());
    }

    #[test]
    fn test_parse_entity_types_empty_string_is_none() {
        let query = ReportQuery {
            entity_types: Some(" , ,".to_string()),
            days: None,
            include_trends: None,
        };
        assert!(query.parse_entity_types().is_none());
    }

    #[test]
    fn test_entity_score_query_deserialize() {
        let json = r#"{"days": 14, "include_details": true}"#;
        let q: EntityScoreQuery = serde_json::from_str(json).unwrap();
        assert_eq!(q.days, Some(14));
        assert_eq!(q.include_details, Some(true));
        assert!(q.run_id.is_none());
    }
}
