//! Quality scoring orchestration.
//!
//! Pulls validation results for an entity type (one run or a day window),
//! scores each dimension, combines them into one weighted composite score,
//! classifies the result, and attaches trend context from history. Also
//! produces the cross-entity comprehensive report with per-entity failure
//! isolation.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::validation_history::{classify_trend, TrendDirection};
use crate::models::validation_result::ValidationResult;
use crate::services::metrics_service;
use crate::services::score_calculator::{ScoreBreakdown, ScoreCalculator};
use crate::services::score_weighting::ScoreWeightingEngine;
use crate::services::scoring_config::{ScoringConfig, DEFAULT_ENTITY_TYPES};
use crate::services::threshold_manager::{QualityTier, ThresholdManager};

/// History records consulted for the trend block.
const TREND_LOOKBACK_RECORDS: i64 = 10;

/// Scores below this are improvement opportunities; below the floor they are
/// high priority.
const OPPORTUNITY_THRESHOLD: f64 = 80.0;
const HIGH_PRIORITY_THRESHOLD: f64 = 60.0;

const TOP_PERFORMER_COUNT: usize = 3;

/// Sentinel message for an empty result set (not an error).
const NO_RESULTS_MESSAGE: &str = "No validation results found";

/// Quality score for one entity type.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EntityQualityScore {
    pub entity_type: String,
    pub quality_score: f64,
    pub quality_status: QualityTier,
    pub threshold: f64,
    pub total_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_scores: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<QualityTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Trend context derived from recent history records.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QualityTrend {
    pub direction: TrendDirection,
    /// Average per-record score change over the window.
    pub change: f64,
    pub data_points: usize,
}

/// One entity's slot in the comprehensive report: either a score or the
/// error that prevented one. A failure scoring one entity type never aborts
/// the rest of the report.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum EntityScoreEntry {
    Scored(EntityQualityScore),
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TopPerformer {
    pub entity_type: String,
    pub quality_score: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImprovementOpportunity {
    pub entity_type: String,
    pub quality_score: f64,
    pub priority: String,
}

/// Aggregate statistics over the successfully scored entities.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverallSummary {
    pub average_quality_score: f64,
    pub quality_distribution: BTreeMap<String, usize>,
    pub top_performers: Vec<TopPerformer>,
    pub improvement_opportunities: Vec<ImprovementOpportunity>,
    pub entities_scored: usize,
    pub entities_failed: usize,
}

/// Cross-entity quality report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QualityReport {
    pub generated_at: DateTime<Utc>,
    pub period_days: i32,
    pub entity_scores: BTreeMap<String, EntityScoreEntry>,
    pub overall_summary: OverallSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trends: Option<BTreeMap<String, QualityTrend>>,
}

pub struct QualityScoringService {
    db: PgPool,
    weighting: ScoreWeightingEngine,
    thresholds: ThresholdManager,
    calculator: ScoreCalculator,
}

impl QualityScoringService {
    pub fn new(db: PgPool) -> Self {
        Self::with_config(db, &ScoringConfig::default())
    }

    pub fn with_config(db: PgPool, config: &ScoringConfig) -> Self {
        Self {
            db,
            weighting: ScoreWeightingEngine::new(config),
            thresholds: ThresholdManager::new(config),
            calculator: ScoreCalculator::new(config),
        }
    }

    /// Compute the composite quality score for one entity type, either for a
    /// specific run or across completed runs within the day window. An empty
    /// result set yields a zero score with a message, not an error.
    pub async fn calculate_entity_quality_score(
        &self,
        entity_type: &str,
        run_id: Option<Uuid>,
        days: i32,
        include_details: bool,
    ) -> Result<EntityQualityScore> {
        let started = std::time::Instant::now();
        let results = self.fetch_results(entity_type, run_id, days).await?;

        let mut score = compute_entity_score(
            &self.calculator,
            &self.weighting,
            &self.thresholds,
            entity_type,
            &results,
            include_details,
        );

        // A run-scoped score is a point-in-time view; only windowed scores
        // carry trend context.
        if run_id.is_none() && !results.is_empty() {
            score.trend = Some(self.entity_trend(entity_type).await?);
        }

        metrics_service::record_scoring_run(
            entity_type,
            score.quality_score,
            started.elapsed().as_secs_f64(),
        );
        tracing::debug!(
            entity_type = entity_type,
            quality_score = score.quality_score,
            total_checks = score.total_checks,
            "Entity quality score computed"
        );

        Ok(score)
    }

    /// Diagnostic scoring breakdown for one (entity_type, validation_type)
    /// dimension over the day window.
    pub async fn dimension_breakdown(
        &self,
        entity_type: &str,
        validation_type: &str,
        days: i32,
    ) -> Result<ScoreBreakdown> {
        let results = self.fetch_results(entity_type, None, days).await?;
        let dimension: Vec<ValidationResult> = results
            .into_iter()
            .filter(|r| r.validation_type == validation_type)
            .collect();
        Ok(self.calculator.score_breakdown(validation_type, &dimension))
    }

    /// Score every requested entity type (default: all standard entities) and
    /// aggregate the results. Failures are isolated per entity.
    pub async fn calculate_comprehensive_quality_report(
        &self,
        entity_types: Option<Vec<String>>,
        days: i32,
        include_trends: bool,
    ) -> Result<QualityReport> {
        let entity_types = entity_types.unwrap_or_else(|| {
            DEFAULT_ENTITY_TYPES.iter().map(|s| s.to_string()).collect()
        });

        let mut entity_scores = BTreeMap::new();
        let mut trends = BTreeMap::new();

        for entity_type in &entity_types {
            match self
                .calculate_entity_quality_score(entity_type, None, days, true)
                .await
            {
                Ok(score) => {
                    if include_trends {
                        if let Some(trend) = &score.trend {
                            trends.insert(entity_type.clone(), trend.clone());
                        }
                    }
                    entity_scores.insert(entity_type.clone(), EntityScoreEntry::Scored(score));
                }
                Err(e) => {
                    tracing::warn!(
                        entity_type = entity_type,
                        error = %e,
                        "Entity scoring failed, isolating in report"
                    );
                    entity_scores.insert(
                        entity_type.clone(),
                        EntityScoreEntry::Failed {
                            error: e.to_string(),
                        },
                    );
                }
            }
        }

        let overall_summary = build_overall_summary(&entity_scores);

        Ok(QualityReport {
            generated_at: Utc::now(),
            period_days: days,
            entity_scores,
            overall_summary,
            trends: include_trends.then_some(trends),
        })
    }

    async fn fetch_results(
        &self,
        entity_type: &str,
        run_id: Option<Uuid>,
        days: i32,
    ) -> Result<Vec<ValidationResult>> {
        let results = match run_id {
            Some(run_id) => {
                sqlx::query_as::<_, ValidationResult>(
                    r#"
                    SELECT id, run_id, entity_type, validation_type, field_name,
                           severity, violation_subtype, message,
                           expected_value, actual_value, created_at
                    FROM validation_results
                    WHERE run_id = $1 AND entity_type = $2
                    ORDER BY created_at ASC
                    "#,
                )
                .bind(run_id)
                .bind(entity_type)
                .fetch_all(&self.db)
                .await
            }
            None => {
                sqlx::query_as::<_, ValidationResult>(
                    r#"
                    SELECT vr.id, vr.run_id, vr.entity_type, vr.validation_type,
                           vr.field_name, vr.severity, vr.violation_subtype,
                           vr.message, vr.expected_value, vr.actual_value, vr.created_at
                    FROM validation_results vr
                    JOIN validation_runs r ON r.id = vr.run_id
                    WHERE vr.entity_type = $1
                      AND r.status = 'completed'
                      AND r.completed_at >= NOW() - make_interval(days => $2)
                    ORDER BY vr.created_at ASC
                    "#,
                )
                .bind(entity_type)
                .bind(days)
                .fetch_all(&self.db)
                .await
            }
        };

        results.map_err(|e| AppError::Database(e.to_string()))
    }

    async fn entity_trend(&self, entity_type: &str) -> Result<QualityTrend> {
        let mut scores: Vec<f64> = sqlx::query_scalar(
            r#"
            SELECT quality_score
            FROM validation_history
            WHERE entity_type = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(entity_type)
        .bind(TREND_LOOKBACK_RECORDS)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        scores.reverse();
        let classification = classify_trend(&scores);

        Ok(QualityTrend {
            direction: classification.direction,
            change: classification.slope,
            data_points: scores.len(),
        })
    }
}

/// Score one entity's results without touching the database.
pub fn compute_entity_score(
    calculator: &ScoreCalculator,
    weighting: &ScoreWeightingEngine,
    thresholds: &ThresholdManager,
    entity_type: &str,
    results: &[ValidationResult],
    include_details: bool,
) -> EntityQualityScore {
    let threshold = thresholds.entity_threshold(entity_type);

    if results.is_empty() {
        return EntityQualityScore {
            entity_type: entity_type.to_string(),
            quality_score: 0.0,
            quality_status: QualityTier::from_score(0.0),
            threshold,
            total_checks: 0,
            passed_checks: 0,
            failed_checks: 0,
            dimension_scores: None,
            trend: None,
            message: Some(NO_RESULTS_MESSAGE.to_string()),
        };
    }

    let mut by_dimension: BTreeMap<String, Vec<ValidationResult>> = BTreeMap::new();
    for result in results {
        by_dimension
            .entry(result.validation_type.clone())
            .or_default()
            .push(result.clone());
    }

    let mut dimension_scores: HashMap<String, f64> = HashMap::new();
    for (validation_type, dimension_results) in &by_dimension {
        dimension_scores.insert(
            validation_type.clone(),
            calculator.dimension_score(validation_type, dimension_results),
        );
    }

    let quality_score = weighting.weighted_score(&dimension_scores, entity_type, None);
    let passed_checks = results.iter().filter(|r| r.severity.is_passing()).count();

    EntityQualityScore {
        entity_type: entity_type.to_string(),
        quality_score,
        quality_status: QualityTier::from_score(quality_score),
        threshold,
        total_checks: results.len(),
        passed_checks,
        failed_checks: results.len() - passed_checks,
        dimension_scores: include_details
            .then(|| dimension_scores.into_iter().collect::<BTreeMap<_, _>>()),
        trend: None,
        message: None,
    }
}

/// Aggregate the successfully scored entries; failed entries only count
/// toward `entities_failed`.
pub fn build_overall_summary(
    entity_scores: &BTreeMap<String, EntityScoreEntry>,
) -> OverallSummary {
    let mut scored: Vec<(&str, f64)> = Vec::new();
    let mut quality_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut entities_failed = 0;

    for (entity_type, entry) in entity_scores {
        match entry {
            EntityScoreEntry::Scored(score) => {
                scored.push((entity_type, score.quality_score));
                *quality_distribution
                    .entry(score.quality_status.as_str().to_string())
                    .or_insert(0) += 1;
            }
            EntityScoreEntry::Failed { .. } => entities_failed += 1,
        }
    }

    let average_quality_score = if scored.is_empty() {
        0.0
    } else {
        scored.iter().map(|(_, s)| s).sum::<f64>() / scored.len() as f64
    };

    let mut ranked = scored.clone();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let top_performers = ranked
        .iter()
        .take(TOP_PERFORMER_COUNT)
        .map(|(entity_type, quality_score)| TopPerformer {
            entity_type: entity_type.to_string(),
            quality_score: *quality_score,
        })
        .collect();

    let improvement_opportunities = ranked
        .iter()
        .rev()
        .filter(|(_, score)| *score < OPPORTUNITY_THRESHOLD)
        .map(|(entity_type, quality_score)| ImprovementOpportunity {
            entity_type: entity_type.to_string(),
            quality_score: *quality_score,
            priority: if *quality_score < HIGH_PRIORITY_THRESHOLD {
                "high".to_string()
            } else {
                "medium".to_string()
            },
        })
        .collect();

    OverallSummary {
        average_quality_score,
        quality_distribution,
        top_performers,
        improvement_opportunities,
        entities_scored: scored.len(),
        entities_failed,
    }
}
