//! Validation history creation, queries, and retention.
//!
//! Derives durable `validation_history` rows from a completed run's raw
//! results and metrics. All rows for one run insert in a single transaction;
//! any failure rolls the whole batch back.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::validation_history::{classify_trend, TrendDirection, ValidationHistory};
use crate::models::validation_metric::ValidationMetric;
use crate::models::validation_result::{Severity, ValidationResult};
use crate::models::validation_run::ValidationRun;
use crate::services::data_aggregation_service::{zscore_outlier_indices, ANOMALY_Z_THRESHOLD};
use crate::services::metrics_service;
use crate::services::score_calculator::{ScoreAlgorithm, ScoreCalculator};
use crate::services::scoring_config::ScoringConfig;
use crate::services::threshold_manager::ThresholdManager;

/// Prior records consulted for the creation-time trend.
const TREND_PRIOR_RECORDS: i64 = 5;

/// Minimum prior records before a trend direction is recorded.
const TREND_MIN_PRIORS: usize = 2;

/// Minimum series length before the anomaly flagging job considers a group.
const ANOMALY_MIN_SERIES: usize = 5;

/// Named run metrics copied onto history rows.
const METRIC_FIELD_COMPLETENESS: &str = "field_completeness";
const METRIC_DATA_TYPE_ACCURACY: &str = "data_type_accuracy";
const METRIC_RELATIONSHIP_INTEGRITY: &str = "relationship_integrity";
const METRIC_BUSINESS_RULE_COMPLIANCE: &str = "business_rule_compliance";

/// Computed column values for one history row, before insertion.
#[derive(Debug, Clone)]
pub struct HistoryRowDraft {
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
    pub field_completeness: Option<f64>,
    pub data_type_accuracy: Option<f64>,
    pub relationship_integrity: Option<f64>,
    pub business_rule_compliance: Option<f64>,
    pub quality_threshold: f64,
    pub trend_direction: Option<TrendDirection>,
    pub trend_magnitude: Option<f64>,
    pub trend_confidence: Option<f64>,
}

/// Daily average quality score for one (entity_type, validation_type).
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct QualityTrendPoint {
    pub entity_type: String,
    pub validation_type: String,
    pub date: NaiveDate,
    pub average_score: f64,
    pub records: i64,
}

/// Per-entity-type slice of the summary statistics.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct EntityHistoryCount {
    pub entity_type: String,
    pub records: i64,
    pub average_quality_score: Option<f64>,
}

/// Aggregate statistics over the history table for a day window.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistorySummaryStatistics {
    pub period_days: i32,
    pub total_records: i64,
    pub average_quality_score: Option<f64>,
    pub min_quality_score: Option<f64>,
    pub max_quality_score: Option<f64>,
    pub anomaly_count: i64,
    pub entity_breakdown: Vec<EntityHistoryCount>,
}

pub struct ValidationHistoryService {
    db: PgPool,
    thresholds: ThresholdManager,
    calculator: ScoreCalculator,
}

impl ValidationHistoryService {
    pub fn new(db: PgPool) -> Self {
        Self::with_config(db, &ScoringConfig::default())
    }

    pub fn with_config(db: PgPool, config: &ScoringConfig) -> Self {
        Self {
            db,
            thresholds: ThresholdManager::new(config),
            calculator: ScoreCalculator::new(config),
        }
    }

    /// Create history rows for one run: one per (entity_type,
    /// validation_type) pair present in the run's results. When
    /// `entity_type` is given, only that entity's pairs are created.
    ///
    /// The whole batch inserts in one transaction.
    pub async fn create_history_from_run(
        &self,
        run_id: Uuid,
        entity_type: Option<&str>,
    ) -> Result<Vec<ValidationHistory>> {
        let run = sqlx::query_as::<_, ValidationRun>(
            r#"
            SELECT id, status, started_at, completed_at, execution_time_seconds,
                   memory_usage_mb, cpu_usage_percent, total_checks, created_at
            FROM validation_runs
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Validation run {run_id} not found")))?;

        let results = sqlx::query_as::<_, ValidationResult>(
            r#"
            SELECT id, run_id, entity_type, validation_type, field_name,
                   severity, violation_subtype, message,
                   expected_value, actual_value, created_at
            FROM validation_results
            WHERE run_id = $1 AND ($2::TEXT IS NULL OR entity_type = $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(run_id)
        .bind(entity_type)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if results.is_empty() {
            tracing::info!(run_id = %run_id, "Run has no results, no history created");
            return Ok(Vec::new());
        }

        let metrics = sqlx::query_as::<_, ValidationMetric>(
            r#"
            SELECT id, run_id, metric_name, metric_value, metric_category,
                   metric_unit, entity_type, timestamp
            FROM validation_metrics
            WHERE run_id = $1
            ORDER BY timestamp ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let mut groups: BTreeMap<(String, String), Vec<ValidationResult>> = BTreeMap::new();
        for result in results {
            groups
                .entry((result.entity_type.clone(), result.validation_type.clone()))
                .or_default()
                .push(result);
        }

        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut created = Vec::with_capacity(groups.len());

        for ((entity, validation_type), group) in &groups {
            let metric_values = extract_metric_values(&metrics, entity);
            let threshold = self
                .thresholds
                .validation_type_threshold(entity, validation_type);

            let mut prior_scores: Vec<f64> = sqlx::query_scalar(
                r#"
                SELECT quality_score
                FROM validation_history
                WHERE entity_type = $1 AND validation_type = $2
                ORDER BY created_at DESC
                LIMIT $3
                "#,
            )
            .bind(entity)
            .bind(validation_type)
            .bind(TREND_PRIOR_RECORDS)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
            prior_scores.reverse();

            let draft = assemble_history_row(
                &self.calculator,
                entity,
                validation_type,
                group,
                &metric_values,
                &prior_scores,
                threshold,
            );

            let row = sqlx::query_as::<_, ValidationHistory>(
                r#"
                INSERT INTO validation_history (
                    run_id, entity_type, validation_type, quality_score,
                    total_checks, passed_checks, failed_checks, success_rate,
                    critical_violations, error_violations, warning_violations,
                    info_violations, total_violations,
                    execution_time_seconds, memory_usage_mb, cpu_usage_percent,
                    field_completeness, data_type_accuracy,
                    relationship_integrity, business_rule_compliance,
                    quality_threshold, trend_direction, trend_magnitude,
                    trend_confidence
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
                )
                RETURNING id, run_id, entity_type, validation_type, quality_score,
                          total_checks, passed_checks, failed_checks, success_rate,
                          critical_violations, error_violations, warning_violations,
                          info_violations, total_violations,
                          execution_time_seconds, memory_usage_mb, cpu_usage_percent,
                          field_completeness, data_type_accuracy,
                          relationship_integrity, business_rule_compliance,
                          quality_threshold, trend_direction, trend_magnitude,
                          trend_confidence, is_anomaly, created_at
                "#,
            )
            .bind(run.id)
            .bind(&draft.entity_type)
            .bind(&draft.validation_type)
            .bind(draft.quality_score)
            .bind(draft.total_checks)
            .bind(draft.passed_checks)
            .bind(draft.failed_checks)
            .bind(draft.success_rate)
            .bind(draft.critical_violations)
            .bind(draft.error_violations)
            .bind(draft.warning_violations)
            .bind(draft.info_violations)
            .bind(draft.total_violations)
            .bind(run.execution_time_seconds)
            .bind(run.memory_usage_mb)
            .bind(run.cpu_usage_percent)
            .bind(draft.field_completeness)
            .bind(draft.data_type_accuracy)
            .bind(draft.relationship_integrity)
            .bind(draft.business_rule_compliance)
            .bind(draft.quality_threshold)
            .bind(draft.trend_direction)
            .bind(draft.trend_magnitude)
            .bind(draft.trend_confidence)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            created.push(row);
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        metrics_service::record_history_rows_created(created.len() as u64);
        tracing::info!(
            run_id = %run_id,
            rows = created.len(),
            "Validation history created"
        );

        Ok(created)
    }

    /// Create history for every completed run in the window that has none
    /// yet. Idempotent; per-run failures log and continue. Returns the
    /// number of history rows created.
    pub async fn populate_history_from_recent_runs(&self, days: i32) -> Result<u64> {
        let run_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT r.id
            FROM validation_runs r
            WHERE r.status = 'completed'
              AND r.completed_at >= NOW() - make_interval(days => $1)
              AND NOT EXISTS (
                  SELECT 1 FROM validation_history h WHERE h.run_id = r.id
              )
            ORDER BY r.completed_at ASC
            "#,
        )
        .bind(days)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let mut created: u64 = 0;
        for run_id in run_ids {
            match self.create_history_from_run(run_id, None).await {
                Ok(rows) => created += rows.len() as u64,
                Err(e) => {
                    tracing::warn!(run_id = %run_id, error = %e, "History creation failed for run");
                }
            }
        }

        Ok(created)
    }

    /// Recent history for an entity type, newest first.
    pub async fn get_entity_history(
        &self,
        entity_type: &str,
        validation_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ValidationHistory>> {
        sqlx::query_as::<_, ValidationHistory>(
            r#"
            SELECT id, run_id, entity_type, validation_type, quality_score,
                   total_checks, passed_checks, failed_checks, success_rate,
                   critical_violations, error_violations, warning_violations,
                   info_violations, total_violations,
                   execution_time_seconds, memory_usage_mb, cpu_usage_percent,
                   field_completeness, data_type_accuracy,
                   relationship_integrity, business_rule_compliance,
                   quality_threshold, trend_direction, trend_magnitude,
                   trend_confidence, is_anomaly, created_at
            FROM validation_history
            WHERE entity_type = $1
              AND ($2::TEXT IS NULL OR validation_type = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(entity_type)
        .bind(validation_type)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Daily average quality score per (entity_type, validation_type).
    pub async fn get_quality_trends(
        &self,
        entity_type: Option<&str>,
        days: i32,
    ) -> Result<Vec<QualityTrendPoint>> {
        sqlx::query_as::<_, QualityTrendPoint>(
            r#"
            SELECT entity_type, validation_type,
                   created_at::DATE as date,
                   AVG(quality_score) as average_score,
                   COUNT(*) as records
            FROM validation_history
            WHERE created_at >= NOW() - make_interval(days => $2)
              AND ($1::TEXT IS NULL OR entity_type = $1)
            GROUP BY entity_type, validation_type, created_at::DATE
            ORDER BY entity_type, validation_type, date ASC
            "#,
        )
        .bind(entity_type)
        .bind(days)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// History records flagged as anomalies, newest first.
    pub async fn get_anomalies(
        &self,
        entity_type: Option<&str>,
        days: i32,
        limit: i64,
    ) -> Result<Vec<ValidationHistory>> {
        sqlx::query_as::<_, ValidationHistory>(
            r#"
            SELECT id, run_id, entity_type, validation_type, quality_score,
                   total_checks, passed_checks, failed_checks, success_rate,
                   critical_violations, error_violations, warning_violations,
                   info_violations, total_violations,
                   execution_time_seconds, memory_usage_mb, cpu_usage_percent,
                   field_completeness, data_type_accuracy,
                   relationship_integrity, business_rule_compliance,
                   quality_threshold, trend_direction, trend_magnitude,
                   trend_confidence, is_anomaly, created_at
            FROM validation_history
            WHERE is_anomaly = true
              AND created_at >= NOW() - make_interval(days => $2)
              AND ($1::TEXT IS NULL OR entity_type = $1)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(entity_type)
        .bind(days)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Aggregate statistics for a day window.
    pub async fn get_summary_statistics(&self, days: i32) -> Result<HistorySummaryStatistics> {
        #[derive(sqlx::FromRow)]
        struct SummaryRow {
            total_records: i64,
            average_quality_score: Option<f64>,
            min_quality_score: Option<f64>,
            max_quality_score: Option<f64>,
            anomaly_count: i64,
        }

        let summary = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT COUNT(*) as total_records,
                   AVG(quality_score) as average_quality_score,
                   MIN(quality_score) as min_quality_score,
                   MAX(quality_score) as max_quality_score,
                   (COUNT(*) FILTER (WHERE is_anomaly)) as anomaly_count
            FROM validation_history
            WHERE created_at >= NOW() - make_interval(days => $1)
            "#,
        )
        .bind(days)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let entity_breakdown = sqlx::query_as::<_, EntityHistoryCount>(
            r#"
            SELECT entity_type,
                   COUNT(*) as records,
                   AVG(quality_score) as average_quality_score
            FROM validation_history
            WHERE created_at >= NOW() - make_interval(days => $1)
            GROUP BY entity_type
            ORDER BY entity_type
            "#,
        )
        .bind(days)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(HistorySummaryStatistics {
            period_days: days,
            total_records: summary.total_records,
            average_quality_score: summary.average_quality_score,
            min_quality_score: summary.min_quality_score,
            max_quality_score: summary.max_quality_score,
            anomaly_count: summary.anomaly_count,
            entity_breakdown,
        })
    }

    /// Externally set the anomaly flag on one record.
    pub async fn set_anomaly_flag(&self, id: Uuid, is_anomaly: bool) -> Result<()> {
        let rows_affected = sqlx::query(
            "UPDATE validation_history SET is_anomaly = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(is_anomaly)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "Validation history record {id} not found"
            )));
        }
        Ok(())
    }

    /// Flag statistical outliers in each (entity_type, validation_type)
    /// quality-score series within the window. Returns rows flagged.
    pub async fn flag_quality_anomalies(&self, days: i32) -> Result<u64> {
        #[derive(sqlx::FromRow)]
        struct ScoreRow {
            id: Uuid,
            entity_type: String,
            validation_type: String,
            quality_score: f64,
        }

        let rows = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT id, entity_type, validation_type, quality_score
            FROM validation_history
            WHERE created_at >= NOW() - make_interval(days => $1)
            ORDER BY entity_type, validation_type, created_at ASC
            "#,
        )
        .bind(days)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let mut groups: BTreeMap<(String, String), Vec<(Uuid, f64)>> = BTreeMap::new();
        for row in rows {
            groups
                .entry((row.entity_type, row.validation_type))
                .or_default()
                .push((row.id, row.quality_score));
        }

        let mut anomaly_ids: Vec<Uuid> = Vec::new();
        for series in groups.values() {
            if series.len() < ANOMALY_MIN_SERIES {
                continue;
            }
            let values: Vec<f64> = series.iter().map(|(_, score)| *score).collect();
            for index in zscore_outlier_indices(&values, ANOMALY_Z_THRESHOLD) {
                anomaly_ids.push(series[index].0);
            }
        }

        if anomaly_ids.is_empty() {
            return Ok(0);
        }

        let flagged = sqlx::query(
            "UPDATE validation_history SET is_anomaly = true WHERE id = ANY($1)",
        )
        .bind(&anomaly_ids)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .rows_affected();

        tracing::info!(flagged = flagged, "Quality anomalies flagged");
        Ok(flagged)
    }

    /// Delete history older than the retention window. Returns rows removed.
    pub async fn cleanup_old_records(&self, retention_days: i32) -> Result<u64> {
        let removed = sqlx::query(
            "DELETE FROM validation_history WHERE created_at < NOW() - make_interval(days => $1)",
        )
        .bind(retention_days)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .rows_affected();

        metrics_service::record_cleanup("validation_history", removed);
        tracing::info!(
            removed = removed,
            retention_days = retention_days,
            "Validation history cleanup complete"
        );
        Ok(removed)
    }
}

/// A result counts as a violation when it failed outright, when it is a
/// warning, or when an info-level result carries a violation subtype.
fn is_violation(result: &ValidationResult) -> bool {
    match result.severity {
        Severity::Warning | Severity::Error | Severity::Critical => true,
        Severity::Info => result.violation_subtype.is_some(),
    }
}

/// Latest value per named metric for one entity (entity-scoped metrics win
/// over unscoped ones only by coming later in the run).
fn extract_metric_values(metrics: &[ValidationMetric], entity_type: &str) -> HashMap<String, f64> {
    let mut values = HashMap::new();
    for metric in metrics {
        let applies = match metric.entity_type.as_deref() {
            Some(scoped) => scoped == entity_type,
            None => true,
        };
        if applies {
            values.insert(metric.metric_name.clone(), metric.metric_value);
        }
    }
    values
}

/// Compute the column values for one (entity_type, validation_type) history
/// row. `prior_scores` must be in chronological order.
pub fn assemble_history_row(
    calculator: &ScoreCalculator,
    entity_type: &str,
    validation_type: &str,
    results: &[ValidationResult],
    metric_values: &HashMap<String, f64>,
    prior_scores: &[f64],
    quality_threshold: f64,
) -> HistoryRowDraft {
    let count = |severity: Severity| {
        results
            .iter()
            .filter(|r| r.severity == severity && is_violation(r))
            .count() as i32
    };

    let critical_violations = count(Severity::Critical);
    let error_violations = count(Severity::Error);
    let warning_violations = count(Severity::Warning);
    let info_violations = count(Severity::Info);
    let total_violations =
        critical_violations + error_violations + warning_violations + info_violations;

    let total_checks = results.len() as i32;
    let passed_checks = results.iter().filter(|r| r.severity.is_passing()).count() as i32;
    let failed_checks = total_checks - passed_checks;
    let success_rate = if total_checks > 0 {
        passed_checks as f64 / total_checks as f64 * 100.0
    } else {
        0.0
    };

    let (quality_score, _) = calculator.score(ScoreAlgorithm::LinearPenalty, results);

    let (trend_direction, trend_magnitude, trend_confidence) =
        if prior_scores.len() >= TREND_MIN_PRIORS {
            let mut series = prior_scores.to_vec();
            series.push(quality_score);
            let classification = classify_trend(&series);
            (
                Some(classification.direction),
                Some(classification.slope.abs().min(100.0)),
                Some((prior_scores.len() as f64 / 10.0).min(1.0)),
            )
        } else {
            (None, None, None)
        };

    HistoryRowDraft {
        entity_type: entity_type.to_string(),
        validation_type: validation_type.to_string(),
        quality_score,
        total_checks,
        passed_checks,
        failed_checks,
        success_rate,
        critical_violations,
        error_violations,
        warning_violations,
        info_violations,
        total_violations,
        field_completeness: metric_values.get(METRIC_FIELD_COMPLETENESS).copied(),
        data_type_accuracy: metric_values.get(METRIC_DATA_TYPE_ACCURACY).copied(),
        relationship_integrity: metric_values.get(METRIC_RELATIONSHIP_INTEGRITY).copied(),
        business_rule_compliance: metric_values.get(METRIC_BUSINESS_RULE_COMPLIANCE).copied(),
        quality_threshold,
        trend_direction,
        trend_magnitude,
        trend_confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(severity: Severity) -> ValidationResult {
        ValidationResult {
            id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            entity_type: "volunteer".to_string(),
            validation_type: "field_completeness".to_string(),
            field_name: None,
            severity,
            violation_subtype: None,
            message: None,
            expected_value: None,
            actual_value: None,
            created_at: Utc::now(),
        }
    }

    fn metric(name: &str, value: f64, entity_type: Option<&str>) -> ValidationMetric {
        ValidationMetric {
            id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            metric_name: name.to_string(),
            metric_value: value,
            metric_category: None,
            metric_unit: Some("percent".to_string()),
            entity_type: entity_type.map(|s| s.to_string()),
            timestamp: Utc::now(),
        }
    }

    // ── assemble_history_row ─────────────────────────────────────────

    #[test]
    fn test_twenty_results_sixteen_info_four_error() {
        let calculator = ScoreCalculator::default();
        let mut results: Vec<ValidationResult> =
            (0..16).map(|_| result(Severity::Info)).collect();
        results.extend((0..4).map(|_| result(Severity::Error)));

        let draft = assemble_history_row(
            &calculator,
            "volunteer",
            "field_completeness",
            &results,
            &HashMap::new(),
            &[],
            75.0,
        );

        assert_eq!(draft.total_checks, 20);
        assert_eq!(draft.passed_checks, 16);
        assert_eq!(draft.failed_checks, 4);
        assert_eq!(draft.total_violations, 4);
        assert_eq!(draft.error_violations, 4);
        assert_eq!(draft.info_violations, 0);
        assert!((draft.success_rate - 80.0).abs() < 1e-9);
        // 100 − 5×4
        assert!((draft.quality_score - 80.0).abs() < 1e-9);
        assert!(draft.trend_direction.is_none());
    }

    #[test]
    fn test_violation_count_identity() {
        let calculator = ScoreCalculator::default();
        let results = vec![
            result(Severity::Critical),
            result(Severity::Error),
            result(Severity::Warning),
            result(Severity::Info),
        ];

        let draft = assemble_history_row(
            &calculator,
            "volunteer",
            "field_completeness",
            &results,
            &HashMap::new(),
            &[],
            75.0,
        );

        assert_eq!(
            draft.total_violations,
            draft.critical_violations
                + draft.error_violations
                + draft.warning_violations
                + draft.info_violations
        );
        assert_eq!(draft.critical_violations, 1);
        assert_eq!(draft.warning_violations, 1);
        // plain info results are not violations
        assert_eq!(draft.info_violations, 0);
        // warnings pass but still count as violations
        assert_eq!(draft.passed_checks, 2);
    }

    #[test]
    fn test_quality_score_floor() {
        let calculator = ScoreCalculator::default();
        let results: Vec<ValidationResult> =
            (0..20).map(|_| result(Severity::Critical)).collect();

        let draft = assemble_history_row(
            &calculator,
            "volunteer",
            "field_completeness",
            &results,
            &HashMap::new(),
            &[],
            75.0,
        );
        assert_eq!(draft.quality_score, 0.0);
        assert!((0.0..=100.0).contains(&draft.quality_score));
    }

    #[test]
    fn test_trend_needs_two_priors() {
        let calculator = ScoreCalculator::default();
        let results = vec![result(Severity::Info)];

        let one_prior = assemble_history_row(
            &calculator,
            "volunteer",
            "field_completeness",
            &results,
            &HashMap::new(),
            &[80.0],
            75.0,
        );
        assert!(one_prior.trend_direction.is_none());

        let two_priors = assemble_history_row(
            &calculator,
            "volunteer",
            "field_completeness",
            &results,
            &HashMap::new(),
            &[80.0, 85.0],
            75.0,
        );
        // series [80, 85, 100]: slope (100−80)/3 ≈ 6.67 → improving
        assert_eq!(two_priors.trend_direction, Some(TrendDirection::Improving));
        assert_eq!(two_priors.trend_confidence, Some(0.2));
        assert!(two_priors.trend_magnitude.unwrap() <= 100.0);
    }

    #[test]
    fn test_trend_stable_within_dead_band() {
        let calculator = ScoreCalculator::default();
        // 16 info + 4 error scores 80.0
        let mut results: Vec<ValidationResult> =
            (0..16).map(|_| result(Severity::Info)).collect();
        results.extend((0..4).map(|_| result(Severity::Error)));

        let draft = assemble_history_row(
            &calculator,
            "volunteer",
            "field_completeness",
            &results,
            &HashMap::new(),
            &[80.1, 79.9],
            75.0,
        );
        assert_eq!(draft.trend_direction, Some(TrendDirection::Stable));
    }

    // ── metric extraction ────────────────────────────────────────────

    #[test]
    fn test_metric_extraction_scoped_to_entity() {
        let metrics = vec![
            metric("field_completeness", 92.5, Some("volunteer")),
            metric("field_completeness", 40.0, Some("event")),
            metric("data_type_accuracy", 88.0, None),
        ];

        let values = extract_metric_values(&metrics, "volunteer");
        assert_eq!(values.get("field_completeness"), Some(&92.5));
        assert_eq!(values.get("data_type_accuracy"), Some(&88.0));
        assert!(values.get("relationship_integrity").is_none());
    }

    #[test]
    fn test_metric_values_land_on_draft() {
        let calculator = ScoreCalculator::default();
        let results = vec![result(Severity::Info)];
        let values: HashMap<String, f64> = [
            ("field_completeness".to_string(), 95.0),
            ("business_rule_compliance".to_string(), 70.0),
        ]
        .into_iter()
        .collect();

        let draft = assemble_history_row(
            &calculator,
            "volunteer",
            "field_completeness",
            &results,
            &values,
            &[],
            75.0,
        );
        assert_eq!(draft.field_completeness, Some(95.0));
        assert_eq!(draft.business_rule_compliance, Some(70.0));
        assert!(draft.data_type_accuracy.is_none());
    }
}
