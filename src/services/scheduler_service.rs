//! Background task scheduler.
//!
//! Runs periodic tasks: history population from completed runs, retention
//! cleanup, anomaly flagging, and metric gauge updates. Every loop logs and
//! continues on failure.

use sqlx::PgPool;
use tokio::time::{interval, Duration};

use crate::config::Config;
use crate::services::metrics_service;
use crate::services::validation_history_service::ValidationHistoryService;

/// Database gauge stats for Prometheus metrics.
#[derive(Debug, sqlx::FromRow)]
struct GaugeStats {
    pub runs: i64,
    pub results: i64,
    pub history_rows: i64,
}

/// Spawn all background scheduler tasks (fire-and-forget).
pub fn spawn_all(db: PgPool, config: Config) {
    // History population (hourly): completed runs without history rows get them
    {
        let db = db.clone();
        let days = config.history_population_days;
        tokio::spawn(async move {
            // Initial delay to let the server start up
            tokio::time::sleep(Duration::from_secs(30)).await;
            let service = ValidationHistoryService::new(db);
            let mut ticker = interval(Duration::from_secs(3600)); // 1 hour

            loop {
                ticker.tick().await;
                tracing::debug!("Running scheduled history population");

                match service.populate_history_from_recent_runs(days).await {
                    Ok(created) if created > 0 => {
                        tracing::info!(created = created, "History population created rows");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Scheduled history population failed: {}", e);
                    }
                }
            }
        });
    }

    // Retention cleanup (daily)
    {
        let db = db.clone();
        let retention_days = config.history_retention_days;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let service = ValidationHistoryService::new(db);
            let mut ticker = interval(Duration::from_secs(24 * 3600)); // 24 hours

            loop {
                ticker.tick().await;
                tracing::info!("Running scheduled history retention cleanup");

                match service.cleanup_old_records(retention_days).await {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed = removed, "History retention cleanup removed rows");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Scheduled history cleanup failed: {}", e);
                    }
                }
            }
        });
    }

    // Anomaly flagging (every 6 hours)
    {
        let db = db.clone();
        let days = config.history_retention_days;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            let service = ValidationHistoryService::new(db);
            let mut ticker = interval(Duration::from_secs(6 * 3600)); // 6 hours

            loop {
                ticker.tick().await;
                tracing::debug!("Running scheduled anomaly flagging");

                if let Err(e) = service.flag_quality_anomalies(days).await {
                    tracing::warn!("Scheduled anomaly flagging failed: {}", e);
                }
            }
        });
    }

    // Gauge metrics updater (every 5 minutes)
    {
        let db = db.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            let mut ticker = interval(Duration::from_secs(300)); // 5 minutes

            loop {
                ticker.tick().await;
                if let Err(e) = update_gauge_metrics(&db).await {
                    tracing::warn!("Failed to update gauge metrics: {}", e);
                }
            }
        });
    }

    tracing::info!(
        "Background schedulers started: history population, retention cleanup, anomaly flagging, gauges"
    );
}

/// Update Prometheus gauge metrics from database state.
async fn update_gauge_metrics(db: &PgPool) -> crate::error::Result<()> {
    let stats = sqlx::query_as::<_, GaugeStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM validation_runs) as runs,
            (SELECT COUNT(*) FROM validation_results) as results,
            (SELECT COUNT(*) FROM validation_history) as history_rows
        "#,
    )
    .fetch_one(db)
    .await
    .map_err(|e| crate::error::AppError::Database(e.to_string()))?;

    metrics_service::set_validation_gauges(stats.runs, stats.results, stats.history_rows);
    metrics_service::set_db_pool_gauges(db);

    Ok(())
}
