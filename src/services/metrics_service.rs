//! Prometheus metrics collection and HTTP request instrumentation.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, Response},
    middleware::Next,
};

/// Initialize the Prometheus metrics recorder and return the handle for rendering.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    builder
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Axum middleware that records HTTP request metrics.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone().to_string();
    let path = request.uri().path().to_string();
    // Normalize path to avoid high-cardinality labels (strip UUIDs and IDs)
    let normalized = normalize_path(&path);

    let start = Instant::now();
    counter!("vms_http_requests_total", "method" => method.clone(), "path" => normalized.clone())
        .increment(1);

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    histogram!("vms_http_request_duration_seconds", "method" => method.clone(), "path" => normalized.clone(), "status" => status.clone()).record(duration);
    counter!("vms_http_responses_total", "method" => method, "path" => normalized, "status" => status).increment(1);

    response
}

/// Normalize URL paths to reduce label cardinality.
/// Replaces UUIDs and numeric IDs with placeholders.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let normalized: Vec<String> = segments
        .iter()
        .map(|seg| {
            if seg.len() == 36 && seg.chars().filter(|c| *c == '-').count() == 4 {
                // UUID pattern
                ":id".to_string()
            } else if seg.parse::<i64>().is_ok() && !seg.is_empty() {
                // Numeric ID
                ":id".to_string()
            } else {
                seg.to_string()
            }
        })
        .collect();
    normalized.join("/")
}

/// Record a completed entity scoring computation.
pub fn record_scoring_run(entity_type: &str, quality_score: f64, duration_secs: f64) {
    counter!("vms_quality_scoring_runs_total", "entity_type" => entity_type.to_string())
        .increment(1);
    histogram!("vms_quality_scoring_duration_seconds", "entity_type" => entity_type.to_string())
        .record(duration_secs);
    gauge!("vms_quality_score", "entity_type" => entity_type.to_string()).set(quality_score);
}

/// Record history rows created by the history service.
pub fn record_history_rows_created(rows: u64) {
    counter!("vms_validation_history_rows_created_total").increment(rows);
}

/// Record a cleanup operation.
pub fn record_cleanup(cleanup_type: &str, items_removed: u64) {
    counter!("vms_cleanup_items_removed_total", "type" => cleanup_type.to_string())
        .increment(items_removed);
}

/// Update validation table row-count gauges from database stats.
pub fn set_validation_gauges(runs: i64, results: i64, history_rows: i64) {
    gauge!("vms_validation_runs_total").set(runs as f64);
    gauge!("vms_validation_results_total").set(results as f64);
    gauge!("vms_validation_history_rows_total").set(history_rows as f64);
}

/// Update database connection pool gauge metrics.
pub fn set_db_pool_gauges(pool: &sqlx::PgPool) {
    let size = pool.size() as f64;
    let idle = pool.num_idle() as f64;
    gauge!("vms_db_pool_connections_active").set(size - idle);
    gauge!("vms_db_pool_connections_idle").set(idle);
    gauge!("vms_db_pool_connections_size").set(size);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/quality/entities/550e8400-e29b-41d4-a716-446655440000/score";
        let result = normalize_path(path);
        assert_eq!(result, "/api/v1/quality/entities/:id/score");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/history/123";
        let result = normalize_path(path);
        assert_eq!(result, "/api/v1/history/:id");
    }

    #[test]
    fn test_normalize_path_no_change() {
        let path = "/api/v1/quality/report";
        let result = normalize_path(path);
        assert_eq!(result, "/api/v1/quality/report");
    }
}
