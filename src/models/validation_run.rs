//! Validation run model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// One execution of the external validation engine. Owns its results and
/// metrics (cascade delete).
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ValidationRun {
    pub id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_seconds: Option<f64>,
    pub memory_usage_mb: Option<f64>,
    pub cpu_usage_percent: Option<f64>,
    pub total_checks: i32,
    pub created_at: DateTime<Utc>,
}

impl ValidationRun {
    /// Run status written by the validation engine when a run finishes cleanly.
    pub const STATUS_COMPLETED: &'static str = "completed";

    pub fn is_completed(&self) -> bool {
        self.status == Self::STATUS_COMPLETED
    }
}
