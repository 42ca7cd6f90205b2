//! Validation result model: one row per individual check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Check severity. `info`/`warning` count as passed, `error`/`critical` as
/// failed. This binary split is the backbone of every percentage score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Whether a check at this severity counts as passed.
    pub fn is_passing(self) -> bool {
        matches!(self, Severity::Info | Severity::Warning)
    }

    /// Impact weight used when combining failures into penalty scores.
    pub fn weight(self) -> f64 {
        match self {
            Severity::Critical => 1.0,
            Severity::Error => 0.8,
            Severity::Warning => 0.5,
            Severity::Info => 0.2,
        }
    }

    /// Escalation multiplier for the severity-weighted scoring algorithm.
    pub fn escalation_multiplier(self) -> f64 {
        match self {
            Severity::Critical => 2.0,
            Severity::Error => 1.5,
            Severity::Warning => 1.0,
            Severity::Info => 0.5,
        }
    }

    /// Fixed point deduction used by the history linear-penalty score.
    pub fn linear_penalty(self) -> f64 {
        match self {
            Severity::Critical => 10.0,
            Severity::Error => 5.0,
            Severity::Warning => 2.0,
            Severity::Info => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

/// Structured classification of a violation, set by the validation rule that
/// produced the result. Drives the extra flat penalties in percentage-based
/// scoring without inspecting message text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "violation_subtype", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ViolationSubtype {
    MissingRequiredField,
    OrphanedRecord,
    InvalidReference,
}

impl ViolationSubtype {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationSubtype::MissingRequiredField => "missing_required_field",
            ViolationSubtype::OrphanedRecord => "orphaned_record",
            ViolationSubtype::InvalidReference => "invalid_reference",
        }
    }
}

/// One individual check outcome produced by the validation engine.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct ValidationResult {
    pub id: Uuid,
    pub run_id: Uuid,
    pub entity_type: String,
    pub validation_type: String,
    pub field_name: Option<String>,
    pub severity: Severity,
    pub violation_subtype: Option<ViolationSubtype>,
    pub message: Option<String>,
    pub expected_value: Option<String>,
    pub actual_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_pass_fail_split() {
        assert!(Severity::Info.is_passing());
        assert!(Severity::Warning.is_passing());
        assert!(!Severity::Error.is_passing());
        assert!(!Severity::Critical.is_passing());
    }

    #[test]
    fn test_severity_weights_are_ordered() {
        assert!(Severity::Critical.weight() > Severity::Error.weight());
        assert!(Severity::Error.weight() > Severity::Warning.weight());
        assert!(Severity::Warning.weight() > Severity::Info.weight());
    }

    #[test]
    fn test_severity_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
        let s: Severity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(s, Severity::Warning);
    }

    #[test]
    fn test_violation_subtype_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&ViolationSubtype::MissingRequiredField).unwrap(),
            "\"missing_required_field\""
        );
        let v: ViolationSubtype = serde_json::from_str("\"orphaned_record\"").unwrap();
        assert_eq!(v, ViolationSubtype::OrphanedRecord);
    }
}
