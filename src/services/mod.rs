//! Business logic services.

pub mod data_aggregation_service;
pub mod metrics_service;
pub mod quality_scoring_service;
pub mod scheduler_service;
pub mod score_calculator;
pub mod score_weighting;
pub mod scoring_config;
pub mod threshold_manager;
pub mod validation_history_service;
