//! VMS Backend Library
//!
//! Backend for a volunteer/education program management platform. The core
//! subsystem is the data-quality validation scoring engine: weighted quality
//! scores over validation results, durable per-run history, and statistical
//! trend/anomaly analysis over validation metrics.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
