// ABOUTME: Library root for the PostgreSQL reindex driver
// ABOUTME: Exposes configuration, the database seams and the run pipeline

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod postgres;
pub mod report;
pub mod session;
pub mod task;
pub mod worker;

pub use config::ReindexConfig;
pub use error::{ReindexError, Result};
pub use orchestrator::{Orchestrator, RunOptions, RunSummary};
