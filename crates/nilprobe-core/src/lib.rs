//! nilprobe core - configuration and analysis orchestration

pub mod config;
pub mod orchestrator;

pub use config::{Config, OutputFormat};
pub use orchestrator::{analyze_files, analyze_ir, AnalysisOutput, OrchestratorError};
