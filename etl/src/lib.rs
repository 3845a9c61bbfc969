//! # starschema - star schema ETL for development indicators
//!
//! Reads country-year indicator tables (Human Development Index, electricity
//! production by source, GDP per capita, CO2 per capita), classifies them
//! into categorical dimensions and assembles a fact table keyed by surrogate
//! integers. A second schema combines vaccination coverage with child
//! mortality.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV files  │────▶│   Extract   │────▶│  Transform  │────▶│  Validate   │────▶│    Load     │
//! │  (ISO/UTF8) │     │ (auto-enc)  │     │ (dims+fact) │     │ (integrity) │     │ (CSV / PG)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use starschema::{run_socioeconomic, CsvSink, EtlConfig, Sink};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = EtlConfig::default();
//!     let sink = Sink::Csv(CsvSink::new(&config.output_dir));
//!     let summary = run_socioeconomic(&config, &sink).await.unwrap();
//!     println!("Dropped {} rows", summary.drops.total());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`logs`] - Progress logging and broadcast
//! - [`config`] - Environment configuration and threshold tables
//! - [`models`] - Natural keys, labels, classified records
//! - [`extract`] - CSV reading with auto-detection and the source catalogue
//! - [`transform`] - Classification, dimensions, facts, pipeline
//! - [`validation`] - Referential integrity gate
//! - [`load`] - Output tables and sinks

// Core modules
pub mod error;
pub mod logs;
pub mod config;
pub mod models;

// Extraction
pub mod extract;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Loading
pub mod load;

// =============================================================================
// Re-exports - Errors and configuration
// =============================================================================

pub use error::{
    ConfigError, ExtractError, IntegrityError, PipelineError, PipelineResult, SinkError,
};

pub use config::{DatabaseConfig, EtlConfig, Thresholds};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CountryKey, EnergySource, HdiTier, IncomeCategory, Label, RowKey,
};

// =============================================================================
// Re-exports - Extraction
// =============================================================================

pub use extract::{
    decode_content, detect_delimiter, detect_encoding, read_csv_file, Extractor, RawTable,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    dominant_energy, run_health, run_socioeconomic, transform_health, transform_socioeconomic,
    Brackets, DropCounts, RunSummary, TransformOutput,
};

// =============================================================================
// Re-exports - Validation and loading
// =============================================================================

pub use validation::validate_star;

pub use load::{CsvSink, LoadReport, PostgresSink, Sink, Table, TableSpec};
