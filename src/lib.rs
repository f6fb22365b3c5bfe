// Catalog Canon - Core Library
// Collapses duplicate catalog items onto canonical barcodes and remaps the
// transaction history to match. Exposes all stages for the CLI and tests.

pub mod error;
pub mod config;
pub mod catalog;        // Item + transaction tables (BOM-aware CSV)
pub mod schema;         // Required columns + cell-level findings
pub mod normalizer;     // Description normalization
pub mod resolver;       // Two-pass duplicate grouping
pub mod canonical_map;  // barcode → canonical barcode
pub mod audit;          // Removed / quarantined logs
pub mod remapper;
pub mod consolidator;
pub mod verifier;
pub mod ledger;         // SQLite run history
pub mod pipeline;

// Re-export commonly used types
pub use error::{CanonError, Result};
pub use config::{
    ItemColumns, TransactionColumns, NormalizerSettings, OutputFiles, PipelineConfig,
};
pub use catalog::{Catalog, ItemRecord, TransactionLog, TransactionRecord};
pub use schema::{inspect_catalog, require_columns, FindingKind, SchemaFinding};
pub use normalizer::DescriptionNormalizer;
pub use resolver::{DuplicateGroup, DuplicateGroupResolver, GroupingKey, Resolution};
pub use canonical_map::{CanonicalMap, MapConflict};
pub use audit::{AuditReason, QuarantinedTransaction, RemovedItem};
pub use remapper::{RemapOutcome, TransactionRemapper};
pub use consolidator::{AnnotatedItem, Consolidation, ItemConsolidator, AUDIT_COLUMNS};
pub use verifier::{IntegrityReport, IntegrityResult, IntegrityVerifier};
pub use ledger::{Event, RunLedger};
pub use pipeline::{
    discard_intermediates, run_events, Checkpoints, Pipeline, PipelineRun, RunSummary, Verdict,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
