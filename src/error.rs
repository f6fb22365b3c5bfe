// 🚨 Error Taxonomy - what can abort a canonicalization run
//
// Only missing input, bad configuration and I/O abort a run. Resolution,
// remapping and consolidation never fail: their problems become audit rows.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonError {
    /// Required columns absent from an input table (fatal, raised before processing)
    #[error("{table} table is missing required column(s): {}", .columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    /// Destructive cleanup attempted while transactions still point nowhere
    #[error("refusing to discard intermediates: {unresolved} transaction reference(s) unresolved")]
    CleanupRefused { unresolved: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CanonError>;
