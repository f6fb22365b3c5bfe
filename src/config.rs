// ⚙️ Pipeline Configuration - Column names and thresholds as data
// Loaded from a JSON file; every field has a default so an empty `{}` is valid.

use crate::error::{CanonError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// COLUMN NAMES
// ============================================================================

/// Column names of the item (catalog) table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemColumns {
    pub barcode: String,
    pub en_short_desc: String,
    pub en_full_desc: String,
    pub ar_short_desc: String,
    pub ar_full_desc: String,
    pub category_levels: Vec<String>,
}

impl Default for ItemColumns {
    fn default() -> Self {
        ItemColumns {
            barcode: "BARCODE".to_string(),
            en_short_desc: "EN_SHORT_DESC".to_string(),
            en_full_desc: "EN_FULL_DESCRIPTION".to_string(),
            ar_short_desc: "AR_SHORT_DESC".to_string(),
            ar_full_desc: "AR_FULL_DESCRIPTION".to_string(),
            category_levels: (1..=4).map(|n| format!("CATEGORY_LEVEL{}", n)).collect(),
        }
    }
}

impl ItemColumns {
    /// Columns that must be present before any stage runs
    pub fn required(&self) -> Vec<&str> {
        let mut cols = vec![
            self.barcode.as_str(),
            self.en_short_desc.as_str(),
            self.en_full_desc.as_str(),
            self.ar_short_desc.as_str(),
            self.ar_full_desc.as_str(),
        ];
        cols.extend(self.category_levels.iter().map(String::as_str));
        cols
    }
}

/// Column names of the transaction table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionColumns {
    pub item_barcode: String,
    pub customer_barcode: String,
    pub invoice_id: String,
    pub quantity: String,
    pub unit_price: String,
    pub timestamp: String,
}

impl Default for TransactionColumns {
    fn default() -> Self {
        TransactionColumns {
            item_barcode: "item_barcode".to_string(),
            customer_barcode: "customer_barcode".to_string(),
            invoice_id: "invoice_id".to_string(),
            quantity: "quantity".to_string(),
            unit_price: "unit_price".to_string(),
            timestamp: "timestamp".to_string(),
        }
    }
}

impl TransactionColumns {
    pub fn required(&self) -> Vec<&str> {
        vec![
            self.item_barcode.as_str(),
            self.customer_barcode.as_str(),
            self.invoice_id.as_str(),
            self.quantity.as_str(),
            self.unit_price.as_str(),
            self.timestamp.as_str(),
        ]
    }
}

// ============================================================================
// NORMALIZER SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerSettings {
    /// A short description wrapped in this marker on both ends is kept as-is
    pub marker: String,

    /// Descriptions with this many words or fewer get augmented from the full description
    pub max_uninformative_words: usize,

    /// Pattern of the embedded product code inside the full description
    pub code_pattern: String,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        NormalizerSettings {
            marker: "*".to_string(),
            max_uninformative_words: 3,
            code_pattern: r"#\s*\w+".to_string(),
        }
    }
}

// ============================================================================
// OUTPUT LAYOUT
// ============================================================================

/// File names written inside the output directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFiles {
    pub consolidated_items: String,
    pub remapped_transactions: String,
    pub removed_items_log: String,
    pub quarantine_log: String,
    pub summary: String,
    pub annotated_catalog: String,
}

impl Default for OutputFiles {
    fn default() -> Self {
        OutputFiles {
            consolidated_items: "consolidated_items.csv".to_string(),
            remapped_transactions: "remapped_transactions.csv".to_string(),
            removed_items_log: "removed_items.csv".to_string(),
            quarantine_log: "quarantined_transactions.csv".to_string(),
            summary: "summary.json".to_string(),
            annotated_catalog: "annotated_catalog.csv".to_string(),
        }
    }
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub item_columns: ItemColumns,
    pub transaction_columns: TransactionColumns,
    pub normalizer: NormalizerSettings,
    pub output: OutputFiles,

    /// Keep the annotated intermediate catalog even after a clean verification
    pub keep_intermediates: bool,
}

impl PipelineConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.normalizer.marker.is_empty() {
            return Err(CanonError::Config("normalizer.marker must not be empty".to_string()));
        }

        if let Err(e) = Regex::new(&self.normalizer.code_pattern) {
            return Err(CanonError::Config(format!(
                "normalizer.code_pattern does not compile: {}",
                e
            )));
        }

        if self.item_columns.barcode.is_empty() || self.transaction_columns.item_barcode.is_empty() {
            return Err(CanonError::Config("barcode column names must not be empty".to_string()));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
