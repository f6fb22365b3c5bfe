// 📐 Shape Layer - Column presence + row-level data quality
//
// Missing required columns abort the run before anything is processed.
// Row findings are recorded and logged but never block the pipeline.

use crate::catalog::Catalog;
use crate::error::{CanonError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Resolve every required column to its index, or fail listing all missing ones
pub fn require_columns(table: &str, headers: &[String], required: &[&str]) -> Result<Vec<usize>> {
    let mut indexes = Vec::with_capacity(required.len());
    let mut missing = Vec::new();

    for name in required {
        match headers.iter().position(|h| h == name) {
            Some(idx) => indexes.push(idx),
            None => missing.push(name.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(indexes)
    } else {
        Err(CanonError::MissingColumns {
            table: table.to_string(),
            columns: missing,
        })
    }
}

// ============================================================================
// ROW FINDINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindingKind {
    /// Barcode cell is blank
    EmptyBarcode,

    /// A comma inside a barcode or category cell, usually a shifted column
    MisplacedComma,

    /// The same raw barcode appears on more than one catalog row
    RepeatedBarcode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFinding {
    pub kind: FindingKind,
    pub line_number: u64,
    pub barcode: String,
    pub detail: String,
}

/// Scan the catalog for suspicious rows
pub fn inspect_catalog(catalog: &Catalog) -> Vec<SchemaFinding> {
    let mut findings = Vec::new();
    let mut first_seen: HashMap<&str, u64> = HashMap::new();

    for item in &catalog.items {
        if item.barcode.trim().is_empty() {
            findings.push(SchemaFinding {
                kind: FindingKind::EmptyBarcode,
                line_number: item.line_number,
                barcode: item.barcode.clone(),
                detail: "barcode is empty".to_string(),
            });
            continue;
        }

        let comma_in_category = item
            .category_levels
            .iter()
            .flatten()
            .any(|c| c.contains(','));
        if item.barcode.contains(',') || comma_in_category {
            findings.push(SchemaFinding {
                kind: FindingKind::MisplacedComma,
                line_number: item.line_number,
                barcode: item.barcode.clone(),
                detail: "comma inside barcode or category level".to_string(),
            });
        }

        match first_seen.get(item.barcode.as_str()) {
            Some(first_line) => findings.push(SchemaFinding {
                kind: FindingKind::RepeatedBarcode,
                line_number: item.line_number,
                barcode: item.barcode.clone(),
                detail: format!("barcode already seen on line {}", first_line),
            }),
            None => {
                first_seen.insert(&item.barcode, item.line_number);
            }
        }
    }

    for finding in &findings {
        warn!(
            line = finding.line_number,
            barcode = %finding.barcode,
            kind = ?finding.kind,
            "{}",
            finding.detail
        );
    }

    findings
}

// ============================================================================
// TESTS
// ============================================================================
