// 📜 Audit Trail - removed items and quarantined transactions
// Append-only records: full original row plus the reason it was set aside.

use crate::catalog::{create_bom_file, write_table, ItemRecord, TransactionRecord};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditReason {
    /// Item collapsed into the surviving record of its duplicate group
    DuplicateOf { canonical: String },

    /// Transaction points at a barcode the catalog never contained
    UnknownItemReference { barcode: String },
}

impl AuditReason {
    pub fn describe(&self) -> String {
        match self {
            AuditReason::DuplicateOf { canonical } => format!("duplicate of {}", canonical),
            AuditReason::UnknownItemReference { barcode } => {
                format!("item {} not found in catalog", barcode)
            }
        }
    }
}

// ============================================================================
// REMOVED ITEMS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedItem {
    /// Record exactly as it was before consolidation
    pub record: ItemRecord,
    pub canonical: String,
    pub reason: AuditReason,
}

impl RemovedItem {
    pub fn new(record: ItemRecord, canonical: &str) -> Self {
        RemovedItem {
            record,
            canonical: canonical.to_string(),
            reason: AuditReason::DuplicateOf {
                canonical: canonical.to_string(),
            },
        }
    }
}

pub fn write_removed_items<W: Write>(writer: W, headers: &[String], removed: &[RemovedItem]) -> Result<()> {
    let mut columns = headers.to_vec();
    columns.push("CANONICAL_BARCODE".to_string());
    columns.push("REASON".to_string());

    let rows = removed.iter().map(|r| {
        let mut row = r.record.fields.clone();
        row.push(r.canonical.clone());
        row.push(r.reason.describe());
        row
    });
    write_table(writer, &columns, rows)
}

pub fn write_removed_items_to_path(path: &Path, headers: &[String], removed: &[RemovedItem]) -> Result<()> {
    write_removed_items(create_bom_file(path)?, headers, removed)
}

// ============================================================================
// QUARANTINED TRANSACTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantinedTransaction {
    /// Position in the transaction log
    pub row_index: usize,

    /// Record exactly as read; it also stays in the remapped log unchanged
    pub record: TransactionRecord,
    pub reason: AuditReason,
}

impl QuarantinedTransaction {
    pub fn new(row_index: usize, record: TransactionRecord) -> Self {
        let barcode = record.item_barcode.clone();
        QuarantinedTransaction {
            row_index,
            record,
            reason: AuditReason::UnknownItemReference { barcode },
        }
    }
}

pub fn write_quarantine<W: Write>(
    writer: W,
    headers: &[String],
    quarantined: &[QuarantinedTransaction],
) -> Result<()> {
    let mut columns = headers.to_vec();
    columns.push("LINE_NUMBER".to_string());
    columns.push("REASON".to_string());

    let rows = quarantined.iter().map(|q| {
        let mut row = q.record.fields.clone();
        row.push(q.record.line_number.to_string());
        row.push(q.reason.describe());
        row
    });
    write_table(writer, &columns, rows)
}

pub fn write_quarantine_to_path(
    path: &Path,
    headers: &[String],
    quarantined: &[QuarantinedTransaction],
) -> Result<()> {
    write_quarantine(create_bom_file(path)?, headers, quarantined)
}

// ============================================================================
// TESTS
// ============================================================================
