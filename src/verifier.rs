// ⚖️ Integrity Verifier - every transaction must resolve to a surviving item
//
// Runs after remap + consolidation. A clean report is the only thing that
// allows intermediate artifacts to be discarded.

use crate::catalog::{Catalog, TransactionLog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

// ============================================================================
// INTEGRITY RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntegrityResult {
    /// Every reference exists in the consolidated catalog
    Verified { checked: usize },

    /// Some references point nowhere; destructive cleanup must not happen
    Broken {
        unresolved_rows: usize,
        missing: Vec<String>,
    },
}

impl IntegrityResult {
    pub fn is_verified(&self) -> bool {
        matches!(self, IntegrityResult::Verified { .. })
    }

    pub fn missing_count(&self) -> usize {
        match self {
            IntegrityResult::Verified { .. } => 0,
            IntegrityResult::Broken { missing, .. } => missing.len(),
        }
    }
}

// ============================================================================
// INTEGRITY REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub result: IntegrityResult,
    pub transaction_count: usize,
    pub distinct_references: usize,

    /// Consolidated items no transaction points at (informational only)
    pub unreferenced_items: Vec<String>,

    pub verified_at: DateTime<Utc>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.result.is_verified()
    }

    /// Intermediates may only be thrown away after a clean verification
    pub fn may_discard_intermediates(&self) -> bool {
        self.is_clean()
    }

    /// Unresolved references, at most `limit` of them
    pub fn sample(&self, limit: usize) -> &[String] {
        match &self.result {
            IntegrityResult::Verified { .. } => &[],
            IntegrityResult::Broken { missing, .. } => &missing[..missing.len().min(limit)],
        }
    }

    pub fn summary(&self) -> String {
        match &self.result {
            IntegrityResult::Verified { checked } => format!(
                "Integrity verified: {} transactions, {} distinct items referenced, {} items unreferenced",
                checked,
                self.distinct_references,
                self.unreferenced_items.len()
            ),
            IntegrityResult::Broken {
                unresolved_rows,
                missing,
            } => format!(
                "Integrity broken: {} of {} transactions reference {} unknown barcode(s)",
                unresolved_rows,
                self.transaction_count,
                missing.len()
            ),
        }
    }
}

// ============================================================================
// INTEGRITY VERIFIER
// ============================================================================

pub struct IntegrityVerifier {
    /// How many unresolved references to put in the log line (default: 10)
    pub sample_size: usize,
}

impl IntegrityVerifier {
    pub fn new() -> Self {
        IntegrityVerifier { sample_size: 10 }
    }

    pub fn with_sample_size(sample_size: usize) -> Self {
        IntegrityVerifier { sample_size }
    }

    pub fn verify(&self, log: &TransactionLog, catalog: &Catalog) -> IntegrityReport {
        let known: HashSet<&str> = catalog.items.iter().map(|i| i.barcode.as_str()).collect();

        let mut referenced: HashSet<&str> = HashSet::new();
        let mut missing_seen: HashSet<&str> = HashSet::new();
        let mut missing = Vec::new();
        let mut unresolved_rows = 0;

        for tx in &log.transactions {
            let reference = tx.item_barcode.as_str();
            referenced.insert(reference);

            if !known.contains(reference) {
                unresolved_rows += 1;
                if missing_seen.insert(reference) {
                    missing.push(reference.to_string());
                }
            }
        }

        let unreferenced_items: Vec<String> = catalog
            .items
            .iter()
            .filter(|i| !referenced.contains(i.barcode.as_str()))
            .map(|i| i.barcode.clone())
            .collect();

        let result = if missing.is_empty() {
            IntegrityResult::Verified {
                checked: log.len(),
            }
        } else {
            IntegrityResult::Broken {
                unresolved_rows,
                missing,
            }
        };

        let report = IntegrityReport {
            result,
            transaction_count: log.len(),
            distinct_references: referenced.len(),
            unreferenced_items,
            verified_at: Utc::now(),
        };

        if report.is_clean() {
            info!(unreferenced = report.unreferenced_items.len(), "{}", report.summary());
        } else {
            warn!(sample = ?report.sample(self.sample_size), "{}", report.summary());
        }

        report
    }
}

impl Default for IntegrityVerifier {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ItemRecord, TransactionRecord};

    fn create_test_catalog(barcodes: &[&str]) -> Catalog {
        Catalog::new(barcodes.iter().map(|b| ItemRecord::new(b, None, None, None)).collect())
    }

    fn create_test_log(refs: &[&str]) -> TransactionLog {
        TransactionLog::new(
            refs.iter()
                .enumerate()
                .map(|(i, r)| TransactionRecord::new(r, "C1", &format!("INV{}", i)))
                .collect(),
        )
    }

    #[test]
    fn test_all_references_resolve() {
        let report = IntegrityVerifier::new().verify(
            &create_test_log(&["1002", "2001", "1002"]),
            &create_test_catalog(&["1002", "2001"]),
        );

        assert!(report.is_clean());
        assert!(report.may_discard_intermediates());
        assert_eq!(report.result, IntegrityResult::Verified { checked: 3 });
        assert_eq!(report.distinct_references, 2);
        assert!(report.unreferenced_items.is_empty());
        assert!(report.sample(5).is_empty());
    }

    #[test]
    fn test_unknown_reference_breaks_integrity() {
        let report = IntegrityVerifier::new().verify(
            &create_test_log(&["9999", "1002", "9999", "7777"]),
            &create_test_catalog(&["1002"]),
        );

        assert!(!report.is_clean());
        assert!(!report.may_discard_intermediates());
        assert_eq!(
            report.result,
            IntegrityResult::Broken {
                unresolved_rows: 3,
                missing: vec!["9999".to_string(), "7777".to_string()],
            }
        );
        assert_eq!(report.result.missing_count(), 2);
        assert_eq!(report.sample(1), &["9999".to_string()]);
        assert!(report.summary().contains("3 of 4 transactions"));
    }

    #[test]
    fn test_unreferenced_items_reported_but_not_blocking() {
        let report = IntegrityVerifier::new().verify(
            &create_test_log(&["1002"]),
            &create_test_catalog(&["1002", "5001"]),
        );

        assert!(report.is_clean());
        assert_eq!(report.unreferenced_items, vec!["5001".to_string()]);
    }

    #[test]
    fn test_empty_transaction_log_is_clean() {
        let report = IntegrityVerifier::with_sample_size(3)
            .verify(&create_test_log(&[]), &create_test_catalog(&["1"]));

        assert!(report.is_clean());
        assert_eq!(report.transaction_count, 0);
    }
}
