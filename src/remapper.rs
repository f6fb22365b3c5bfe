// 🔁 Transaction Remapper - rewrite item references through the canonical map
//
// Every transaction is visited exactly once, in file order. Unknown references
// are left untouched and quarantined; the row itself is kept so the verifier
// can surface it instead of it silently disappearing.

use crate::audit::QuarantinedTransaction;
use crate::canonical_map::CanonicalMap;
use crate::catalog::TransactionLog;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemapOutcome {
    /// Full transaction set with references rewritten
    pub log: TransactionLog,

    /// Rows whose reference actually changed
    pub affected: usize,

    /// One entry per unresolvable row
    pub quarantine: Vec<QuarantinedTransaction>,
}

impl RemapOutcome {
    /// Distinct unresolved references, in first-seen order
    pub fn quarantined_refs(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.quarantine
            .iter()
            .map(|q| q.record.item_barcode.clone())
            .filter(|b| seen.insert(b.clone()))
            .collect()
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.quarantine.is_empty()
    }
}

pub struct TransactionRemapper<'a> {
    map: &'a CanonicalMap,
}

impl<'a> TransactionRemapper<'a> {
    pub fn new(map: &'a CanonicalMap) -> Self {
        TransactionRemapper { map }
    }

    pub fn remap(&self, mut log: TransactionLog) -> RemapOutcome {
        let mut affected = 0;
        let mut quarantine = Vec::new();

        for (row_index, tx) in log.transactions.iter_mut().enumerate() {
            match self.map.canonical(&tx.item_barcode) {
                Some(canonical) => {
                    if canonical != tx.item_barcode {
                        tx.item_barcode = canonical.to_string();
                        affected += 1;
                    }
                }
                None => quarantine.push(QuarantinedTransaction::new(row_index, tx.clone())),
            }
        }

        let outcome = RemapOutcome {
            log,
            affected,
            quarantine,
        };

        if !outcome.is_fully_resolved() {
            warn!(
                rows = outcome.quarantine.len(),
                distinct = outcome.quarantined_refs().len(),
                "transactions reference barcodes absent from the catalog"
            );
        }
        info!(
            transactions = outcome.log.len(),
            affected,
            quarantined = outcome.quarantine.len(),
            "transactions remapped"
        );

        outcome
    }
}

// ============================================================================
// TESTS
// ============================================================================
