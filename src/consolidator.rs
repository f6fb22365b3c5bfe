// 🧹 Item Consolidator - one surviving record per canonical barcode
//
// Items are sorted by raw barcode, descending (stable), and the first item per
// canonical value survives. That is the canonical item itself whenever it is
// present. Survivors take the canonical barcode; everything else is logged.

use crate::audit::RemovedItem;
use crate::canonical_map::CanonicalMap;
use crate::catalog::{create_bom_file, write_table, Catalog, ItemRecord};
use crate::error::Result;
use crate::resolver::Resolution;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Audit columns appended to the consolidated and annotated tables
pub const AUDIT_COLUMNS: [&str; 4] = [
    "NORMALIZED_DESC",
    "PRIMARY_CANONICAL",
    "SECONDARY_CANONICAL",
    "CANONICAL_BARCODE",
];

/// Item plus everything the resolver and map decided about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedItem {
    pub record: ItemRecord,
    pub primary_canonical: Option<String>,
    pub secondary_canonical: Option<String>,
    pub canonical: String,
}

impl AnnotatedItem {
    fn audit_cells(&self) -> Vec<String> {
        vec![
            self.record.normalized_desc.clone().unwrap_or_default(),
            self.primary_canonical.clone().unwrap_or_default(),
            self.secondary_canonical.clone().unwrap_or_default(),
            self.canonical.clone(),
        ]
    }
}

/// Attach resolution tags and the canonical barcode to every item
pub fn annotate(catalog: &Catalog, resolution: &Resolution, map: &CanonicalMap) -> Vec<AnnotatedItem> {
    catalog
        .items
        .iter()
        .enumerate()
        .map(|(idx, item)| AnnotatedItem {
            record: item.clone(),
            primary_canonical: resolution.primary_tags[idx].clone(),
            secondary_canonical: resolution.secondary_tags[idx].clone(),
            canonical: map
                .canonical(&item.barcode)
                .unwrap_or(&item.barcode)
                .to_string(),
        })
        .collect()
}

/// Write annotated items: original columns plus the audit columns
pub fn write_annotated(path: &Path, catalog: &Catalog, items: &[AnnotatedItem]) -> Result<()> {
    let mut headers = catalog.headers.clone();
    headers.extend(AUDIT_COLUMNS.iter().map(|c| c.to_string()));

    let rows = items.iter().map(|a| {
        let mut row = catalog.output_row(&a.record);
        row.extend(a.audit_cells());
        row
    });
    write_table(create_bom_file(path)?, &headers, rows)
}

// ============================================================================
// CONSOLIDATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consolidation {
    /// Survivors, barcode set to the canonical value; same headers as the input
    pub catalog: Catalog,

    /// Survivors with their audit annotations, in the same order as `catalog.items`
    pub survivors: Vec<AnnotatedItem>,

    pub removed: Vec<RemovedItem>,
}

impl Consolidation {
    pub fn barcodes(&self) -> HashSet<&str> {
        self.catalog.items.iter().map(|i| i.barcode.as_str()).collect()
    }

    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        write_annotated(path, &self.catalog, &self.survivors)
    }
}

#[derive(Debug, Default)]
pub struct ItemConsolidator;

impl ItemConsolidator {
    pub fn new() -> Self {
        ItemConsolidator
    }

    pub fn consolidate(&self, catalog: &Catalog, annotated: Vec<AnnotatedItem>) -> Consolidation {
        let mut ordered = annotated;
        // stable: equal raw barcodes keep file order
        ordered.sort_by(|a, b| b.record.barcode.cmp(&a.record.barcode));

        let mut seen: HashSet<String> = HashSet::new();
        let mut survivors = Vec::new();
        let mut removed = Vec::new();

        for mut item in ordered {
            if seen.insert(item.canonical.clone()) {
                item.record.barcode = item.canonical.clone();
                survivors.push(item);
            } else {
                let canonical = item.canonical.clone();
                removed.push(RemovedItem::new(item.record, &canonical));
            }
        }

        let consolidated = Catalog {
            headers: catalog.headers.clone(),
            barcode_col: catalog.barcode_col,
            items: survivors.iter().map(|a| a.record.clone()).collect(),
        };

        info!(
            original = catalog.len(),
            consolidated = consolidated.len(),
            removed = removed.len(),
            "catalog consolidated"
        );

        Consolidation {
            catalog: consolidated,
            survivors,
            removed,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
