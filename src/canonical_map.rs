// 🧭 Canonical Map - raw barcode → canonical barcode, built once per snapshot
//
// Priority per item: primary tag, then secondary tag, then the item's own
// barcode. The finished map is read-only; there is no way to update it.

use crate::catalog::Catalog;
use crate::resolver::Resolution;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, warn};

/// A raw barcode that appeared on several rows with different group maxima
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConflict {
    pub barcode: String,
    pub candidates: Vec<String>,
    pub chosen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMap {
    entries: HashMap<String, String>,
    snapshot_digest: String,
    conflicts: Vec<MapConflict>,
    chains_collapsed: usize,
}

impl CanonicalMap {
    /// Combine both resolution passes into a single barcode lookup
    pub fn build(catalog: &Catalog, resolution: &Resolution) -> Self {
        let mut entries: HashMap<String, String> = HashMap::with_capacity(catalog.len());
        let mut candidates: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (idx, item) in catalog.items.iter().enumerate() {
            let canonical = resolution.primary_tags[idx]
                .as_ref()
                .or(resolution.secondary_tags[idx].as_ref())
                .unwrap_or(&item.barcode)
                .clone();

            candidates
                .entry(item.barcode.clone())
                .or_default()
                .insert(canonical.clone());

            entries
                .entry(item.barcode.clone())
                .and_modify(|current| {
                    if canonical > *current {
                        *current = canonical.clone();
                    }
                })
                .or_insert(canonical);
        }

        let conflicts: Vec<MapConflict> = candidates
            .into_iter()
            .filter(|(_, set)| set.len() > 1)
            .map(|(barcode, set)| {
                let chosen = entries[&barcode].clone();
                MapConflict {
                    barcode,
                    candidates: set.into_iter().collect(),
                    chosen,
                }
            })
            .collect();

        for conflict in &conflicts {
            warn!(
                barcode = %conflict.barcode,
                candidates = ?conflict.candidates,
                chosen = %conflict.chosen,
                "raw barcode belongs to several duplicate groups"
            );
        }

        let chains_collapsed = collapse_chains(&mut entries);

        let map = CanonicalMap {
            entries,
            snapshot_digest: catalog.snapshot_digest(),
            conflicts,
            chains_collapsed,
        };

        info!(
            barcodes = map.len(),
            redirected = map.redirected_count(),
            conflicts = map.conflicts.len(),
            chains_collapsed,
            "canonical map built"
        );

        map
    }

    /// Canonical barcode for a raw barcode, `None` if the catalog never saw it
    pub fn canonical(&self, barcode: &str) -> Option<&str> {
        self.entries.get(barcode).map(String::as_str)
    }

    pub fn contains(&self, barcode: &str) -> bool {
        self.entries.contains_key(barcode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Barcodes whose canonical value differs from themselves
    pub fn redirected_count(&self) -> usize {
        self.entries.iter().filter(|(raw, canon)| raw != canon).count()
    }

    /// Digest of the catalog snapshot this map was built from
    pub fn snapshot_digest(&self) -> &str {
        &self.snapshot_digest
    }

    pub fn conflicts(&self) -> &[MapConflict] {
        &self.conflicts
    }

    pub fn chains_collapsed(&self) -> usize {
        self.chains_collapsed
    }

    /// canonical(canonical(b)) == canonical(b) for every entry
    pub fn is_closed(&self) -> bool {
        self.entries
            .values()
            .all(|canon| self.canonical(canon) == Some(canon.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Follow b → c → d to the fixed point. Canonical values never decrease,
/// so every chain is finite.
fn collapse_chains(entries: &mut HashMap<String, String>) -> usize {
    let mut updates = Vec::new();

    for (raw, first) in entries.iter() {
        let mut current = first;
        let mut steps = 0;
        while let Some(next) = entries.get(current) {
            if next == current || steps > entries.len() {
                break;
            }
            current = next;
            steps += 1;
        }
        if current != first {
            updates.push((raw.clone(), current.clone()));
        }
    }

    let collapsed = updates.len();
    for (raw, canon) in updates {
        entries.insert(raw, canon);
    }
    collapsed
}

// ============================================================================
// TESTS
// ============================================================================
