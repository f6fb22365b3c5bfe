// 🔍 Duplicate Group Resolver - elect one canonical barcode per duplicate group
// Two passes: normalized description first, Arabic short description for the rest.
//
// Grouping is exact string equality only. A group's canonical barcode is the
// lexicographically greatest member barcode (string order, not numeric).

use crate::catalog::Catalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

// ============================================================================
// GROUPING KEY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupingKey {
    /// Normalized English description; always wins
    Primary,

    /// Arabic short description; only for items the primary pass left untagged
    Secondary,
}

impl GroupingKey {
    pub fn name(&self) -> &'static str {
        match self {
            GroupingKey::Primary => "normalized_desc",
            GroupingKey::Secondary => "secondary_desc",
        }
    }
}

// ============================================================================
// DUPLICATE GROUP
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Which pass produced this group
    pub key_kind: GroupingKey,

    /// Shared key value
    pub key: String,

    /// Indexes into `Catalog::items`, in catalog order
    pub members: Vec<usize>,

    /// Elected canonical barcode
    pub canonical: String,
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Output of both passes. Tags are indexed like `Catalog::items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub primary_tags: Vec<Option<String>>,
    pub secondary_tags: Vec<Option<String>>,
    pub groups: Vec<DuplicateGroup>,
}

impl Resolution {
    pub fn groups_by(&self, kind: GroupingKey) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.iter().filter(move |g| g.key_kind == kind)
    }

    /// Items placed in some duplicate group
    pub fn tagged_count(&self) -> usize {
        self.primary_tags
            .iter()
            .zip(&self.secondary_tags)
            .filter(|(p, s)| p.is_some() || s.is_some())
            .count()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

#[derive(Debug, Default)]
pub struct DuplicateGroupResolver;

impl DuplicateGroupResolver {
    pub fn new() -> Self {
        DuplicateGroupResolver
    }

    /// Run both passes over the whole catalog
    pub fn resolve(&self, catalog: &Catalog) -> Resolution {
        let n = catalog.items.len();
        let mut primary_tags: Vec<Option<String>> = vec![None; n];
        let mut secondary_tags: Vec<Option<String>> = vec![None; n];
        let mut groups = Vec::new();

        // Pass 1: normalized description
        let primary_keys = catalog.items.iter().map(|item| key_of(item.normalized_desc.as_deref()));
        for group in self.group_by(catalog, GroupingKey::Primary, primary_keys) {
            for &idx in &group.members {
                primary_tags[idx] = Some(group.canonical.clone());
            }
            groups.push(group);
        }

        // Pass 2: secondary description, primary-tagged items excluded before grouping
        let secondary_keys = catalog.items.iter().enumerate().map(|(idx, item)| {
            if primary_tags[idx].is_some() {
                None
            } else {
                key_of(item.ar_short_desc.as_deref())
            }
        });
        let secondary_groups = self.group_by(catalog, GroupingKey::Secondary, secondary_keys);
        for group in secondary_groups {
            for &idx in &group.members {
                secondary_tags[idx] = Some(group.canonical.clone());
            }
            groups.push(group);
        }

        let resolution = Resolution {
            primary_tags,
            secondary_tags,
            groups,
        };

        info!(
            items = n,
            primary_groups = resolution.groups_by(GroupingKey::Primary).count(),
            secondary_groups = resolution.groups_by(GroupingKey::Secondary).count(),
            tagged = resolution.tagged_count(),
            "duplicate groups resolved"
        );

        resolution
    }

    /// Partition by key; only groups with more than one member are duplicates
    fn group_by<'a, I>(&self, catalog: &Catalog, kind: GroupingKey, keys: I) -> Vec<DuplicateGroup>
    where
        I: Iterator<Item = Option<&'a str>>,
    {
        let mut buckets: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, key) in keys.enumerate() {
            if let Some(key) = key {
                buckets.entry(key).or_default().push(idx);
            }
        }

        buckets
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(key, members)| {
                let canonical = members
                    .iter()
                    .map(|&idx| catalog.items[idx].barcode.as_str())
                    .max()
                    .unwrap_or_default()
                    .to_string();
                DuplicateGroup {
                    key_kind: kind,
                    key: key.to_string(),
                    members,
                    canonical,
                }
            })
            .collect()
    }
}

/// Missing or blank values never form a group
fn key_of(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// TESTS
// ============================================================================
