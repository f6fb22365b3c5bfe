// ✏️ Description Normalizer - one grouping key per item
//
// Rewrites the English short description into a string that converges for
// listings of the same product. The result is a grouping key, never shown to
// users. Pure per row: no other record is consulted.

use crate::catalog::{Catalog, ItemRecord};
use crate::config::NormalizerSettings;
use crate::error::{CanonError, Result};
use regex::Regex;
use tracing::debug;

pub struct DescriptionNormalizer {
    /// Embedded product code, e.g. "#HL001"
    code_pattern: Regex,

    /// Short descriptions wrapped in this marker are final
    marker: String,

    /// At or below this word count a description is judged non-informative
    max_uninformative_words: usize,
}

impl DescriptionNormalizer {
    /// Create normalizer with default settings
    pub fn new() -> Self {
        let settings = NormalizerSettings::default();
        DescriptionNormalizer {
            code_pattern: Regex::new(&settings.code_pattern).expect("default code pattern compiles"),
            marker: settings.marker,
            max_uninformative_words: settings.max_uninformative_words,
        }
    }

    pub fn from_settings(settings: &NormalizerSettings) -> Result<Self> {
        let code_pattern = Regex::new(&settings.code_pattern)
            .map_err(|e| CanonError::Config(format!("code pattern: {}", e)))?;

        Ok(DescriptionNormalizer {
            code_pattern,
            marker: settings.marker.clone(),
            max_uninformative_words: settings.max_uninformative_words,
        })
    }

    /// Normalize one item's descriptions. `None` means there is nothing to group on.
    pub fn normalize(&self, barcode: &str, short_desc: Option<&str>, full_desc: Option<&str>) -> Option<String> {
        let full_raw = full_desc.unwrap_or("");

        // Product code is pulled out of the comparison text and re-appended at the end
        let code = self
            .code_pattern
            .find(full_raw)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let full_clean = if code.is_empty() {
            clean_edges(&collapse_whitespace(full_raw))
        } else {
            clean_edges(&collapse_whitespace(&full_raw.replace(&code, "")))
        };

        let mut short = short_desc.unwrap_or("").trim().to_string();

        if short.is_empty() || is_numeric(&short) || short == barcode {
            short = full_clean.clone();
        } else if self.is_marked(&short) {
            return finish(&short);
        } else if short.starts_with('#') {
            if full_raw.contains(&short) {
                short = full_clean.clone();
            } else {
                short = format!("{} {}", full_clean, short);
            }
        }

        if short.split_whitespace().count() <= self.max_uninformative_words {
            // case-sensitive substring test; existing keys depend on it
            let missing: Vec<&str> = full_clean
                .split_whitespace()
                .filter(|word| !short.contains(word))
                .collect();
            short = format!("{} {}", missing.join(" "), short.trim());
        }

        if !code.is_empty() && !short.contains(&code) {
            short = format!("{} {}", short.trim(), code);
        }

        finish(&clean_edges(&short))
    }

    pub fn normalize_item(&self, item: &ItemRecord) -> Option<String> {
        self.normalize(
            &item.barcode,
            item.en_short_desc.as_deref(),
            item.en_full_desc.as_deref(),
        )
    }

    /// Attach a grouping key to every item of the snapshot
    pub fn normalize_catalog(&self, mut catalog: Catalog) -> Catalog {
        for item in catalog.items.iter_mut() {
            item.normalized_desc = self.normalize_item(item);
        }

        let keyed = catalog.items.iter().filter(|i| i.normalized_desc.is_some()).count();
        debug!(items = catalog.len(), keyed, "normalized descriptions");

        catalog
    }

    /// Wrapped in the marker with something between. A bare marker carries no
    /// description and would otherwise pull unrelated items into one group.
    fn is_marked(&self, text: &str) -> bool {
        text.len() > self.marker.len() && text.starts_with(&self.marker) && text.ends_with(&self.marker)
    }
}

impl Default for DescriptionNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop leading/trailing whitespace, dashes and colons
fn clean_edges(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == ':')
        .to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_numeric(text: &str) -> bool {
    text.parse::<f64>().is_ok()
}

fn finish(text: &str) -> Option<String> {
    let normalized = collapse_whitespace(&text.to_uppercase());
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(barcode: &str, short: Option<&str>, full: Option<&str>) -> Option<String> {
        DescriptionNormalizer::new().normalize(barcode, short, full)
    }

    #[test]
    fn test_empty_short_takes_full_description() {
        assert_eq!(
            norm("1001", None, Some("Blue Widget Large")),
            Some("BLUE WIDGET LARGE".to_string())
        );
    }

    #[test]
    fn test_numeric_short_takes_full_description() {
        assert_eq!(
            norm("1001", Some("12345"), Some("Green Tea Box")),
            Some("GREEN TEA BOX".to_string())
        );
    }

    #[test]
    fn test_short_equal_to_barcode_takes_full_description() {
        assert_eq!(
            norm("A100", Some("A100"), Some("Green Tea 500g Box")),
            Some("GREEN TEA 500G BOX".to_string())
        );
    }

    #[test]
    fn test_marked_short_is_final() {
        assert_eq!(
            norm("1001", Some("*Special Mix*"), Some("Some long thing #X1")),
            Some("*SPECIAL MIX*".to_string())
        );
    }

    #[test]
    fn test_hash_short_contained_in_full() {
        assert_eq!(
            norm("1001", Some("#HL001"), Some("Hand Lotion #HL001")),
            Some("HAND LOTION #HL001".to_string())
        );
    }

    #[test]
    fn test_hash_short_not_contained_gets_full_prefix() {
        assert_eq!(
            norm("1001", Some("#HL002"), Some("Hand Lotion #HL001")),
            Some("HAND LOTION #HL002 #HL001".to_string())
        );
    }

    #[test]
    fn test_informative_short_only_gets_code() {
        assert_eq!(
            norm("1001", Some("Premium Olive Oil Extra Virgin"), Some("Olive Oil 1L #OO5")),
            Some("PREMIUM OLIVE OIL EXTRA VIRGIN #OO5".to_string())
        );
    }

    #[test]
    fn test_uninformative_short_is_augmented_before() {
        assert_eq!(
            norm("1001", Some("Olive Oil"), Some("Premium Olive Oil 1L")),
            Some("PREMIUM 1L OLIVE OIL".to_string())
        );
    }

    #[test]
    fn test_edge_punctuation_and_whitespace() {
        assert_eq!(
            norm("1001", None, Some("-  Olive   Oil :")),
            Some("OLIVE OIL".to_string())
        );
        assert_eq!(
            norm("1001", Some("  olive   oil  extra virgin "), None),
            Some("OLIVE OIL EXTRA VIRGIN".to_string())
        );
    }

    #[test]
    fn test_nothing_to_group_on() {
        assert_eq!(norm("1001", None, None), None);
        assert_eq!(norm("1001", Some("   "), Some(" - ")), None);
    }

    #[test]
    fn test_listings_of_same_product_converge() {
        let a = norm("1001", Some("Widget"), Some("Widget"));
        let b = norm("1002", None, Some("widget"));

        assert_eq!(a, Some("WIDGET".to_string()));
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_word_check_is_case_sensitive() {
        // "Olive" is not found in "olive oil", so every full word is prepended
        assert_eq!(
            norm("1", Some("olive oil"), Some("Olive Oil 1L")),
            Some("OLIVE OIL 1L OLIVE OIL".to_string())
        );
        assert_eq!(
            norm("1", Some("WIDGET"), Some("Widget")),
            Some("WIDGET WIDGET".to_string())
        );
    }

    #[test]
    fn test_bare_marker_is_not_final() {
        assert_eq!(
            norm("1001", Some("*"), Some("Olive Oil")),
            Some("OLIVE OIL *".to_string())
        );
        assert_eq!(
            norm("1001", Some("**"), Some("Olive Oil")),
            Some("**".to_string())
        );
    }

    #[test]
    fn test_word_threshold_from_settings() {
        let settings = NormalizerSettings {
            max_uninformative_words: 1,
            ..NormalizerSettings::default()
        };
        let normalizer = DescriptionNormalizer::from_settings(&settings).unwrap();

        // two words: informative under a threshold of one
        assert_eq!(
            normalizer.normalize("1", Some("Olive Oil"), Some("Premium Olive Oil 1L")),
            Some("OLIVE OIL".to_string())
        );
    }

    #[test]
    fn test_normalize_catalog_fills_every_item() {
        let catalog = Catalog::new(vec![
            ItemRecord::new("1001", Some("WIDGET"), Some("WIDGET"), None),
            ItemRecord::new("1002", None, None, None),
        ]);

        let catalog = DescriptionNormalizer::new().normalize_catalog(catalog);
        assert_eq!(catalog.items[0].normalized_desc.as_deref(), Some("WIDGET"));
        assert_eq!(catalog.items[1].normalized_desc, None);
    }
}
