//! The entity bundle attached to articles ahead of LLM extraction.

use serde::{Deserialize, Serialize};

/// Named entities detected in an article, grouped by kind.
///
/// Each list is sorted and deduplicated case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityBundle {
    #[serde(default)]
    pub persons: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub products: Vec<String>,
}

impl EntityBundle {
    /// Total number of entities across all kinds.
    pub fn count(&self) -> usize {
        self.persons.len()
            + self.organizations.len()
            + self.locations.len()
            + self.dates.len()
            + self.events.len()
            + self.products.len()
    }

    /// True when no entities were detected.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Sort each list and drop case-insensitive duplicates, keeping the
    /// first-seen casing.
    pub fn normalize(&mut self) {
        for list in [
            &mut self.persons,
            &mut self.organizations,
            &mut self.locations,
            &mut self.dates,
            &mut self.events,
            &mut self.products,
        ] {
            let mut seen = std::collections::HashSet::new();
            list.retain(|item| seen.insert(item.to_lowercase()));
            list.sort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_dedupes_case_insensitively() {
        let mut bundle = EntityBundle {
            persons: vec![
                "Vladimir Putin".to_string(),
                "vladimir putin".to_string(),
                "Narendra Modi".to_string(),
            ],
            ..EntityBundle::default()
        };
        bundle.normalize();
        assert_eq!(bundle.persons, vec!["Narendra Modi", "Vladimir Putin"]);
    }

    #[test]
    fn test_count_and_empty() {
        let mut bundle = EntityBundle::default();
        assert!(bundle.is_empty());
        bundle.locations.push("Kabul".to_string());
        assert_eq!(bundle.count(), 1);
        assert!(!bundle.is_empty());
    }
}
