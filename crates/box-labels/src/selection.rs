//! Print selection: the ordered set of item ids chosen for printing

use crate::types::{LabelError, PrintableItem, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How selected items are ordered before layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionOrder {
    /// The order the user picked them in
    #[default]
    Insertion,
    /// Sorted by display code (BOX-001, BOX-002, ...)
    DisplayCode,
}

/// Ordered, duplicate-free list of item ids. Session-local only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintSelection {
    ids: Vec<String>,
}

impl PrintSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the id if absent, remove it if present. Returns true when added.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.remove(id) {
            false
        } else {
            self.ids.push(id.to_string());
            true
        }
    }

    /// Append an id. Returns false if it was already selected.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Returns false if the id was not selected.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.ids.iter().position(|existing| existing == id) {
            Some(idx) => {
                self.ids.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Arrange fetched records for layout.
    ///
    /// The store may return records in any order and may include ids that
    /// were not asked for; both are tolerated. A selected id with no record
    /// is an `ItemFetchFailed` error.
    pub fn order_items(
        &self,
        items: Vec<PrintableItem>,
        order: SelectionOrder,
    ) -> Result<Vec<PrintableItem>> {
        let mut by_id: HashMap<String, PrintableItem> = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();

        let mut missing = Vec::new();
        let mut ordered = Vec::with_capacity(self.ids.len());
        for id in &self.ids {
            match by_id.remove(id) {
                Some(item) => ordered.push(item),
                None => missing.push(id.as_str()),
            }
        }

        if !missing.is_empty() {
            return Err(LabelError::ItemFetchFailed(format!(
                "no record for selected item(s): {}",
                missing.join(", ")
            )));
        }

        if order == SelectionOrder::DisplayCode {
            ordered.sort_by(|a, b| a.display_code.cmp(&b.display_code));
        }
        Ok(ordered)
    }
}

impl<S: Into<String>> FromIterator<S> for PrintSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut selection = PrintSelection::new();
        for id in iter {
            selection.add(id);
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut selection = PrintSelection::new();
        assert!(selection.toggle("a"));
        assert!(selection.toggle("b"));
        assert!(!selection.toggle("a"));
        assert_eq!(selection.ids(), ["b".to_string()]);
    }

    #[test]
    fn test_no_duplicates() {
        let selection: PrintSelection = ["a", "b", "a", "c", "b"].into_iter().collect();
        assert_eq!(selection.len(), 3);
        assert_eq!(selection.ids(), ["a", "b", "c"].map(String::from));
    }

    #[test]
    fn test_order_items_follows_selection() {
        let selection: PrintSelection = ["3", "1", "2"].into_iter().collect();
        let items = vec![
            PrintableItem::new("1", "BOX-003"),
            PrintableItem::new("2", "BOX-001"),
            PrintableItem::new("3", "BOX-002"),
        ];

        let ordered = selection
            .order_items(items.clone(), SelectionOrder::Insertion)
            .unwrap();
        let ids: Vec<_> = ordered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["3", "1", "2"]);

        let sorted = selection
            .order_items(items, SelectionOrder::DisplayCode)
            .unwrap();
        let codes: Vec<_> = sorted.iter().map(|i| i.display_code.as_str()).collect();
        assert_eq!(codes, ["BOX-001", "BOX-002", "BOX-003"]);
    }

    #[test]
    fn test_order_items_missing_record() {
        let selection: PrintSelection = ["1", "2"].into_iter().collect();
        let result = selection.order_items(
            vec![PrintableItem::new("1", "BOX-001")],
            SelectionOrder::Insertion,
        );
        assert!(matches!(result, Err(LabelError::ItemFetchFailed(msg)) if msg.contains('2')));
    }
}
