//! Step Data
//!
//! The data record a wizard step collects: flat values for fixed and trailing
//! fields plus an ordered list of repeatable items.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Collected values of one wizard step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepData {
    /// Fixed and trailing field values by field name
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    /// Repeatable items in creation order
    #[serde(default)]
    pub items: Vec<BTreeMap<String, String>>,
}

impl StepData {
    /// Create an empty record with `count` blank items.
    pub fn with_items(count: usize) -> Self {
        Self {
            values: BTreeMap::new(),
            items: vec![BTreeMap::new(); count],
        }
    }

    /// Value of a fixed field, empty when absent.
    pub fn value(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or("")
    }

    /// Whether a fixed field holds a non-empty value.
    pub fn has_value(&self, name: &str) -> bool {
        !self.value(name).trim().is_empty()
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
    }

    /// Value of an item field, empty when the item or field is absent.
    pub fn item_value(&self, index: usize, field: &str) -> &str {
        self.items
            .get(index)
            .and_then(|item| item.get(field))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Set an item field. Returns false if the item does not exist.
    pub fn set_item_value(&mut self, index: usize, field: &str, value: impl Into<String>) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.insert(field.to_string(), value.into());
                true
            }
            None => false,
        }
    }

    /// Append a blank item and return its index.
    pub fn push_item(&mut self) -> usize {
        self.items.push(BTreeMap::new());
        self.items.len() - 1
    }

    /// Blank every field of an item, keeping the item itself.
    pub fn clear_item(&mut self, index: usize) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.clear();
                true
            }
            None => false,
        }
    }

    /// Whether nothing at all has been entered.
    pub fn is_blank(&self) -> bool {
        self.values.values().all(|v| v.trim().is_empty())
            && self
                .items
                .iter()
                .all(|item| item.values().all(|v| v.trim().is_empty()))
    }

    /// Merge a secondary source into this record.
    ///
    /// Values already present here win; the other record only fills fields
    /// that are missing or blank, and contributes items beyond our length.
    pub fn fill_gaps_from(&mut self, other: &StepData) {
        for (name, value) in &other.values {
            if !self.has_value(name) && !value.trim().is_empty() {
                self.values.insert(name.clone(), value.clone());
            }
        }
        for (index, other_item) in other.items.iter().enumerate() {
            if index >= self.items.len() {
                self.items.push(other_item.clone());
                continue;
            }
            let item = &mut self.items[index];
            for (field, value) in other_item {
                let blank = item.get(field).map_or(true, |v| v.trim().is_empty());
                if blank && !value.trim().is_empty() {
                    item.insert(field.clone(), value.clone());
                }
            }
        }
    }
}
