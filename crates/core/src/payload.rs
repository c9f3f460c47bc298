//! Step Payload
//!
//! The filtered record handed to the backend when a step is finalized.
//! Partially filled items are dropped from the payload (but kept locally),
//! and fields hidden by a gate are left out.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::data::StepData;
use crate::key::{KeyShape, QuestionKey};
use crate::model::{SlotKind, WizardModel};

/// Payload of one finalized step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPayload {
    /// Step key
    pub step: String,
    /// Non-empty fixed and trailing values
    pub values: BTreeMap<String, String>,
    /// Fully valid items, renumbered from zero
    pub items: Vec<BTreeMap<String, String>>,
    /// Optional questions satisfied by a skip, keyed as in the payload
    pub skipped: Vec<QuestionKey>,
}

impl StepPayload {
    /// Assemble the payload from the current data.
    pub fn build(model: &WizardModel, data: &StepData, skipped: &BTreeSet<QuestionKey>) -> Self {
        let mut payload = StepPayload {
            step: model.step().to_string(),
            ..Default::default()
        };

        for slot in model.slots(data) {
            if let SlotKind::Fixed(_) | SlotKind::Trailing(_) = slot.kind {
                let value = model.stored_value(&slot, data);
                if skipped.contains(&slot.key) {
                    payload.skipped.push(slot.key.clone());
                } else if !value.trim().is_empty() {
                    payload.values.insert(slot.key.to_string(), value);
                }
            }
        }

        let mut kept = BTreeMap::new();
        for index in 0..data.items.len() {
            if !model.item_is_valid(data, index) {
                continue;
            }
            let new_index = payload.items.len();
            kept.insert(index, new_index);
            let item: BTreeMap<String, String> = data.items[index]
                .iter()
                .filter(|(_, v)| !v.trim().is_empty())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            payload.items.push(item);
        }

        for key in skipped {
            if let KeyShape::Item {
                group,
                index,
                field,
            } = key.shape()
            {
                if let Some(new_index) = kept.get(&index) {
                    payload
                        .skipped
                        .push(QuestionKey::item(group, *new_index, field));
                }
            }
        }

        payload
    }

    /// Whether there is nothing to submit.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.items.is_empty()
    }
}
