//! Field Model
//!
//! Describes the ordered, partly dynamic set of questions of one wizard step
//! and walks it in a fixed traversal order:
//!
//! 1. Fixed fields in declaration order. A field gated with `shown_if` only
//!    appears once its source field holds a value.
//! 2. The repeatable group. Each existing item contributes the gate that
//!    created it (items beyond `min_items` were added through the gate)
//!    followed by its own fields. The open gate `gate[len]` comes last.
//! 3. Trailing optional fields (notes, narrative).
//!
//! The traversal depends only on the data record. Which questions are done
//! is decided by the caller's answered set.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::data::StepData;
use crate::error::{CoreError, CoreResult};
use crate::field::FieldSpec;
use crate::key::{validate_name, KeyShape, QuestionKey};

/// A repeatable group of item fields controlled by a yes/no gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatableGroup {
    /// Group name used in item keys (`proof[0].type`)
    pub name: String,
    /// Gate name used in gate keys (`ask-more-proof[1]`)
    pub gate: String,
    /// Short label for the gate question
    pub gate_label: String,
    /// Fields of one item, in asking order
    pub fields: Vec<FieldSpec>,
    /// Items created up front, without asking the gate
    #[serde(default)]
    pub min_items: usize,
}

impl RepeatableGroup {
    pub fn new(
        name: impl Into<String>,
        gate: impl Into<String>,
        gate_label: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            gate: gate.into(),
            gate_label: gate_label.into(),
            fields: Vec::new(),
            min_items: 0,
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn min_items(mut self, count: usize) -> Self {
        self.min_items = count;
        self
    }
}

/// Position of a question in the traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Index into the fixed fields
    Fixed(usize),
    /// Gate asked while `index` items exist
    Gate { index: usize },
    /// Field `field` of item `index`
    Item { index: usize, field: usize },
    /// Index into the trailing fields
    Trailing(usize),
}

/// One question of the traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub key: QuestionKey,
    pub kind: SlotKind,
}

/// Ordered question set of one wizard step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardModel {
    step: String,
    fields: Vec<FieldSpec>,
    group: Option<RepeatableGroup>,
    trailing: Vec<FieldSpec>,
}

impl WizardModel {
    /// Start building a model for the given step key.
    pub fn builder(step: impl Into<String>) -> WizardModelBuilder {
        WizardModelBuilder {
            step: step.into(),
            fields: Vec::new(),
            group: None,
            trailing: Vec::new(),
        }
    }

    /// Step key this model collects (e.g. `proof`, `pricing`)
    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn group(&self) -> Option<&RepeatableGroup> {
        self.group.as_ref()
    }

    pub fn trailing(&self) -> &[FieldSpec] {
        &self.trailing
    }

    /// Fresh data record with the group's mandatory items materialised.
    pub fn new_data(&self) -> StepData {
        StepData::with_items(self.group.as_ref().map_or(0, |g| g.min_items))
    }

    /// Full traversal for the current data.
    pub fn slots(&self, data: &StepData) -> Vec<Slot> {
        let mut slots = Vec::new();

        for (i, field) in self.fields.iter().enumerate() {
            if self.is_shown(field, data) {
                slots.push(Slot {
                    key: QuestionKey::fixed(field.name.as_str()),
                    kind: SlotKind::Fixed(i),
                });
            }
        }

        if let Some(group) = &self.group {
            for index in 0..data.items.len() {
                if index >= group.min_items {
                    slots.push(Slot {
                        key: QuestionKey::gate(&group.gate, index),
                        kind: SlotKind::Gate { index },
                    });
                }
                for (f, field) in group.fields.iter().enumerate() {
                    slots.push(Slot {
                        key: QuestionKey::item(&group.name, index, &field.name),
                        kind: SlotKind::Item { index, field: f },
                    });
                }
            }
            let open = data.items.len();
            if open >= group.min_items {
                slots.push(Slot {
                    key: QuestionKey::gate(&group.gate, open),
                    kind: SlotKind::Gate { index: open },
                });
            }
        }

        for (i, field) in self.trailing.iter().enumerate() {
            slots.push(Slot {
                key: QuestionKey::fixed(field.name.as_str()),
                kind: SlotKind::Trailing(i),
            });
        }

        slots
    }

    /// First slot of the traversal that is not in `answered`.
    ///
    /// Items are walked in index order, so an item abandoned halfway is
    /// resumed before anything after it.
    pub fn first_unanswered(
        &self,
        data: &StepData,
        answered: &BTreeSet<QuestionKey>,
    ) -> Option<Slot> {
        self.slots(data)
            .into_iter()
            .find(|slot| !answered.contains(&slot.key))
    }

    /// Resolve a key to its slot in the current traversal.
    pub fn locate(&self, key: &QuestionKey, data: &StepData) -> Option<Slot> {
        let kind = match key.shape() {
            KeyShape::Fixed(name) => {
                if let Some(i) = self.fields.iter().position(|f| f.name == name) {
                    if !self.is_shown(&self.fields[i], data) {
                        return None;
                    }
                    SlotKind::Fixed(i)
                } else {
                    SlotKind::Trailing(self.trailing.iter().position(|f| f.name == name)?)
                }
            }
            KeyShape::Item {
                group,
                index,
                field,
            } => {
                let g = self.group.as_ref().filter(|g| g.name == group)?;
                if index >= data.items.len() {
                    return None;
                }
                let f = g.fields.iter().position(|spec| spec.name == field)?;
                SlotKind::Item { index, field: f }
            }
            KeyShape::Gate { gate, index } => {
                let g = self.group.as_ref().filter(|g| g.gate == gate)?;
                if index > data.items.len() || index < g.min_items {
                    return None;
                }
                SlotKind::Gate { index }
            }
        };
        Some(Slot {
            key: key.clone(),
            kind,
        })
    }

    /// Field spec behind a slot; `None` for gates.
    pub fn field(&self, kind: SlotKind) -> Option<&FieldSpec> {
        match kind {
            SlotKind::Fixed(i) => self.fields.get(i),
            SlotKind::Trailing(i) => self.trailing.get(i),
            SlotKind::Item { field, .. } => self.group.as_ref()?.fields.get(field),
            SlotKind::Gate { .. } => None,
        }
    }

    /// Currently stored value for a slot; empty for gates and new entries.
    pub fn stored_value(&self, slot: &Slot, data: &StepData) -> String {
        match slot.kind {
            SlotKind::Gate { .. } => String::new(),
            SlotKind::Item { index, .. } => match slot.key.shape() {
                KeyShape::Item { field, .. } => data.item_value(index, field).to_string(),
                _ => String::new(),
            },
            SlotKind::Fixed(_) | SlotKind::Trailing(_) => {
                data.value(slot.key.as_str()).to_string()
            }
        }
    }

    /// Keys whose completion can be read straight off the data record:
    /// fields holding a non-empty value and gates that created an item.
    pub fn derivable_keys(&self, data: &StepData) -> Vec<QuestionKey> {
        self.slots(data)
            .into_iter()
            .filter(|slot| match slot.kind {
                SlotKind::Gate { index } => index < data.items.len(),
                _ => !self.stored_value(slot, data).trim().is_empty(),
            })
            .map(|slot| slot.key)
            .collect()
    }

    /// Keys of every field of one item, in asking order.
    pub fn item_keys(&self, index: usize) -> Vec<QuestionKey> {
        self.group
            .as_ref()
            .map(|g| {
                g.fields
                    .iter()
                    .map(|f| QuestionKey::item(&g.name, index, &f.name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether a stored item passes every field rule.
    pub fn item_is_valid(&self, data: &StepData, index: usize) -> bool {
        let Some(group) = &self.group else {
            return false;
        };
        index < data.items.len()
            && group
                .fields
                .iter()
                .all(|f| f.accepts_stored(data.item_value(index, &f.name)))
    }

    fn is_shown(&self, field: &FieldSpec, data: &StepData) -> bool {
        field
            .shown_if
            .as_deref()
            .map_or(true, |source| data.has_value(source))
    }
}

/// Builder for [`WizardModel`]; `build()` validates the definition.
#[derive(Debug, Clone)]
pub struct WizardModelBuilder {
    step: String,
    fields: Vec<FieldSpec>,
    group: Option<RepeatableGroup>,
    trailing: Vec<FieldSpec>,
}

impl WizardModelBuilder {
    /// Append a fixed field.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Set the repeatable group.
    pub fn group(mut self, group: RepeatableGroup) -> Self {
        self.group = Some(group);
        self
    }

    /// Append a trailing optional field.
    pub fn trailing(mut self, spec: FieldSpec) -> Self {
        self.trailing.push(spec);
        self
    }

    /// Validate and build the model.
    pub fn build(self) -> CoreResult<WizardModel> {
        if self.step.trim().is_empty() {
            return Err(CoreError::model("Step key cannot be empty"));
        }

        let mut seen = HashSet::new();
        for field in self.fields.iter().chain(self.trailing.iter()) {
            validate_name("Field", &field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(CoreError::model(format!(
                    "Duplicate field name '{}'",
                    field.name
                )));
            }
        }

        for (i, field) in self.fields.iter().enumerate() {
            if let Some(source) = &field.shown_if {
                if !self.fields[..i].iter().any(|f| &f.name == source) {
                    return Err(CoreError::model(format!(
                        "Field '{}' is gated on '{}', which is not an earlier field",
                        field.name, source
                    )));
                }
            }
        }

        for field in &self.trailing {
            if field.is_required() || field.shown_if.is_some() {
                return Err(CoreError::model(format!(
                    "Trailing field '{}' must be optional and ungated",
                    field.name
                )));
            }
        }

        if let Some(group) = &self.group {
            validate_name("Group", &group.name)?;
            validate_name("Gate", &group.gate)?;
            if group.name == group.gate || seen.contains(group.gate.as_str()) {
                return Err(CoreError::model(format!(
                    "Gate name '{}' collides with another name",
                    group.gate
                )));
            }
            if group.fields.is_empty() {
                return Err(CoreError::model(format!(
                    "Group '{}' must declare at least one field",
                    group.name
                )));
            }
            let mut item_names = HashSet::new();
            for field in &group.fields {
                validate_name("Item field", &field.name)?;
                if field.shown_if.is_some() {
                    return Err(CoreError::model(format!(
                        "Item field '{}' cannot be gated",
                        field.name
                    )));
                }
                if !item_names.insert(field.name.as_str()) {
                    return Err(CoreError::model(format!(
                        "Duplicate item field name '{}'",
                        field.name
                    )));
                }
            }
        }

        Ok(WizardModel {
            step: self.step,
            fields: self.fields,
            group: self.group,
            trailing: self.trailing,
        })
    }
}
