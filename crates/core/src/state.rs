//! Wizard State
//!
//! Everything one mounted wizard step holds in memory: the data record, the
//! answered/skipped sets, the answer map shown back to the user, the draft
//! in the input box and the sequencer. Also the persisted UI snapshot and the
//! reconciliation that rebuilds a consistent state from it on reload.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classifier::{classify, is_negative, Classification};
use crate::data::StepData;
use crate::error::{CoreError, CoreResult};
use crate::key::QuestionKey;
use crate::model::{SlotKind, WizardModel};
use crate::payload::StepPayload;
use crate::sequencer::{Advance, Sequencer, SequencerState};

// ============================================================================
// Persisted snapshot
// ============================================================================

/// UI state persisted per (session, step) so a reload resumes in place
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedUiState {
    #[serde(default)]
    pub current_question_key: Option<QuestionKey>,
    #[serde(default)]
    pub current_input_value: String,
    #[serde(default)]
    pub answered_questions: Vec<QuestionKey>,
    #[serde(default)]
    pub answers: BTreeMap<QuestionKey, String>,
    #[serde(default)]
    pub is_finalizing: bool,
}

impl PersistedUiState {
    /// Whether the snapshot carries anything worth keeping.
    pub fn is_meaningful(&self) -> bool {
        !self.answered_questions.is_empty()
            || !self.current_input_value.trim().is_empty()
            || self.is_finalizing
    }
}

// ============================================================================
// Answer outcomes
// ============================================================================

/// What accepting an answer did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepted {
    /// A field value was written
    Recorded {
        key: QuestionKey,
        value: String,
        skipped: bool,
    },
    /// A gate was affirmed and a new item created
    ItemAdded {
        gate: QuestionKey,
        index: usize,
        first: QuestionKey,
    },
    /// A gate was declined; the group is closed
    GateDeclined { gate: QuestionKey },
}

/// How a question currently reads in the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerStatus {
    Unanswered,
    Skipped,
    Answered(String),
}

/// Inputs of a reload
#[derive(Debug, Clone, Default)]
pub struct RestoreInput {
    /// The session's saved step data (authoritative)
    pub record: StepData,
    /// Debounced local form data, fills gaps only
    pub cache: Option<StepData>,
    /// Persisted UI snapshot
    pub snapshot: Option<PersistedUiState>,
    /// Whether the backend already marks this step completed
    pub step_completed: bool,
}

/// Result of a reload
#[derive(Debug, Clone)]
pub struct Restored {
    pub state: WizardState,
    /// The snapshot was mid-finalize and the step is not completed yet
    pub resume_finalize: bool,
    /// The persisted pointer was dropped as stale
    pub pointer_discarded: bool,
}

// ============================================================================
// WizardState
// ============================================================================

#[derive(Debug, Clone)]
pub struct WizardState {
    model: Arc<WizardModel>,
    data: StepData,
    answered: BTreeSet<QuestionKey>,
    skipped: BTreeSet<QuestionKey>,
    answers: BTreeMap<QuestionKey, String>,
    draft: String,
    sequencer: Sequencer,
    finalizing: bool,
    completed: bool,
    error: Option<String>,
}

impl WizardState {
    /// Fresh state for a step nobody has touched.
    pub fn new(model: Arc<WizardModel>) -> Self {
        let data = model.new_data();
        Self {
            model,
            data,
            answered: BTreeSet::new(),
            skipped: BTreeSet::new(),
            answers: BTreeMap::new(),
            draft: String::new(),
            sequencer: Sequencer::new(),
            finalizing: false,
            completed: false,
            error: None,
        }
    }

    pub fn model(&self) -> &Arc<WizardModel> {
        &self.model
    }

    pub fn data(&self) -> &StepData {
        &self.data
    }

    pub fn answered(&self) -> &BTreeSet<QuestionKey> {
        &self.answered
    }

    pub fn skipped(&self) -> &BTreeSet<QuestionKey> {
        &self.skipped
    }

    pub fn answers(&self) -> &BTreeMap<QuestionKey, String> {
        &self.answers
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn current(&self) -> &SequencerState {
        self.sequencer.state()
    }

    pub fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_determining(&self) -> bool {
        self.sequencer.is_determining()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Update the text typed for the active question.
    ///
    /// Ignored when nothing is being asked.
    pub fn set_draft(&mut self, text: impl Into<String>) -> bool {
        if self.sequencer.state().active_key().is_none() {
            return false;
        }
        self.draft = text.into();
        true
    }

    /// Apply one answer to the data record and the answered set.
    ///
    /// Validation failures leave every piece of state untouched.
    pub fn accept(&mut self, key: &QuestionKey, raw: &str) -> CoreResult<Accepted> {
        if self.completed {
            return Err(CoreError::validation("This step has already been submitted"));
        }
        let slot = self
            .model
            .locate(key, &self.data)
            .ok_or_else(|| CoreError::not_found(format!("No question '{}' in this step", key)))?;

        let accepted = match slot.kind {
            SlotKind::Gate { index } => self.accept_gate(key, index, raw)?,
            kind => {
                let field = self
                    .model
                    .field(kind)
                    .ok_or_else(|| CoreError::not_found(format!("No field behind '{}'", key)))?;
                let resolved = field.resolve(raw)?;
                let name = field.name.clone();
                match kind {
                    SlotKind::Item { index, .. } => {
                        self.data.set_item_value(index, &name, resolved.value.clone());
                    }
                    _ => self.data.set_value(&name, resolved.value.clone()),
                }
                if resolved.skipped {
                    self.skipped.insert(key.clone());
                } else {
                    self.skipped.remove(key);
                }
                self.answered.insert(key.clone());
                self.answers.insert(key.clone(), resolved.value.clone());
                Accepted::Recorded {
                    key: key.clone(),
                    value: resolved.value,
                    skipped: resolved.skipped,
                }
            }
        };

        if self.sequencer.state().active_key() == Some(key) {
            self.draft.clear();
        }
        self.error = None;
        Ok(accepted)
    }

    fn accept_gate(&mut self, key: &QuestionKey, index: usize, raw: &str) -> CoreResult<Accepted> {
        let label = self
            .model
            .group()
            .map(|g| g.gate_label.clone())
            .unwrap_or_default();
        if index < self.data.items.len() {
            return Err(CoreError::validation(format!(
                "'{}' was already answered",
                label
            )));
        }
        match classify(raw) {
            Classification::Affirmative => {
                let index = self.data.push_item();
                self.answered.insert(key.clone());
                self.answers.insert(key.clone(), "yes".to_string());
                let first = self
                    .model
                    .item_keys(index)
                    .into_iter()
                    .next()
                    .ok_or_else(|| CoreError::model("Repeatable group has no fields"))?;
                Ok(Accepted::ItemAdded {
                    gate: key.clone(),
                    index,
                    first,
                })
            }
            Classification::Skip => {
                self.answered.insert(key.clone());
                self.answers.insert(key.clone(), "no".to_string());
                Ok(Accepted::GateDeclined { gate: key.clone() })
            }
            Classification::Literal(text) => Err(CoreError::validation(format!(
                "Please answer yes or no: {} (got '{}')",
                label, text
            ))),
        }
    }

    /// Take the determining latch.
    pub fn hold(&mut self) -> bool {
        self.sequencer.hold()
    }

    /// Release the determining latch.
    pub fn release(&mut self) {
        self.sequencer.release();
    }

    /// Ask the sequencer for the next question.
    pub fn advance(&mut self) -> Advance {
        let advance = self.sequencer.next(&self.model, &self.data, &self.answered);
        match &advance {
            Advance::Moved(_) => {
                self.draft = match self.sequencer.state() {
                    SequencerState::Asking { prefill, .. } => prefill.clone(),
                    _ => String::new(),
                };
            }
            Advance::Finalize => self.draft.clear(),
            Advance::Busy | Advance::Unchanged => {}
        }
        advance
    }

    /// Jump straight to the first field of a freshly created item.
    pub fn route_to(&mut self, key: QuestionKey) {
        let prefill = self
            .model
            .locate(&key, &self.data)
            .map(|slot| self.model.stored_value(&slot, &self.data))
            .unwrap_or_default();
        self.draft = prefill.clone();
        self.sequencer.route_to(key, prefill);
    }

    pub fn set_finalizing(&mut self, finalizing: bool) {
        self.finalizing = finalizing;
    }

    /// Mark the step submitted; terminal until `restart()`.
    pub fn mark_completed(&mut self) {
        self.completed = true;
        self.finalizing = false;
        self.draft.clear();
        self.error = None;
        self.sequencer.complete();
    }

    /// Every question of the current traversal has been answered.
    pub fn is_fully_answered(&self) -> bool {
        self.model
            .first_unanswered(&self.data, &self.answered)
            .is_none()
    }

    /// Whether there is anything worth persisting.
    pub fn is_meaningful(&self) -> bool {
        !self.answered.is_empty() || !self.draft.trim().is_empty() || self.finalizing
    }

    /// Snapshot for persistence.
    pub fn snapshot(&self) -> PersistedUiState {
        PersistedUiState {
            current_question_key: self.sequencer.state().active_key().cloned(),
            current_input_value: self.draft.clone(),
            answered_questions: self.answered.iter().cloned().collect(),
            answers: self.answers.clone(),
            is_finalizing: self.finalizing,
        }
    }

    /// Payload for submission.
    pub fn payload(&self) -> StepPayload {
        StepPayload::build(&self.model, &self.data, &self.skipped)
    }

    pub fn answer_status(&self, key: &QuestionKey) -> AnswerStatus {
        if !self.answered.contains(key) {
            return AnswerStatus::Unanswered;
        }
        if self.skipped.contains(key) {
            return AnswerStatus::Skipped;
        }
        let value = match self.answers.get(key) {
            Some(value) => value.clone(),
            None => self
                .model
                .locate(key, &self.data)
                .map(|slot| self.model.stored_value(&slot, &self.data))
                .unwrap_or_default(),
        };
        AnswerStatus::Answered(value)
    }

    /// Blank one item and re-ask its fields. The item stays in place.
    pub fn reset_item(&mut self, index: usize) -> CoreResult<()> {
        if self.completed {
            return Err(CoreError::validation("This step has already been submitted"));
        }
        if !self.data.clear_item(index) {
            return Err(CoreError::not_found(format!("No item at position {}", index + 1)));
        }
        for key in self.model.item_keys(index) {
            self.answered.remove(&key);
            self.skipped.remove(&key);
            self.answers.remove(&key);
        }
        self.draft.clear();
        self.finalizing = false;
        self.sequencer.reset();
        Ok(())
    }

    /// Throw everything away and start the step over.
    pub fn restart(&mut self) {
        self.data = self.model.new_data();
        self.answered.clear();
        self.skipped.clear();
        self.answers.clear();
        self.draft.clear();
        self.sequencer.reset();
        self.finalizing = false;
        self.completed = false;
        self.error = None;
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Rebuild state after a reload.
    ///
    /// The saved record wins, then the form-data cache fills gaps, then the
    /// snapshot's own answers fill what is still blank. The answered set is
    /// everything derivable from that data plus the snapshot's answered keys
    /// that still resolve. The persisted pointer is kept only when it still
    /// resolves and is not answered.
    pub fn restore(model: Arc<WizardModel>, input: RestoreInput) -> Restored {
        let mut state = WizardState::new(model.clone());
        let snapshot = input.snapshot.unwrap_or_default();

        let mut data = input.record;
        if let Some(cache) = &input.cache {
            data.fill_gaps_from(cache);
        }
        let min_items = model.group().map_or(0, |g| g.min_items);
        while data.items.len() < min_items {
            data.push_item();
        }
        materialize_affirmed_items(&model, &mut data, &snapshot);
        // Two passes so a gated field can be filled after its source.
        for _ in 0..2 {
            fill_from_answers(&model, &mut data, &snapshot.answers);
        }
        state.data = data;

        if input.step_completed {
            state.answered = model.derivable_keys(&state.data).into_iter().collect();
            state.answers = derived_answers(&model, &state.data, &state.answered);
            state.mark_completed();
            return Restored {
                state,
                resume_finalize: false,
                pointer_discarded: snapshot.current_question_key.is_some(),
            };
        }

        let mut answered: BTreeSet<QuestionKey> =
            model.derivable_keys(&state.data).into_iter().collect();
        for key in &snapshot.answered_questions {
            if model.locate(key, &state.data).is_some() {
                answered.insert(key.clone());
            }
        }

        let mut answers = derived_answers(&model, &state.data, &answered);
        for key in &answered {
            if let Some(value) = snapshot.answers.get(key) {
                answers.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let mut skipped = BTreeSet::new();
        for key in &answered {
            let Some(slot) = model.locate(key, &state.data) else {
                continue;
            };
            let Some(field) = model.field(slot.kind) else {
                continue;
            };
            if field.is_required() {
                continue;
            }
            if is_negative(&model.stored_value(&slot, &state.data)) {
                skipped.insert(key.clone());
            }
        }

        state.answered = answered;
        state.answers = answers;
        state.skipped = skipped;

        let mut pointer_discarded = false;
        if let Some(key) = snapshot.current_question_key {
            match model.locate(&key, &state.data) {
                Some(slot) if !state.answered.contains(&key) => {
                    let prefill = model.stored_value(&slot, &state.data);
                    state.sequencer.route_to(key, prefill);
                    state.draft = snapshot.current_input_value;
                }
                _ => pointer_discarded = true,
            }
        }

        Restored {
            state,
            resume_finalize: snapshot.is_finalizing,
            pointer_discarded,
        }
    }
}

/// Create items whose gate the snapshot recorded as affirmed but which the
/// record and cache never saw.
fn materialize_affirmed_items(model: &WizardModel, data: &mut StepData, snapshot: &PersistedUiState) {
    let Some(group) = model.group() else {
        return;
    };
    loop {
        let gate = QuestionKey::gate(&group.gate, data.items.len());
        let affirmed = snapshot.answered_questions.contains(&gate)
            && snapshot
                .answers
                .get(&gate)
                .map_or(false, |v| matches!(classify(v), Classification::Affirmative));
        if !affirmed {
            break;
        }
        data.push_item();
    }
}

fn fill_from_answers(
    model: &WizardModel,
    data: &mut StepData,
    answers: &BTreeMap<QuestionKey, String>,
) {
    for (key, value) in answers {
        if value.trim().is_empty() {
            continue;
        }
        let Some(slot) = model.locate(key, data) else {
            continue;
        };
        let Some(field) = model.field(slot.kind) else {
            continue;
        };
        if !model.stored_value(&slot, data).trim().is_empty() {
            continue;
        }
        let name = field.name.clone();
        match slot.kind {
            SlotKind::Item { index, .. } => {
                data.set_item_value(index, &name, value.clone());
            }
            _ => data.set_value(&name, value.clone()),
        }
    }
}

fn derived_answers(
    model: &WizardModel,
    data: &StepData,
    answered: &BTreeSet<QuestionKey>,
) -> BTreeMap<QuestionKey, String> {
    let mut answers = BTreeMap::new();
    for key in answered {
        let Some(slot) = model.locate(key, data) else {
            continue;
        };
        let value = match slot.kind {
            SlotKind::Gate { index } if index < data.items.len() => "yes".to_string(),
            SlotKind::Gate { .. } => continue,
            _ => model.stored_value(&slot, data),
        };
        if !value.trim().is_empty() {
            answers.insert(key.clone(), value);
        }
    }
    answers
}
