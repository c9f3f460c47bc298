//! Sequencer
//!
//! State machine that picks the single next question of a wizard step.
//!
//! Two guards keep it from clobbering the user:
//! - the *determining* latch, held by the submission path from the moment an
//!   answer is applied until the settle delay has elapsed; `next()` reports
//!   `Busy` while it is held
//! - the *idempotent re-ask* check: an active question that is still valid
//!   and unanswered is never recomputed, and a result identical to the
//!   previous one is reported as `Unchanged` (so `Finalize` fires once)

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::data::StepData;
use crate::key::QuestionKey;
use crate::model::WizardModel;

/// Position of the wizard step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SequencerState {
    /// No active question
    #[default]
    Idle,
    /// Waiting for an answer to `key`
    Asking { key: QuestionKey, prefill: String },
    /// Every question answered; submission pending or in progress
    Finalizing,
    /// Step submitted
    Done,
}

impl SequencerState {
    /// Key of the active question, if any
    pub fn active_key(&self) -> Option<&QuestionKey> {
        match self {
            Self::Asking { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Result of one `next()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// A determination is in progress; nothing was computed
    Busy,
    /// The current state stands
    Unchanged,
    /// A new question became active
    Moved(QuestionKey),
    /// All questions are answered; the caller should finalize (signalled once)
    Finalize,
}

#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    state: SequencerState,
    determining: bool,
    last_result: Option<SequencerState>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn is_determining(&self) -> bool {
        self.determining
    }

    /// Take the determining latch. Returns false if someone else holds it.
    pub fn hold(&mut self) -> bool {
        if self.determining {
            return false;
        }
        self.determining = true;
        true
    }

    /// Release the determining latch.
    pub fn release(&mut self) {
        self.determining = false;
    }

    /// Compute the next state from the model, data and answered set.
    pub fn next(
        &mut self,
        model: &WizardModel,
        data: &StepData,
        answered: &BTreeSet<QuestionKey>,
    ) -> Advance {
        if self.determining {
            return Advance::Busy;
        }

        match &self.state {
            SequencerState::Done => return Advance::Unchanged,
            SequencerState::Asking { key, .. }
                if !answered.contains(key) && model.locate(key, data).is_some() =>
            {
                return Advance::Unchanged;
            }
            _ => {}
        }

        let next = match model.first_unanswered(data, answered) {
            Some(slot) => SequencerState::Asking {
                prefill: model.stored_value(&slot, data),
                key: slot.key,
            },
            None => SequencerState::Finalizing,
        };

        if self.last_result.as_ref() == Some(&next) && self.state == next {
            return Advance::Unchanged;
        }

        self.state = next.clone();
        self.last_result = Some(next.clone());
        match next {
            SequencerState::Asking { key, .. } => Advance::Moved(key),
            _ => Advance::Finalize,
        }
    }

    /// Make `key` active without scanning (used right after a gate is affirmed).
    pub fn route_to(&mut self, key: QuestionKey, prefill: String) {
        let state = SequencerState::Asking { key, prefill };
        self.state = state.clone();
        self.last_result = Some(state);
    }

    /// Mark the step submitted.
    pub fn complete(&mut self) {
        self.state = SequencerState::Done;
        self.last_result = Some(SequencerState::Done);
    }

    /// Drop the active question and forget the last result.
    pub fn reset(&mut self) {
        self.state = SequencerState::Idle;
        self.last_result = None;
        self.determining = false;
    }
}
