use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::{PaceAction, PaceState};

/// One table cell before and after a temporal-difference update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QEntry {
    pub state: PaceState,
    pub action: PaceAction,
    pub q_before: f64,
    pub q_after: f64,
}

/// Tabular action values. Missing cells read as 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: HashMap<(PaceState, PaceAction), f64>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (PaceState, PaceAction, f64)>) -> Self {
        Self {
            values: entries
                .into_iter()
                .map(|(state, action, value)| ((state, action), value))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, state: &PaceState, action: PaceAction) -> f64 {
        self.values.get(&(*state, action)).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, state: PaceState, action: PaceAction, value: f64) {
        self.values.insert((state, action), value);
    }

    /// Every action's value for `state`, in [`PaceAction::ALL`] order.
    pub fn row(&self, state: &PaceState) -> Vec<(PaceAction, f64)> {
        PaceAction::ALL
            .iter()
            .map(|action| (*action, self.get(state, *action)))
            .collect()
    }

    /// Greedy action; ties go to the earliest action, i.e. `Maintain`.
    pub fn best_action(&self, state: &PaceState) -> PaceAction {
        let mut best = (PaceAction::Maintain, self.get(state, PaceAction::Maintain));
        for (action, value) in self.row(state) {
            if value > best.1 {
                best = (action, value);
            }
        }
        best.0
    }

    pub fn max_value(&self, state: &PaceState) -> f64 {
        self.row(state)
            .into_iter()
            .map(|(_, value)| value)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Epsilon-greedy selection over the row for `state`.
    pub fn choose_action<R: Rng + ?Sized>(
        &self,
        state: &PaceState,
        epsilon: f64,
        rng: &mut R,
    ) -> PaceAction {
        if rng.gen::<f64>() < epsilon {
            if let Some(action) = PaceAction::ALL.choose(rng) {
                return *action;
            }
        }
        self.best_action(state)
    }

    /// `Q(s,a) += alpha * (reward + gamma * max Q(s',.) - Q(s,a))`.
    ///
    /// # Panics
    ///
    /// If `learning_rate` is outside `(0, 1]` or `discount` outside `[0, 1]`.
    pub fn update(
        &mut self,
        state: PaceState,
        action: PaceAction,
        reward: f64,
        next_state: &PaceState,
        learning_rate: f64,
        discount: f64,
    ) -> QEntry {
        assert!(
            learning_rate > 0.0 && learning_rate <= 1.0,
            "learning rate must be within (0, 1], got {learning_rate}"
        );
        assert!(
            (0.0..=1.0).contains(&discount),
            "discount must be within [0, 1], got {discount}"
        );

        let q_before = self.get(&state, action);
        let target = reward + discount * self.max_value(next_state);
        let q_after = q_before + learning_rate * (target - q_before);
        self.set(state, action, q_after);

        QEntry {
            state,
            action,
            q_before,
            q_after,
        }
    }
}
