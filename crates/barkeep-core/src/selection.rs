//! Selection arity rules for the question in progress.
//!
//! Pure logic: no I/O, no clocks. The orchestrator owns one
//! [`Selection`] per current question and clears it on successful
//! submission and on reset.

use serde::Serialize;

use crate::protocol::Arity;

/// Maximum labels a multi-choice selection may hold.
pub const MAX_MULTI_SELECTIONS: usize = 3;

/// Separator used when joining selected labels for submission.
pub const LABEL_SEPARATOR: &str = ", ";

/// Result of attempting to toggle a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// The selection changed.
    Applied,
    /// The toggle was rejected and the selection is unchanged.
    Rejected,
}

/// The set of currently toggled answer labels plus the arity rule
/// being enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    arity: Arity,
    labels: Vec<String>,
}

impl Selection {
    /// Creates an empty selection governed by `arity`.
    #[must_use]
    pub const fn new(arity: Arity) -> Self {
        Self {
            arity,
            labels: Vec::new(),
        }
    }

    /// Toggles `label` under the arity rules.
    ///
    /// Single-choice: re-selecting the held label clears it; selecting
    /// a different label while one is held is rejected (the user must
    /// deselect first); selecting from empty sets the singleton.
    ///
    /// Multi-choice: toggles membership; growth past
    /// [`MAX_MULTI_SELECTIONS`] is rejected; shrink is never capped.
    pub fn toggle(&mut self, label: &str) -> Toggle {
        if let Some(pos) = self.labels.iter().position(|l| l == label) {
            self.labels.remove(pos);
            return Toggle::Applied;
        }

        let accepted = match self.arity {
            Arity::Single => self.labels.is_empty(),
            Arity::Multiple => self.labels.len() < MAX_MULTI_SELECTIONS,
        };
        if accepted {
            self.labels.push(label.to_string());
            Toggle::Applied
        } else {
            Toggle::Rejected
        }
    }

    /// Returns `true` when the selection exactly satisfies the arity
    /// rule: one label for single-choice, three for multi-choice.
    #[must_use]
    pub fn satisfies_arity(&self) -> bool {
        self.labels.len() == self.arity.required_selections()
    }

    /// Returns `true` if `label` is currently toggled on.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// The toggled labels, in toggle order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Joins the toggled labels for submission to the service.
    #[must_use]
    pub fn joined(&self) -> String {
        self.labels.join(LABEL_SEPARATOR)
    }

    /// The arity rule this selection enforces.
    #[must_use]
    pub const fn arity(&self) -> Arity {
        self.arity
    }

    /// Removes every toggled label, keeping the arity rule.
    pub fn clear(&mut self) {
        self.labels.clear();
    }

    /// Number of toggled labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if nothing is toggled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
