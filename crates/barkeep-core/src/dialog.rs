//! Append-only record of conversation turns.
//!
//! The ledger is the source of truth the presentation renders from. It
//! is never mutated in place: entries are appended in order, and the
//! whole ledger is cleared on reset.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::protocol::{RecommendationPayload, RecommendationSource};

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogEntry {
    /// A question fetched from the service.
    Question {
        /// The question text.
        text: String,
    },
    /// The user's submitted answer (joined labels).
    Answer {
        /// The selected labels joined with `", "`.
        text: String,
    },
    /// The assistant's response text.
    Response {
        /// The response text.
        text: String,
    },
    /// A structured drink suggestion attached to the final response.
    Recommendation {
        /// Where the drink can be obtained.
        source: RecommendationSource,
        /// The suggestion payload.
        payload: RecommendationPayload,
    },
}

impl DialogEntry {
    /// Creates a question entry.
    #[must_use]
    pub fn question(text: impl Into<String>) -> Self {
        Self::Question { text: text.into() }
    }

    /// Creates an answer entry.
    #[must_use]
    pub fn answer(text: impl Into<String>) -> Self {
        Self::Answer { text: text.into() }
    }

    /// Creates a response entry.
    #[must_use]
    pub fn response(text: impl Into<String>) -> Self {
        Self::Response { text: text.into() }
    }

    /// Creates a recommendation entry.
    #[must_use]
    pub const fn recommendation(
        source: RecommendationSource,
        payload: RecommendationPayload,
    ) -> Self {
        Self::Recommendation { source, payload }
    }
}

/// Ordered, append-only sequence of [`DialogEntry`] values.
#[derive(Debug, Clone)]
pub struct DialogLedger {
    entries: Vec<DialogEntry>,
    updated_at: DateTime<Utc>,
}

impl Default for DialogLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Appends an entry.
    ///
    /// Appending a `Question` whose text matches the most recent entry
    /// (also a `Question`) is dropped; this guards against a duplicate
    /// fetch effect producing the same question twice in a row. No
    /// other de-duplication occurs.
    pub fn append(&mut self, entry: DialogEntry) {
        if let (Some(DialogEntry::Question { text: last }), DialogEntry::Question { text }) =
            (self.entries.last(), &entry)
        {
            if last == text {
                debug!(question = %text, "Dropping duplicate consecutive question entry");
                return;
            }
        }
        self.entries.push(entry);
        self.updated_at = Utc::now();
    }

    /// The entries in append order.
    #[must_use]
    pub fn entries(&self) -> &[DialogEntry] {
        &self.entries
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.updated_at = Utc::now();
    }

    /// When the ledger last changed.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the ledger holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
