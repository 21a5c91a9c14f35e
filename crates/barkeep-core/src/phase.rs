//! Conversation phase for the quiz state machine.
//!
//! A single tagged variant replaces the scattered typing/summary/answering
//! flags a UI would otherwise juggle; every such flag is a derived read of
//! the phase, which makes impossible combinations unrepresentable.

use serde::{Deserialize, Serialize};

/// Phase of the quiz conversation.
///
/// The phase moves through these states:
/// - `NotStarted` -> `Starting` -> `AwaitingQuestion` -> `Answering`
/// - `Answering` -> `Submitting` -> `Revealing`
/// - From `Revealing`:
///   - `AwaitingQuestion` (more questions to come)
///   - `Summary` (final question answered; terminal)
/// - `Resetting` is reachable from any phase and returns to `NotStarted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    /// No session has been requested yet.
    #[default]
    NotStarted,
    /// Waiting for the remote service to issue a session id.
    Starting,
    /// Ready to fetch (or fetching) the next question.
    AwaitingQuestion,
    /// A question is current and selections may be toggled.
    Answering,
    /// An answer has been sent; waiting for the service response.
    Submitting,
    /// The response is being revealed on a timed schedule.
    Revealing,
    /// Final recommendation delivered; only reset leaves this phase.
    Summary,
    /// Local state is being cleared and the remote session released.
    Resetting,
}

impl ConversationPhase {
    /// Returns `true` if the conversation has reached its terminal summary.
    ///
    /// # Examples
    ///
    /// ```
    /// use barkeep_core::ConversationPhase;
    ///
    /// assert!(ConversationPhase::Summary.is_summary());
    /// assert!(!ConversationPhase::Revealing.is_summary());
    /// ```
    #[must_use]
    pub const fn is_summary(&self) -> bool {
        matches!(self, Self::Summary)
    }

    /// Returns `true` while a remote call for this phase is in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Starting | Self::Submitting | Self::Resetting)
    }

    /// Returns `true` if selection toggles are meaningful in this phase.
    ///
    /// Toggling is additionally gated by the settle delay; see
    /// [`crate::ConversationSnapshot::can_answer`].
    #[must_use]
    pub const fn accepts_selection(&self) -> bool {
        matches!(self, Self::Answering)
    }
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::AwaitingQuestion => "awaiting_question",
            Self::Answering => "answering",
            Self::Submitting => "submitting",
            Self::Revealing => "revealing",
            Self::Summary => "summary",
            Self::Resetting => "resetting",
        };
        write!(f, "{name}")
    }
}
