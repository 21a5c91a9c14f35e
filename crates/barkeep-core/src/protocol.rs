//! Domain types exchanged with the remote recommendation service, and
//! the [`SessionApi`] trait the orchestrator calls through.
//!
//! The wire-level JSON shapes live in the HTTP client crate; these are
//! the decoded forms the state machine works with.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// SessionId
// ============================================================================

/// Opaque session identifier issued by the remote service at `/start`.
///
/// Stable for the lifetime of one conversation; replaced when a reset
/// leads to a new start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a raw identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Question and Arity
// ============================================================================

/// Whether a question accepts exactly one selected label or up to three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    /// Exactly one label must be selected to submit.
    Single,
    /// Exactly three labels must be selected to submit.
    Multiple,
}

impl Arity {
    /// The selection count that enables submission.
    #[must_use]
    pub const fn required_selections(&self) -> usize {
        match self {
            Self::Single => 1,
            Self::Multiple => crate::selection::MAX_MULTI_SELECTIONS,
        }
    }
}

/// One quiz question as fetched from the remote service.
///
/// Immutable once fetched; replaced by the next fetched question or
/// cleared at reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// The question text shown to the user.
    pub text: String,

    /// Ordered answer labels the user can toggle.
    pub answers: Vec<String>,

    /// Selection arity rule for this question.
    pub arity: Arity,

    /// `true` when answering this question ends the conversation.
    pub is_final: bool,
}

impl Question {
    /// Returns `true` if `label` is one of this question's answers.
    #[must_use]
    pub fn offers(&self, label: &str) -> bool {
        self.answers.iter().any(|a| a == label)
    }
}

// ============================================================================
// Recommendations
// ============================================================================

/// Where a recommended drink can be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    /// Available at the hosting venue (the service's `drink` payload).
    Venue,
    /// Available at retail (the service's `systembolaget_drink` payload).
    Retail,
}

impl std::fmt::Display for RecommendationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Venue => write!(f, "venue"),
            Self::Retail => write!(f, "retail"),
        }
    }
}

/// Structured drink suggestion returned with the final response.
///
/// Field names mirror the service's JSON keys; unknown extra fields
/// (`pairing`, `occasion`, `category`, ...) are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPayload {
    /// Display name of the drink style.
    #[serde(rename = "Style_Name")]
    pub style_name: String,

    /// Free-text description.
    #[serde(default)]
    pub description: String,

    /// Comma-separated flavor descriptors.
    #[serde(default)]
    pub flavor_profile: String,

    /// Alcohol content in percent.
    #[serde(default)]
    pub alcohol_content: f64,

    /// Name of the bottle/can image resource, if any.
    #[serde(rename = "Image_name", skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,

    /// Name of the icon image resource, if any.
    #[serde(rename = "Image_Icon", skip_serializing_if = "Option::is_none")]
    pub image_icon: Option<String>,
}

impl RecommendationPayload {
    /// Splits `flavor_profile` into trimmed, non-empty descriptors.
    pub fn flavors(&self) -> impl Iterator<Item = &str> {
        self.flavor_profile
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// The recommendation pair attached to a final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    /// Suggestion available at the venue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<RecommendationPayload>,

    /// Suggestion available at retail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retail: Option<RecommendationPayload>,
}

impl Recommendations {
    /// Returns `true` when neither source produced a suggestion.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.venue.is_none() && self.retail.is_none()
    }
}

/// Outcome of submitting an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    /// The assistant's response text.
    pub text: String,

    /// Recommendation pair, present only on the final answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Recommendations>,
}

// ============================================================================
// SessionApi
// ============================================================================

/// Calls the orchestrator makes against the remote recommendation
/// service.
///
/// Implementations perform no retries; a failure is surfaced to the
/// orchestrator, which logs it and halts forward progress on that
/// exchange.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Starts a new session and returns its identifier.
    async fn start(&self) -> Result<SessionId>;

    /// Fetches the next question for `session`.
    ///
    /// Returns `Ok(None)` when the request was dropped because a fetch
    /// for the same session is already outstanding (single-flight
    /// guard); the caller treats that as a no-op, not a failure.
    async fn fetch_question(&self, session: &SessionId) -> Result<Option<Question>>;

    /// Submits the joined answer labels for the current question.
    async fn submit_answer(&self, session: &SessionId, joined_labels: &str)
        -> Result<AnswerOutcome>;

    /// Releases the remote session. Best effort: the orchestrator
    /// proceeds with its local reset even when this fails.
    async fn reset(&self, session: &SessionId) -> Result<()>;
}

#[async_trait]
impl<T: SessionApi + ?Sized> SessionApi for std::sync::Arc<T> {
    async fn start(&self) -> Result<SessionId> {
        self.as_ref().start().await
    }

    async fn fetch_question(&self, session: &SessionId) -> Result<Option<Question>> {
        self.as_ref().fetch_question(session).await
    }

    async fn submit_answer(
        &self,
        session: &SessionId,
        joined_labels: &str,
    ) -> Result<AnswerOutcome> {
        self.as_ref().submit_answer(session, joined_labels).await
    }

    async fn reset(&self, session: &SessionId) -> Result<()> {
        self.as_ref().reset(session).await
    }
}
