//! The conversation state machine.
//!
//! [`Conversation`] owns session identity, the current question, the
//! dialog ledger, and the selection in progress. External collaborators
//! (the presentation layer) submit intents — [`start`](Conversation::start),
//! [`toggle`](Conversation::toggle), [`submit`](Conversation::submit),
//! [`reset`](Conversation::reset) — and read immutable
//! [`ConversationSnapshot`]s; they never mutate orchestrator state
//! directly.
//!
//! All transitions are serialized through one mutex. Timed steps
//! (settle, pre-reveal, typing) run in spawned tasks that re-check a
//! generation counter after every await, so a continuation that raced
//! a reset can never mutate the fresh conversation.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Pacing;
use crate::dialog::{DialogEntry, DialogLedger};
use crate::phase::ConversationPhase;
use crate::protocol::{AnswerOutcome, Question, RecommendationSource, SessionApi, SessionId};
use crate::reveal::RevealScheduler;
use crate::selection::{Selection, Toggle};

// ============================================================================
// Snapshot
// ============================================================================

/// Read-only view of the conversation for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    /// Current phase of the state machine.
    pub phase: ConversationPhase,

    /// Dialog entries in append order.
    pub entries: Vec<DialogEntry>,

    /// The question currently awaiting an answer, if any.
    pub question: Option<Question>,

    /// Labels toggled for the current question, in toggle order.
    pub selection: Vec<String>,

    /// `true` once the settle delay has elapsed and toggling is open.
    pub can_answer: bool,

    /// `true` when the selection exactly satisfies the arity rule and
    /// a submit intent would be dispatched.
    pub can_submit: bool,

    /// `true` in the terminal summary phase.
    pub show_summary: bool,

    /// Visual theme hint derived from the opening category pick.
    pub theme: Option<String>,
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug)]
struct State {
    phase: ConversationPhase,
    session: Option<SessionId>,
    current: Option<Question>,
    selection: Option<Selection>,
    ledger: DialogLedger,
    can_answer: bool,
    /// The next submission is the opening category pick: it is not
    /// mirrored into the ledger and instead sets the theme hint.
    opening_choice: bool,
    theme: Option<String>,
    /// Bumped on every reset; async continuations compare against the
    /// value they captured and discard themselves on mismatch.
    generation: u64,
}

impl State {
    fn new() -> Self {
        Self {
            phase: ConversationPhase::NotStarted,
            session: None,
            current: None,
            selection: None,
            ledger: DialogLedger::new(),
            can_answer: false,
            opening_choice: true,
            theme: None,
            generation: 0,
        }
    }

    fn snapshot(&self) -> ConversationSnapshot {
        let can_submit = self.phase == ConversationPhase::Answering
            && self.can_answer
            && self
                .selection
                .as_ref()
                .is_some_and(Selection::satisfies_arity);
        ConversationSnapshot {
            phase: self.phase,
            entries: self.ledger.entries().to_vec(),
            question: self.current.clone(),
            selection: self
                .selection
                .as_ref()
                .map(|s| s.labels().to_vec())
                .unwrap_or_default(),
            can_answer: self.can_answer,
            can_submit,
            show_summary: self.phase.is_summary(),
            theme: self.theme.clone(),
        }
    }
}

// ============================================================================
// Conversation
// ============================================================================

struct Inner<C> {
    client: C,
    pacing: Pacing,
    scheduler: RevealScheduler,
    state: Mutex<State>,
}

/// Orchestrates one quiz conversation against a [`SessionApi`]
/// implementation.
///
/// Cheap to clone; all clones share the same state.
pub struct Conversation<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for Conversation<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> std::fmt::Debug for Conversation<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation").finish_non_exhaustive()
    }
}

impl<C: SessionApi + 'static> Conversation<C> {
    /// Creates a conversation in the `NotStarted` phase.
    #[must_use]
    pub fn new(client: C, pacing: Pacing) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                pacing,
                scheduler: RevealScheduler::new(),
                state: Mutex::new(State::new()),
            }),
        }
    }

    /// Returns a read-only snapshot of the current state.
    pub async fn snapshot(&self) -> ConversationSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    /// Starts the conversation: obtains a session id and fetches the
    /// first question.
    ///
    /// Ignored unless the phase is `NotStarted`. On transport failure
    /// the machine returns to `NotStarted` and waits for another
    /// user-triggered attempt.
    pub async fn start(&self) {
        let generation = {
            let mut s = self.inner.state.lock().await;
            if s.phase != ConversationPhase::NotStarted {
                debug!(phase = %s.phase, "Ignoring start intent");
                return;
            }
            s.phase = ConversationPhase::Starting;
            s.generation
        };

        info!("Starting session");
        match self.inner.client.start().await {
            Ok(session) => {
                let proceed = {
                    let mut s = self.inner.state.lock().await;
                    if s.generation != generation {
                        debug!("Discarding session issued before reset");
                        false
                    } else {
                        info!(session = %session, "Session started");
                        s.session = Some(session);
                        s.phase = ConversationPhase::AwaitingQuestion;
                        true
                    }
                };
                if proceed {
                    self.request_next_question().await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Session start failed");
                let mut s = self.inner.state.lock().await;
                if s.generation == generation && s.phase == ConversationPhase::Starting {
                    s.phase = ConversationPhase::NotStarted;
                }
            }
        }
    }

    /// Toggles `label` in the current selection.
    ///
    /// Rejected outside `Answering`, before the settle delay elapses,
    /// or for labels the current question does not offer; otherwise the
    /// arity rules decide.
    pub async fn toggle(&self, label: &str) -> Toggle {
        let mut s = self.inner.state.lock().await;
        if !s.phase.accepts_selection() || !s.can_answer {
            debug!(phase = %s.phase, can_answer = s.can_answer, "Toggle ignored");
            return Toggle::Rejected;
        }
        let offered = s.current.as_ref().is_some_and(|q| q.offers(label));
        if !offered {
            debug!(label, "Label not offered by current question");
            return Toggle::Rejected;
        }
        match s.selection.as_mut() {
            Some(selection) => selection.toggle(label),
            None => Toggle::Rejected,
        }
    }

    /// Submits the current selection as the answer to the current
    /// question.
    ///
    /// Returns `true` if a submission was dispatched. The very first
    /// submission of a session is the opening category pick: it is not
    /// mirrored into the ledger and instead records the theme hint.
    pub async fn submit(&self) -> bool {
        let (session, joined, was_final, generation) = {
            let mut s = self.inner.state.lock().await;
            if s.phase != ConversationPhase::Answering || !s.can_answer {
                debug!(phase = %s.phase, "Submit ignored");
                return false;
            }
            let satisfied = s
                .selection
                .as_ref()
                .is_some_and(Selection::satisfies_arity);
            if !satisfied {
                debug!("Submit ignored: selection does not satisfy arity");
                return false;
            }
            let (Some(session), Some(selection), Some(question)) =
                (s.session.clone(), s.selection.as_ref(), s.current.as_ref())
            else {
                return false;
            };
            let joined = selection.joined();
            let was_final = question.is_final;
            let first = selection.labels().first().cloned();

            s.can_answer = false;
            s.phase = ConversationPhase::Submitting;
            if s.opening_choice {
                // The opening pick drives the visual theme instead of
                // appearing as a dialog turn.
                s.theme = first;
            } else {
                s.ledger.append(DialogEntry::answer(joined.clone()));
            }
            (session, joined, was_final, s.generation)
        };

        info!(answer = %joined, "Submitting answer");
        let result = self.inner.client.submit_answer(&session, &joined).await;

        let mut s = self.inner.state.lock().await;
        if s.generation != generation {
            debug!("Discarding answer outcome from before reset");
            return true;
        }
        // Matches the original behavior: the opening flag clears after
        // the first attempt even when the call failed.
        s.opening_choice = false;
        match result {
            Ok(outcome) => {
                if let Some(selection) = s.selection.as_mut() {
                    selection.clear();
                }
                s.phase = ConversationPhase::Revealing;
                drop(s);
                self.spawn_reveal(outcome, was_final, generation);
            }
            Err(e) => {
                warn!(error = %e, "Answer submission failed; conversation parked");
                s.phase = ConversationPhase::Answering;
            }
        }
        true
    }

    /// Resets the conversation from any phase.
    ///
    /// Clears the ledger, selection, current question, theme, and
    /// summary state, cancels every pending timed step, and releases
    /// the remote session best-effort. The machine ends in
    /// `NotStarted`; the next [`start`](Self::start) obtains a fresh
    /// session id.
    pub async fn reset(&self) {
        let (session, generation) = {
            let mut s = self.inner.state.lock().await;
            s.generation += 1;
            s.phase = ConversationPhase::Resetting;
            s.current = None;
            s.selection = None;
            s.can_answer = false;
            s.opening_choice = true;
            s.theme = None;
            s.ledger.clear();
            (s.session.take(), s.generation)
        };
        self.inner.scheduler.cancel_pending().await;
        info!("Conversation reset");

        if let Some(session) = session {
            if let Err(e) = self.inner.client.reset(&session).await {
                warn!(error = %e, "Remote reset failed; local state already cleared");
            }
        }

        let mut s = self.inner.state.lock().await;
        if s.generation == generation && s.phase == ConversationPhase::Resetting {
            s.phase = ConversationPhase::NotStarted;
        }
    }

    /// Fetches the next question and arms the settle delay.
    ///
    /// A fetch is only issued from `AwaitingQuestion`; anything else is
    /// a duplicate trigger and is dropped. The HTTP client's
    /// single-flight guard backstops the same rule per session.
    async fn request_next_question(&self) {
        let (session, generation) = {
            let s = self.inner.state.lock().await;
            if s.phase != ConversationPhase::AwaitingQuestion {
                debug!(phase = %s.phase, "Dropping question fetch trigger");
                return;
            }
            let Some(session) = s.session.clone() else {
                return;
            };
            (session, s.generation)
        };

        debug!(session = %session, "Fetching next question");
        match self.inner.client.fetch_question(&session).await {
            Ok(Some(question)) => {
                let armed = {
                    let mut s = self.inner.state.lock().await;
                    if s.generation != generation
                        || s.phase != ConversationPhase::AwaitingQuestion
                    {
                        debug!("Discarding question fetched before reset");
                        false
                    } else {
                        info!(question = %question.text, arity = ?question.arity, "Question received");
                        s.ledger.append(DialogEntry::question(question.text.clone()));
                        s.selection = Some(Selection::new(question.arity));
                        s.current = Some(question);
                        s.can_answer = false;
                        s.phase = ConversationPhase::Answering;
                        true
                    }
                };
                if armed {
                    self.spawn_settle(generation);
                }
            }
            Ok(None) => debug!("Question fetch dropped; another is outstanding"),
            Err(e) => warn!(error = %e, "Question fetch failed; conversation parked"),
        }
    }

    /// Enables answering once the settle delay elapses.
    fn spawn_settle(&self, generation: u64) {
        let conv = self.clone();
        tokio::spawn(async move {
            if !conv.inner.scheduler.pause(conv.inner.pacing.settle()).await {
                return;
            }
            let mut s = conv.inner.state.lock().await;
            if s.generation == generation && s.phase == ConversationPhase::Answering {
                s.can_answer = true;
            }
        });
    }

    /// Runs the timed reveal sequence for one answer outcome:
    /// pre-reveal pause, ledger append, typing pause, then either the
    /// summary transition or the next question fetch.
    fn spawn_reveal(&self, outcome: AnswerOutcome, was_final: bool, generation: u64) {
        let conv = self.clone();
        tokio::spawn(async move {
            let inner = &conv.inner;
            if !inner.scheduler.pause(inner.pacing.pre_reveal()).await {
                return;
            }

            let typing = {
                let mut s = inner.state.lock().await;
                if s.generation != generation || s.phase != ConversationPhase::Revealing {
                    return;
                }
                let recommended = outcome.recommendations.is_some();
                s.ledger.append(DialogEntry::response(outcome.text.clone()));
                if let Some(recommendations) = outcome.recommendations {
                    if let Some(venue) = recommendations.venue {
                        s.ledger.append(DialogEntry::recommendation(
                            RecommendationSource::Venue,
                            venue,
                        ));
                    }
                    if let Some(retail) = recommendations.retail {
                        s.ledger.append(DialogEntry::recommendation(
                            RecommendationSource::Retail,
                            retail,
                        ));
                    }
                }
                inner.pacing.typing_duration(outcome.text.len(), recommended)
            };

            if !inner.scheduler.pause(typing).await {
                return;
            }

            let fetch_next = {
                let mut s = inner.state.lock().await;
                if s.generation != generation || s.phase != ConversationPhase::Revealing {
                    return;
                }
                if was_final {
                    info!("Final answer revealed; entering summary");
                    s.phase = ConversationPhase::Summary;
                    false
                } else {
                    s.phase = ConversationPhase::AwaitingQuestion;
                    true
                }
            };
            if fetch_next {
                conv.request_next_question().await;
            }
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
