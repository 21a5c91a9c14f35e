//! Barkeep Core
//!
//! Conversation state machine, dialog ledger, selection rules, and
//! reveal pacing for the Barkeep drink-recommendation client.

pub mod config;
pub mod dialog;
pub mod error;
pub mod orchestrator;
pub mod phase;
pub mod protocol;
pub mod reveal;
pub mod selection;

pub use config::{Config, ConfigError, Pacing, CONFIG_FILE_NAME};
pub use dialog::{DialogEntry, DialogLedger};
pub use error::{Result, TransportError};
pub use orchestrator::{Conversation, ConversationSnapshot};
pub use phase::ConversationPhase;
pub use protocol::{
    AnswerOutcome, Arity, Question, RecommendationPayload, RecommendationSource, Recommendations,
    SessionApi, SessionId,
};
pub use reveal::RevealScheduler;
pub use selection::{Selection, Toggle, LABEL_SEPARATOR, MAX_MULTI_SELECTIONS};
