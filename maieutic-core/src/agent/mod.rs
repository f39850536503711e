//! Agent state model and the reference tutoring agent
//!
//! Every turn runs through [`AgentStateModel`]: the input is recorded, an
//! [`IntentRouter`] picks the persona, and the transition is recorded before
//! the persona answers. An [`Agent`] is observed only through the events it
//! leaves in its session.

use async_trait::async_trait;

use crate::error::Result;
use crate::trace::SessionHandle;

pub mod prompts;
pub mod router;
pub mod state;
pub mod tutor;

pub use router::{IntentRouter, KeywordRouter, LlmRouter, RoutingDecision};
pub use state::AgentStateModel;
pub use tutor::{Directive, TutorAgent};

/// An agent under evaluation
#[async_trait]
pub trait Agent: Send + Sync {
    /// Handle one user message within `session` and return the final reply
    async fn respond(&self, session: &SessionHandle, user_text: &str) -> Result<String>;
}
