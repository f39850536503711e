//! Persona state machine bound to one trace session

use std::time::{Duration, Instant};

use super::router::{IntentRouter, RoutingDecision};
use crate::error::Result;
use crate::trace::{
    AgentMode, AgentResponseData, EventData, IntentRoutingData, SessionHandle,
    StateTransitionData, UserInputData,
};

/// Tracks the active persona for one session and records every step of a
/// turn: USER_INPUT, INTENT_ROUTING, STATE_TRANSITION, AGENT_RESPONSE.
///
/// The mode only changes through [`transition`](Self::transition), which
/// requires a routing decision recorded earlier in the same turn.
#[derive(Debug)]
pub struct AgentStateModel {
    session: SessionHandle,
    mode: AgentMode,
    turn: u32,
    routed: Option<RoutingDecision>,
}

impl AgentStateModel {
    /// Bind to `session`, resuming from its active mode and turn
    pub async fn attach(session: SessionHandle) -> Self {
        let mode = session.active_mode().await;
        let turn = session.current_turn().await;
        Self {
            session,
            mode,
            turn,
            routed: None,
        }
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Record USER_INPUT and start the next turn
    pub async fn begin_turn(&mut self, input: &str) -> Result<u32> {
        let turn = self.turn + 1;
        self.session
            .record(
                EventData::UserInput(UserInputData {
                    turn,
                    input: input.to_string(),
                }),
                None,
            )
            .await?;
        self.turn = turn;
        self.routed = None;
        Ok(turn)
    }

    /// Record INTENT_ROUTING for the current turn
    pub async fn route(
        &mut self,
        decision: RoutingDecision,
        duration: Option<Duration>,
    ) -> Result<()> {
        self.session
            .record(
                EventData::IntentRouting(IntentRoutingData {
                    turn: self.turn,
                    current_mode: self.mode,
                    target_mode: decision.target,
                    confidence: decision.confidence,
                    reasoning: decision.reasoning.clone(),
                }),
                duration,
            )
            .await?;
        self.routed = Some(decision);
        Ok(())
    }

    /// Move to the routed persona and record STATE_TRANSITION.
    ///
    /// Same-mode transitions are recorded too.
    ///
    /// # Errors
    ///
    /// `StructuralViolation` when nothing was routed this turn; the session is
    /// poisoned.
    pub async fn transition(&mut self) -> Result<AgentMode> {
        let Some(decision) = self.routed.take() else {
            return Err(self
                .session
                .poison(format!(
                    "state transition in turn {} without intent routing",
                    self.turn
                ))
                .await);
        };

        self.session
            .record(
                EventData::StateTransition(StateTransitionData {
                    turn: self.turn,
                    from_mode: self.mode,
                    to_mode: decision.target,
                }),
                None,
            )
            .await?;

        if self.mode != decision.target {
            tracing::debug!(
                session_id = %self.session.session_id(),
                from = %self.mode,
                to = %decision.target,
                "persona changed"
            );
        }
        self.mode = decision.target;
        Ok(self.mode)
    }

    /// Begin a turn, route it with `router` (timed), and transition
    pub async fn handle_input(
        &mut self,
        input: &str,
        router: &dyn IntentRouter,
    ) -> Result<RoutingDecision> {
        self.begin_turn(input).await?;

        let started = Instant::now();
        let decision = router.route(input, self.mode).await?;
        self.route(decision.clone(), Some(started.elapsed())).await?;

        self.transition().await?;
        Ok(decision)
    }

    /// Record AGENT_RESPONSE for the current turn
    pub async fn respond(&self, text: &str) -> Result<u64> {
        self.session
            .record(
                EventData::AgentResponse(AgentResponseData {
                    turn: self.turn,
                    mode: self.mode,
                    response: text.to_string(),
                }),
                None,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::KeywordRouter;
    use crate::error::MaieuticError;
    use crate::trace::{EventType, TraceRecorder};

    #[tokio::test]
    async fn test_handle_input_records_turn() {
        let recorder = TraceRecorder::default();
        let session = recorder.start_session("state").await.unwrap();
        let mut model = AgentStateModel::attach(session.clone()).await;
        assert_eq!(model.mode(), AgentMode::Router);

        let decision = model
            .handle_input("interview me please", &KeywordRouter::new())
            .await
            .unwrap();
        assert_eq!(decision.target, AgentMode::Interviewer);
        assert_eq!(model.mode(), AgentMode::Interviewer);
        model.respond("Let's begin. Describe a hash map.").await.unwrap();

        let trace = session.finalize().await;
        let types: Vec<EventType> = trace.events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec![
                EventType::SessionStart,
                EventType::UserInput,
                EventType::IntentRouting,
                EventType::StateTransition,
                EventType::AgentResponse,
            ]
        );
        assert!(trace.events[2].duration_ms.is_some());
        assert!(trace.verify().is_ok());
    }

    #[tokio::test]
    async fn test_same_mode_transition_is_recorded() {
        let recorder = TraceRecorder::default();
        let session = recorder.start_session("same").await.unwrap();
        let mut model = AgentStateModel::attach(session.clone()).await;
        let router = KeywordRouter::new();

        model.handle_input("hi", &router).await.unwrap();
        model.handle_input("what about heaps?", &router).await.unwrap();
        assert_eq!(model.turn(), 2);

        let trace = session.finalize().await;
        let transitions: Vec<_> = trace.transitions().collect();
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[1].from_mode, AgentMode::Tutor);
        assert_eq!(transitions[1].to_mode, AgentMode::Tutor);
    }

    #[tokio::test]
    async fn test_transition_without_routing() {
        let recorder = TraceRecorder::default();
        let session = recorder.start_session("unrouted").await.unwrap();
        let mut model = AgentStateModel::attach(session.clone()).await;

        model.begin_turn("hello").await.unwrap();
        let err = model.transition().await.unwrap_err();
        assert!(matches!(err, MaieuticError::StructuralViolation { .. }));
        assert_eq!(model.mode(), AgentMode::Router);

        // the session refuses further events
        assert!(model.respond("hi").await.unwrap_err().is_structural());
        assert!(session.violation().await.is_some());
    }

    #[tokio::test]
    async fn test_attach_resumes_mode() {
        let recorder = TraceRecorder::default();
        let session = recorder.start_session("resume").await.unwrap();
        let mut first = AgentStateModel::attach(session.clone()).await;
        first.handle_input("I want to teach", &KeywordRouter::new()).await.unwrap();

        let second = AgentStateModel::attach(session).await;
        assert_eq!(second.mode(), AgentMode::Student);
        assert_eq!(second.turn(), 1);
    }
}
