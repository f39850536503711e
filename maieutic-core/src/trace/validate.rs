//! Structural rules for event order within a session
//!
//! The recorder runs every event through a [`StructureValidator`] before it
//! is appended; [`TraceSession::verify`](super::TraceSession::verify) replays
//! the same rules over a loaded trace.

use super::event::{AgentMode, EventData};

/// Incremental checker for the per-session ordering rules
#[derive(Debug, Clone, Default)]
pub struct StructureValidator {
    started: bool,
    turn: u32,
    active_mode: AgentMode,
    routed_target: Option<AgentMode>,
}

impl StructureValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode the agent is currently in
    pub fn active_mode(&self) -> AgentMode {
        self.active_mode
    }

    /// Current turn (0 before the first user input)
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Check the next event and advance the state on success.
    pub fn check(&mut self, data: &EventData) -> Result<(), String> {
        if let EventData::SessionStart(_) = data {
            if self.started {
                return Err("SESSION_START recorded twice".to_string());
            }
            self.started = true;
            return Ok(());
        }
        if !self.started {
            return Err(format!(
                "{} recorded before SESSION_START",
                data.event_type()
            ));
        }

        match data {
            EventData::UserInput(input) => {
                let expected = self.turn + 1;
                if input.turn != expected {
                    return Err(format!(
                        "USER_INPUT opens turn {} but turn {} was expected",
                        input.turn, expected
                    ));
                }
                self.turn = expected;
                self.routed_target = None;
            }
            EventData::IntentRouting(routing) => {
                self.expect_turn("INTENT_ROUTING", routing.turn)?;
                if routing.current_mode != self.active_mode {
                    return Err(format!(
                        "INTENT_ROUTING reports current mode {} but the session is in {}",
                        routing.current_mode, self.active_mode
                    ));
                }
                if !(0.0..=1.0).contains(&routing.confidence) {
                    return Err(format!(
                        "INTENT_ROUTING confidence {} is outside [0, 1]",
                        routing.confidence
                    ));
                }
                self.routed_target = Some(routing.target_mode);
            }
            EventData::StateTransition(transition) => {
                self.expect_turn("STATE_TRANSITION", transition.turn)?;
                let Some(target) = self.routed_target else {
                    return Err(format!(
                        "STATE_TRANSITION to {} in turn {} without a preceding INTENT_ROUTING",
                        transition.to_mode, transition.turn
                    ));
                };
                if transition.from_mode != self.active_mode {
                    return Err(format!(
                        "STATE_TRANSITION leaves {} but the session is in {}",
                        transition.from_mode, self.active_mode
                    ));
                }
                if transition.to_mode != target {
                    return Err(format!(
                        "STATE_TRANSITION enters {} but routing chose {}",
                        transition.to_mode, target
                    ));
                }
                self.active_mode = transition.to_mode;
                self.routed_target = None;
            }
            EventData::AgentResponse(response) => {
                self.expect_turn("AGENT_RESPONSE", response.turn)?;
                if response.mode != self.active_mode {
                    return Err(format!(
                        "AGENT_RESPONSE attributed to {} but the session is in {}",
                        response.mode, self.active_mode
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn expect_turn(&self, what: &str, turn: u32) -> Result<(), String> {
        if self.turn == 0 {
            return Err(format!("{} recorded before any USER_INPUT", what));
        }
        if turn != self.turn {
            return Err(format!(
                "{} claims turn {} but the current turn is {}",
                what, turn, self.turn
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod validate_tests {
    use super::*;
    use crate::trace::event::{
        IntentRoutingData, SessionStartData, StateTransitionData, UserInputData,
    };

    fn start() -> EventData {
        EventData::SessionStart(SessionStartData {
            session_id: "s".to_string(),
            user_id: None,
        })
    }

    fn input(turn: u32) -> EventData {
        EventData::UserInput(UserInputData {
            turn,
            input: "hi".to_string(),
        })
    }

    fn transition(turn: u32, from: AgentMode, to: AgentMode) -> EventData {
        EventData::StateTransition(StateTransitionData {
            turn,
            from_mode: from,
            to_mode: to,
        })
    }

    fn routing(turn: u32, current: AgentMode, target: AgentMode) -> EventData {
        EventData::IntentRouting(IntentRoutingData {
            turn,
            current_mode: current,
            target_mode: target,
            confidence: 1.0,
            reasoning: String::new(),
        })
    }

    #[test]
    fn test_transition_requires_routing_in_same_turn() {
        let mut v = StructureValidator::new();
        v.check(&start()).unwrap();
        v.check(&input(1)).unwrap();
        v.check(&routing(1, AgentMode::Router, AgentMode::Tutor)).unwrap();
        v.check(&transition(1, AgentMode::Router, AgentMode::Tutor))
            .unwrap();

        // routing from turn 1 does not carry over into turn 2
        v.check(&input(2)).unwrap();
        let err = v
            .check(&transition(2, AgentMode::Tutor, AgentMode::Tutor))
            .unwrap_err();
        assert!(err.contains("without a preceding INTENT_ROUTING"));
    }

    #[test]
    fn test_transition_must_follow_routed_target() {
        let mut v = StructureValidator::new();
        v.check(&start()).unwrap();
        v.check(&input(1)).unwrap();
        v.check(&routing(1, AgentMode::Router, AgentMode::Tutor)).unwrap();
        assert!(
            v.check(&transition(1, AgentMode::Router, AgentMode::Student))
                .is_err()
        );
    }

    #[test]
    fn test_same_mode_transition_is_legal() {
        let mut v = StructureValidator::new();
        v.check(&start()).unwrap();
        v.check(&input(1)).unwrap();
        v.check(&routing(1, AgentMode::Router, AgentMode::Router)).unwrap();
        v.check(&transition(1, AgentMode::Router, AgentMode::Router))
            .unwrap();
        assert_eq!(v.active_mode(), AgentMode::Router);
    }

    #[test]
    fn test_events_before_start_rejected() {
        let mut v = StructureValidator::new();
        assert!(v.check(&input(1)).is_err());
    }

    #[test]
    fn test_turns_are_sequential() {
        let mut v = StructureValidator::new();
        v.check(&start()).unwrap();
        assert!(v.check(&input(2)).is_err());
    }
}
