//! Reference multi-persona tutoring agent

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

use super::prompts::system_prompt;
use super::router::{IntentRouter, KeywordRouter};
use super::state::AgentStateModel;
use super::Agent;
use crate::error::Result;
use crate::llm::{LLMProvider, LLMRequest};
use crate::tools::{FETCH_PROBLEM_TOOL, ToolSet};
use crate::trace::{AgentMode, EventData, LlmRequestData, LlmResponseData, SessionHandle};

/// Reply used when the model returns nothing
pub const EMPTY_RESPONSE: &str = "No response generated";

/// What the active persona should do with this turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Fetch a practice problem, optionally of a given difficulty
    FetchProblem { difficulty: Option<&'static str> },
    GiveHint,
    Interview,
    StudentSimulation,
    Respond,
}

impl Directive {
    /// Pick the directive for `input` in `mode`.
    ///
    /// In the tutor a hint request wins over a problem request, so "stuck on
    /// this problem" asks for guidance rather than a new problem.
    pub fn for_input(mode: AgentMode, input: &str) -> Self {
        let text = input.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| text.contains(w));

        match mode {
            AgentMode::Interviewer => Directive::Interview,
            AgentMode::Student => Directive::StudentSimulation,
            AgentMode::Router => Directive::Respond,
            AgentMode::Tutor if mentions(&["hint", "stuck"]) => Directive::GiveHint,
            AgentMode::Tutor if mentions(&["problem", "practice", "start"]) => {
                let difficulty = ["easy", "medium", "hard"]
                    .into_iter()
                    .find(|d| text.contains(d));
                Directive::FetchProblem { difficulty }
            }
            AgentMode::Tutor => Directive::Respond,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::FetchProblem { .. } => "fetch_problem",
            Directive::GiveHint => "give_hint",
            Directive::Interview => "interview",
            Directive::StudentSimulation => "student_simulation",
            Directive::Respond => "respond",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Directive::FetchProblem { .. } => {
                "Present the problem below in your own words and ask how the learner would start."
            }
            Directive::GiveHint => {
                "The learner is stuck. Give one small hint phrased as a question; \
                 do not reveal the solution."
            }
            Directive::Interview => "Continue the interview with the next probing question.",
            Directive::StudentSimulation => {
                "Stay in character and react to the teacher's explanation."
            }
            Directive::Respond => "Reply to the learner's message.",
        }
    }

    fn tool_call(&self) -> Option<(&'static str, Value)> {
        match self {
            Directive::FetchProblem { difficulty } => Some((
                FETCH_PROBLEM_TOOL,
                match difficulty {
                    Some(d) => json!({ "difficulty": d }),
                    None => json!({}),
                },
            )),
            _ => None,
        }
    }
}

/// Agent that routes each turn to a persona, optionally fetches a problem,
/// and asks the model for the persona's reply.
pub struct TutorAgent {
    llm: Arc<dyn LLMProvider>,
    tools: ToolSet,
    router: Arc<dyn IntentRouter>,
    temperature: Option<f32>,
}

impl TutorAgent {
    /// Agent using the keyword router
    pub fn new(llm: Arc<dyn LLMProvider>, tools: ToolSet) -> Self {
        Self {
            llm,
            tools,
            router: Arc::new(KeywordRouter::new()),
            temperature: None,
        }
    }

    pub fn with_router(mut self, router: Arc<dyn IntentRouter>) -> Self {
        self.router = router;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    async fn tool_context(
        &self,
        session: &SessionHandle,
        directive: &Directive,
    ) -> Result<Option<String>> {
        let Some((name, args)) = directive.tool_call() else {
            return Ok(None);
        };
        let context = match self.tools.call(session, name, args).await? {
            Ok(value) => format!("Problem data:\n{}", value),
            Err(e) => format!("The problem lookup failed ({}). Continue without it.", e),
        };
        Ok(Some(context))
    }
}

#[async_trait]
impl Agent for TutorAgent {
    async fn respond(&self, session: &SessionHandle, user_text: &str) -> Result<String> {
        let mut state = AgentStateModel::attach(session.clone()).await;
        state.handle_input(user_text, self.router.as_ref()).await?;

        let directive = Directive::for_input(state.mode(), user_text);
        tracing::debug!(
            session_id = %session.session_id(),
            mode = %state.mode(),
            directive = directive.as_str(),
            "turn routed"
        );

        let mut system = format!(
            "{}\n\nInstruction: {}",
            system_prompt(state.mode()),
            directive.instruction()
        );
        if let Some(context) = self.tool_context(session, &directive).await? {
            system.push_str("\n\n");
            system.push_str(&context);
        }

        let mut request = LLMRequest::with_system_prompt(system.as_str(), user_text);
        if let Some(t) = self.temperature {
            request = request.temperature(t);
        }
        session
            .record(
                EventData::LlmRequest(LlmRequestData {
                    mode: state.mode(),
                    directive: directive.as_str().to_string(),
                    system_prompt: system,
                    message: user_text.to_string(),
                }),
                None,
            )
            .await?;

        let started = Instant::now();
        let response = self.llm.generate_request(&request).await?;
        let info = self.llm.model_info();
        session
            .record(
                EventData::LlmResponse(LlmResponseData {
                    content: response.content.clone(),
                    provider: info.provider,
                    model: info.model_name,
                    prompt_tokens: response.usage.map(|u| u.prompt_tokens),
                    completion_tokens: response.usage.map(|u| u.completion_tokens),
                }),
                Some(started.elapsed()),
            )
            .await?;

        let text = match response.content.trim() {
            "" => EMPTY_RESPONSE.to_string(),
            trimmed => trimmed.to_string(),
        };
        state.respond(&text).await?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MaieuticError;
    use crate::llm::ScriptedLlm;
    use crate::llm::scripted::Script;
    use crate::tools::{StubResponse, StubTool, ToolErrorKind};
    use crate::trace::{EventType, TraceRecorder};

    #[test]
    fn test_directive_selection() {
        assert_eq!(
            Directive::for_input(
                AgentMode::Tutor,
                "I'm stuck on this problem, can you give me a hint?"
            ),
            Directive::GiveHint
        );
        assert_eq!(
            Directive::for_input(AgentMode::Tutor, "Give me a Medium problem"),
            Directive::FetchProblem {
                difficulty: Some("medium")
            }
        );
        assert_eq!(
            Directive::for_input(AgentMode::Tutor, "let's start"),
            Directive::FetchProblem { difficulty: None }
        );
        assert_eq!(
            Directive::for_input(AgentMode::Interviewer, "give me a hint"),
            Directive::Interview
        );
        assert_eq!(
            Directive::for_input(AgentMode::Tutor, "what is a trie?"),
            Directive::Respond
        );
    }

    #[tokio::test]
    async fn test_hint_turn_without_tools() {
        let llm = Arc::new(ScriptedLlm::new("What if you tried sorting the array first?"));
        let agent = TutorAgent::new(llm.clone(), ToolSet::new());
        let session = TraceRecorder::default().start_session("hint").await.unwrap();

        let text = agent
            .respond(&session, "I'm stuck on this problem, can you give me a hint?")
            .await
            .unwrap();
        assert_eq!(text, "What if you tried sorting the array first?");

        let trace = session.finalize().await;
        assert!(trace.tool_names().is_empty());
        assert_eq!(trace.final_response().unwrap().mode, AgentMode::Tutor);
        assert!(trace.verify().is_ok());

        let calls = llm.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].system_prompt().unwrap().contains("Socratic"));
    }

    #[tokio::test]
    async fn test_problem_turn_calls_tool() {
        let stub = Arc::new(StubTool::new(
            FETCH_PROBLEM_TOOL,
            StubResponse::success(json!({"title": "Two Sum", "difficulty": "Easy"})),
        ));
        let llm = Arc::new(ScriptedLlm::new(
            "Here is Two Sum. What would a brute force look like?",
        ));
        let agent = TutorAgent::new(llm.clone(), ToolSet::new().with_tool(stub.clone()));
        let session = TraceRecorder::default().start_session("fetch").await.unwrap();

        agent.respond(&session, "Give me an easy problem").await.unwrap();

        assert_eq!(stub.call_history().await, vec![json!({"difficulty": "easy"})]);
        let calls = llm.calls().await;
        assert!(calls[0].system_prompt().unwrap().contains("Two Sum"));

        let trace = session.finalize().await;
        let types: Vec<EventType> = trace.events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            &types[4..],
            &[
                EventType::ToolCall,
                EventType::ToolResponse,
                EventType::LlmRequest,
                EventType::LlmResponse,
                EventType::AgentResponse,
            ]
        );
    }

    #[tokio::test]
    async fn test_tool_failure_does_not_abort_turn() {
        let stub = Arc::new(StubTool::new(
            FETCH_PROBLEM_TOOL,
            StubResponse::error(ToolErrorKind::Transient, "network down"),
        ));
        let agent = TutorAgent::new(
            Arc::new(ScriptedLlm::new("Let's think about a problem together.")),
            ToolSet::new().with_tool(stub),
        );
        let session = TraceRecorder::default().start_session("tool_err").await.unwrap();

        let text = agent.respond(&session, "start a problem").await.unwrap();
        assert_eq!(text, "Let's think about a problem together.");

        let trace = session.finalize().await;
        assert!(!trace.tool_responses().next().unwrap().success);
    }

    #[tokio::test]
    async fn test_empty_model_reply() {
        let agent = TutorAgent::new(Arc::new(ScriptedLlm::new("   ")), ToolSet::new());
        let session = TraceRecorder::default().start_session("empty").await.unwrap();

        let text = agent.respond(&session, "hello").await.unwrap();
        assert_eq!(text, EMPTY_RESPONSE);
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let llm = ScriptedLlm::from_script(Script::default())
            .with_failure("hello", "missing credentials");
        let agent = TutorAgent::new(Arc::new(llm), ToolSet::new());
        let session = TraceRecorder::default().start_session("llm_err").await.unwrap();

        let err = agent.respond(&session, "hello").await.unwrap_err();
        assert!(matches!(err, MaieuticError::Llm(_)));
        assert!(!err.is_structural());
    }

    #[tokio::test]
    async fn test_persona_switch_over_turns() {
        let agent = TutorAgent::new(Arc::new(ScriptedLlm::new("ok")), ToolSet::new());
        let session = TraceRecorder::default().start_session("multi").await.unwrap();

        agent.respond(&session, "interview me").await.unwrap();
        assert_eq!(session.active_mode().await, AgentMode::Interviewer);
        agent.respond(&session, "help!").await.unwrap();
        assert_eq!(session.active_mode().await, AgentMode::Tutor);

        let trace = session.finalize().await;
        assert_eq!(trace.transitions().count(), 2);
        assert!(trace.verify().is_ok());
    }
}
