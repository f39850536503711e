//! Intent routers
//!
//! A router looks at one user input and the current persona and decides which
//! persona should answer. Routers never touch the session; the state model
//! records their decision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::prompts::INTENT_ROUTER_PROMPT;
use crate::error::Result;
use crate::llm::{LLMProvider, LLMRequest};
use crate::trace::AgentMode;

/// Outcome of intent classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub target: AgentMode,
    /// Confidence (0.0 to 1.0)
    pub confidence: f64,
    pub reasoning: String,
}

impl RoutingDecision {
    pub fn new(target: AgentMode, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            target,
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            reasoning: reasoning.into(),
        }
    }
}

/// Classifies user intent into a target persona
#[async_trait]
pub trait IntentRouter: Send + Sync {
    async fn route(&self, input: &str, current: AgentMode) -> Result<RoutingDecision>;
}

/// Persona to fall back on when no rule fires
fn stay(current: AgentMode) -> AgentMode {
    match current {
        AgentMode::Router => AgentMode::Tutor,
        other => other,
    }
}

struct KeywordRule {
    target: AgentMode,
    phrases: Vec<String>,
    /// Only fire while in one of these modes (any mode if empty)
    from: Vec<AgentMode>,
}

/// Phrase-matching router
#[derive(Default)]
pub struct KeywordRouter {
    rules: Vec<KeywordRule>,
}

impl std::fmt::Debug for KeywordRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordRouter")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl KeywordRouter {
    /// Router with no rules; every input stays in the current persona
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard persona rules
    pub fn new() -> Self {
        Self::empty()
            .with_rule(AgentMode::Interviewer, &["interview me", "mock interview"])
            .with_rule(
                AgentMode::Student,
                &["i want to teach", "student simulator", "let me explain"],
            )
            .with_scoped_rule(
                AgentMode::Tutor,
                &["help"],
                &[AgentMode::Interviewer, AgentMode::Student],
            )
    }

    /// Add a rule; rules are tried in insertion order
    pub fn with_rule(self, target: AgentMode, phrases: &[&str]) -> Self {
        self.with_scoped_rule(target, phrases, &[])
    }

    /// Add a rule that only fires while the session is in one of `from`
    pub fn with_scoped_rule(
        mut self,
        target: AgentMode,
        phrases: &[&str],
        from: &[AgentMode],
    ) -> Self {
        self.rules.push(KeywordRule {
            target,
            phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
            from: from.to_vec(),
        });
        self
    }

    fn classify(&self, input: &str, current: AgentMode) -> RoutingDecision {
        let text = input.to_lowercase();
        for rule in &self.rules {
            if !rule.from.is_empty() && !rule.from.contains(&current) {
                continue;
            }
            if let Some(phrase) = rule.phrases.iter().find(|p| text.contains(p.as_str())) {
                return RoutingDecision::new(rule.target, 1.0, format!("matched '{}'", phrase));
            }
        }

        let target = stay(current);
        RoutingDecision::new(target, 0.5, format!("no routing phrase; continuing as {}", target))
    }
}

#[async_trait]
impl IntentRouter for KeywordRouter {
    async fn route(&self, input: &str, current: AgentMode) -> Result<RoutingDecision> {
        Ok(self.classify(input, current))
    }
}

#[derive(Deserialize)]
struct RouterReply {
    target_agent: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Model-classified router
///
/// Asks the model for `{"target_agent", "reasoning"}` JSON. Any failure (call
/// error, unparsable reply, unknown persona) keeps the current mode with
/// confidence 0.
pub struct LlmRouter {
    llm: Arc<dyn LLMProvider>,
}

impl LlmRouter {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    fn parse(reply: &str) -> Option<RoutingDecision> {
        let body = strip_code_fence(reply);
        let parsed: RouterReply = serde_json::from_str(body).ok()?;
        let target = AgentMode::parse(&parsed.target_agent)?;
        Some(RoutingDecision::new(
            target,
            parsed.confidence.unwrap_or(1.0),
            parsed.reasoning,
        ))
    }
}

#[async_trait]
impl IntentRouter for LlmRouter {
    async fn route(&self, input: &str, current: AgentMode) -> Result<RoutingDecision> {
        let request = LLMRequest::with_system_prompt(
            INTENT_ROUTER_PROMPT,
            format!("User input: {}\nCurrent mode: {}", input, current),
        )
        .temperature(0.0);

        let decision = match self.llm.generate_request(&request).await {
            Ok(response) => Self::parse(&response.content).or_else(|| {
                tracing::warn!(reply = %response.content, "unparsable routing reply");
                None
            }),
            Err(e) => {
                tracing::warn!(error = %e, "routing call failed");
                None
            }
        };

        Ok(decision.unwrap_or_else(|| RoutingDecision::new(current, 0.0, "Error in routing")))
    }
}

/// Strip a surrounding markdown code fence (```json ... ```)
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use crate::llm::scripted::Script;

    #[tokio::test]
    async fn test_keyword_rules() {
        let router = KeywordRouter::new();

        let d = router.route("Please interview me on graphs", AgentMode::Router).await.unwrap();
        assert_eq!(d.target, AgentMode::Interviewer);
        assert_eq!(d.confidence, 1.0);

        let d = router.route("I want to teach you recursion", AgentMode::Tutor).await.unwrap();
        assert_eq!(d.target, AgentMode::Student);

        let d = router
            .route("I'm stuck, can you give me a hint?", AgentMode::Router)
            .await
            .unwrap();
        assert_eq!(d.target, AgentMode::Tutor);
        assert_eq!(d.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_help_only_escapes_other_personas() {
        let router = KeywordRouter::new();

        let d = router.route("help", AgentMode::Interviewer).await.unwrap();
        assert_eq!(d.target, AgentMode::Tutor);
        assert_eq!(d.confidence, 1.0);

        // in the tutor "help" is just a request, not a routing cue
        let d = router.route("help", AgentMode::Tutor).await.unwrap();
        assert_eq!(d.target, AgentMode::Tutor);
        assert_eq!(d.confidence, 0.5);

        let d = router.route("what is a heap?", AgentMode::Student).await.unwrap();
        assert_eq!(d.target, AgentMode::Student);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }

    #[tokio::test]
    async fn test_llm_router_parses_fenced_json() {
        let llm = ScriptedLlm::new(
            "```json\n{\"target_agent\": \"INTERVIEWER\", \"reasoning\": \"asked for an interview\"}\n```",
        );
        let router = LlmRouter::new(Arc::new(llm));

        let d = router.route("quiz me like Google would", AgentMode::Router).await.unwrap();
        assert_eq!(d.target, AgentMode::Interviewer);
        assert_eq!(d.confidence, 1.0);
        assert_eq!(d.reasoning, "asked for an interview");
    }

    #[tokio::test]
    async fn test_llm_router_falls_back_on_failure() {
        let garbage = LlmRouter::new(Arc::new(ScriptedLlm::new("sure, tutor it is")));
        let d = garbage.route("hello", AgentMode::Student).await.unwrap();
        assert_eq!(d.target, AgentMode::Student);
        assert_eq!(d.confidence, 0.0);
        assert_eq!(d.reasoning, "Error in routing");

        let failing = LlmRouter::new(Arc::new(
            ScriptedLlm::from_script(Script::default()).with_failure("hello", "timeout"),
        ));
        let d = failing.route("hello", AgentMode::Tutor).await.unwrap();
        assert_eq!(d.target, AgentMode::Tutor);
        assert_eq!(d.reasoning, "Error in routing");
    }

    #[tokio::test]
    async fn test_llm_router_rejects_unknown_persona() {
        let router = LlmRouter::new(Arc::new(ScriptedLlm::new(
            r#"{"target_agent": "DEBUGGER", "reasoning": "?"}"#,
        )));
        let d = router.route("fix my code", AgentMode::Tutor).await.unwrap();
        assert_eq!(d.target, AgentMode::Tutor);
        assert_eq!(d.confidence, 0.0);
    }
}
