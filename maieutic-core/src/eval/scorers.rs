//! Metric scorers
//!
//! Each scorer is a pure function of a finalized trace and the test case it
//! was produced for. Scores are always within [0, 1].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::testcase::{TestCase, ToolOrder};
use super::weights::{RESPONSE_MATCH, SOCRATIC_METHOD, TOOL_TRAJECTORY};
use crate::config::ScoringConfig;
use crate::trace::{ToolCallData, TraceSession};

/// A run of terminators that ends a sentence: followed by whitespace or end of text
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("valid regex"));

/// Words whose trailing `.` does not end a sentence
const ABBREVIATIONS: &[&str] = &[
    "e.g", "eg", "i.e", "ie", "vs", "etc", "cf", "approx", "resp", "mr", "mrs", "dr",
];

/// Openers that make a sentence a guiding question even without a `?`
const GUIDING_PHRASES: &[&str] = &[
    "what if",
    "have you considered",
    "think about",
    "what happens",
    "can you",
    "how would",
    "how could",
    "why do",
    "why does",
    "what would",
];

/// Scores one aspect of an agent's behavior
pub trait Scorer: Send + Sync {
    /// Metric name this scorer fills
    fn name(&self) -> &'static str;

    fn score(&self, trace: &TraceSession, case: &TestCase) -> f64;
}

/// Final AGENT_RESPONSE text, empty when there is none
pub fn final_response_text(trace: &TraceSession) -> &str {
    trace
        .final_response()
        .map(|r| r.response.as_str())
        .unwrap_or_default()
}

/// Fraction of expected keywords present, minus anti-pattern penalties
#[derive(Debug, Clone)]
pub struct ResponseMatchScorer {
    anti_pattern_penalty: f64,
}

impl ResponseMatchScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            anti_pattern_penalty: config.anti_pattern_penalty,
        }
    }

    /// Score a response text directly
    pub fn score_text(&self, text: &str, case: &TestCase) -> f64 {
        let lower = text.to_lowercase();
        let base = if case.expected_keywords.is_empty() {
            1.0
        } else {
            let hits = case
                .expected_keywords
                .iter()
                .filter(|k| lower.contains(&k.to_lowercase()))
                .count();
            hits as f64 / case.expected_keywords.len() as f64
        };
        let penalty = self.anti_pattern_penalty * case.anti_patterns_in(text).len() as f64;
        (base - penalty).clamp(0.0, 1.0)
    }
}

impl Default for ResponseMatchScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl Scorer for ResponseMatchScorer {
    fn name(&self) -> &'static str {
        RESPONSE_MATCH
    }

    fn score(&self, trace: &TraceSession, case: &TestCase) -> f64 {
        self.score_text(final_response_text(trace), case)
    }
}

/// Expected tools (and their arguments) versus the TOOL_CALL events
#[derive(Debug, Clone)]
pub struct ToolTrajectoryScorer {
    unexpected_tool_deduction: f64,
    strict_args: bool,
}

impl ToolTrajectoryScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            unexpected_tool_deduction: config.unexpected_tool_deduction,
            strict_args: config.strict_tool_args,
        }
    }

    fn call_matches(&self, expected_name: &str, case: &TestCase, call: &ToolCallData) -> bool {
        if call.tool_name != expected_name {
            return false;
        }
        match case.expected_tool_args.get(expected_name) {
            None => true,
            Some(expected) if self.strict_args => expected == &call.arguments,
            Some(expected) => values_match(expected, &call.arguments),
        }
    }

    /// Number of expectations satisfied; each call satisfies at most one
    fn matched(&self, case: &TestCase, calls: &[&ToolCallData]) -> usize {
        let mut used = vec![false; calls.len()];
        let mut next = 0;
        let mut matched = 0;

        for expected in &case.expected_tools {
            let start = match case.tool_order {
                ToolOrder::Ordered => next,
                ToolOrder::Unordered => 0,
            };
            let found = (start..calls.len())
                .find(|&i| !used[i] && self.call_matches(expected, case, calls[i]));
            if let Some(i) = found {
                used[i] = true;
                next = i + 1;
                matched += 1;
            }
        }
        matched
    }
}

impl Default for ToolTrajectoryScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl Scorer for ToolTrajectoryScorer {
    fn name(&self) -> &'static str {
        TOOL_TRAJECTORY
    }

    fn score(&self, trace: &TraceSession, case: &TestCase) -> f64 {
        let calls: Vec<&ToolCallData> = trace.tool_calls().collect();

        if case.expected_tools.is_empty() {
            let deduction = self.unexpected_tool_deduction * calls.len() as f64;
            return (1.0 - deduction).clamp(0.0, 1.0);
        }

        let matched = self.matched(case, &calls);
        (matched as f64 / case.expected_tools.len() as f64).clamp(0.0, 1.0)
    }
}

/// Recursive subset match: objects match when every expected key matches,
/// arrays element-wise with equal length, scalars by equality
pub fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => exp
            .iter()
            .all(|(k, v)| act.get(k).is_some_and(|av| values_match(v, av))),
        (Value::Array(exp), Value::Array(act)) => {
            exp.len() == act.len() && exp.iter().zip(act).all(|(e, a)| values_match(e, a))
        }
        _ => expected == actual,
    }
}

/// Share of sentences that guide with a question, minus anti-pattern
/// penalties; only applies to Socratic behaviors
#[derive(Debug, Clone)]
pub struct SocraticScorer {
    anti_pattern_penalty: f64,
    behaviors: Vec<String>,
}

impl SocraticScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            anti_pattern_penalty: config.anti_pattern_penalty,
            behaviors: config.socratic_behaviors.clone(),
        }
    }

    /// Whether the rubric applies to `case`
    pub fn applies_to(&self, case: &TestCase) -> bool {
        case.expected_behavior
            .as_deref()
            .is_some_and(|b| self.behaviors.iter().any(|s| s == b))
    }

    /// Questions divided by sentences (0.0 for empty text)
    pub fn question_density(text: &str) -> f64 {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return 0.0;
        }

        let questions = sentences.iter().filter(|s| is_question(s)).count();
        (questions as f64 / sentences.len() as f64).clamp(0.0, 1.0)
    }

    pub fn score_text(&self, text: &str, case: &TestCase) -> f64 {
        if !self.applies_to(case) {
            return 1.0;
        }
        let penalty = self.anti_pattern_penalty * case.anti_patterns_in(text).len() as f64;
        (Self::question_density(text) - penalty).clamp(0.0, 1.0)
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        let terminator = m.as_str().trim_end();
        let sentence = &text[start..m.start() + terminator.len()];
        if terminator == "." && ends_with_abbreviation(sentence) {
            continue;
        }
        sentences.push(sentence.trim());
        start = m.end();
    }
    if start < text.len() {
        sentences.push(text[start..].trim());
    }
    sentences.retain(|s| s.chars().any(char::is_alphanumeric));
    sentences
}

fn ends_with_abbreviation(sentence: &str) -> bool {
    let word = sentence
        .trim_end_matches('.')
        .rsplit(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    ABBREVIATIONS.contains(&word.as_str())
}

fn is_question(sentence: &str) -> bool {
    if sentence.ends_with('?') {
        return true;
    }
    let lower = sentence.to_lowercase();
    GUIDING_PHRASES.iter().any(|p| lower.starts_with(p))
}

impl Default for SocraticScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl Scorer for SocraticScorer {
    fn name(&self) -> &'static str {
        SOCRATIC_METHOD
    }

    fn score(&self, trace: &TraceSession, case: &TestCase) -> f64 {
        self.score_text(final_response_text(trace), case)
    }
}
