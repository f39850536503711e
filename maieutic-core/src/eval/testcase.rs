//! Test case definitions
//!
//! A test set is a JSON or YAML document holding either a bare array of test
//! cases or an object with a `test_cases` array.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{MaieuticError, Result};

/// Problem difficulty label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// How `expected_tools` is matched against the calls made
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOrder {
    /// Each expected tool must appear somewhere
    #[default]
    Unordered,
    /// Expected tools must appear as a subsequence of the calls
    Ordered,
}

/// One scripted interaction and what a good answer looks like
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    /// User message submitted to the agent
    pub input: String,

    /// Phrases a good response contains (case-insensitive)
    #[serde(default)]
    pub expected_keywords: Vec<String>,

    /// Tools the agent is expected to call
    #[serde(default)]
    pub expected_tools: Vec<String>,

    #[serde(default)]
    pub tool_order: ToolOrder,

    /// Tool name -> argument subset the call must contain
    #[serde(default)]
    pub expected_tool_args: BTreeMap<String, Value>,

    /// Rubric label, e.g. `socratic_hint`
    #[serde(default)]
    pub expected_behavior: Option<String>,

    /// Phrases that must not appear in the response
    #[serde(default)]
    pub anti_patterns: Vec<String>,

    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input: input.into(),
            expected_keywords: Vec::new(),
            expected_tools: Vec::new(),
            tool_order: ToolOrder::Unordered,
            expected_tool_args: BTreeMap::new(),
            expected_behavior: None,
            anti_patterns: Vec::new(),
            difficulty: None,
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.expected_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.expected_tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_tool_args(mut self, tool: impl Into<String>, args: Value) -> Self {
        self.expected_tool_args.insert(tool.into(), args);
        self
    }

    pub fn with_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.expected_behavior = Some(behavior.into());
        self
    }

    pub fn with_anti_patterns(mut self, patterns: &[&str]) -> Self {
        self.anti_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn ordered(mut self) -> Self {
        self.tool_order = ToolOrder::Ordered;
        self
    }

    /// Anti-patterns present in `text` (case-insensitive)
    pub fn anti_patterns_in<'a>(&'a self, text: &str) -> Vec<&'a str> {
        let lower = text.to_lowercase();
        self.anti_patterns
            .iter()
            .filter(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
            .map(String::as_str)
            .collect()
    }

    fn validate(&self, index: usize) -> Result<()> {
        let field_error = |field: &str| {
            MaieuticError::Configuration(format!(
                "test case #{} ({}): {} must not be empty",
                index,
                if self.id.is_empty() { "?" } else { self.id.as_str() },
                field
            ))
        };
        if self.id.trim().is_empty() {
            return Err(field_error("id"));
        }
        if self.name.trim().is_empty() {
            return Err(field_error("name"));
        }
        if self.input.trim().is_empty() {
            return Err(field_error("input"));
        }
        for (tool, args) in &self.expected_tool_args {
            if !args.is_object() {
                return Err(MaieuticError::Configuration(format!(
                    "test case {}: expected_tool_args.{} must be an object",
                    self.id, tool
                )));
            }
        }
        Ok(())
    }
}

/// A validated, immutable set of test cases
#[derive(Debug, Clone, PartialEq)]
pub struct TestSet {
    cases: Vec<TestCase>,
    digest: String,
}

impl TestSet {
    /// Build a set, rejecting empty required fields and duplicate ids
    pub fn new(cases: Vec<TestCase>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (index, case) in cases.iter().enumerate() {
            case.validate(index)?;
            if !seen.insert(case.id.as_str()) {
                return Err(MaieuticError::Configuration(format!(
                    "duplicate test case id '{}'",
                    case.id
                )));
            }
        }
        let digest = digest_of(&cases)?;
        Ok(Self { cases, digest })
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MaieuticError::Configuration(format!(
                "cannot read test cases {}: {}",
                path.display(),
                e
            ))
        })?;

        let document: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content).map_err(|e| {
                MaieuticError::Configuration(format!(
                    "invalid test cases {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };

        let list = match document {
            Value::Object(mut map) => map.remove("test_cases").ok_or_else(|| {
                MaieuticError::Configuration(format!(
                    "{}: expected an array or an object with 'test_cases'",
                    path.display()
                ))
            })?,
            other => other,
        };
        let cases: Vec<TestCase> = serde_json::from_value(list).map_err(|e| {
            MaieuticError::Configuration(format!("invalid test cases {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), count = cases.len(), "loaded test cases");
        Self::new(cases)
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.id == id)
    }

    /// SHA-256 of the canonical JSON form, hex encoded
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn digest_of(cases: &[TestCase]) -> Result<String> {
    let bytes = serde_json::to_vec(cases)?;
    let hash = Sha256::digest(&bytes);
    Ok(hash.iter().map(|b| format!("{:02x}", b)).collect())
}
