//! LeetCode problem fetcher over the public GraphQL endpoint

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{FETCH_PROBLEM_TOOL, Tool, ToolError, ToolErrorKind, ToolOutput};

const GRAPHQL_URL: &str = "https://leetcode.com/graphql";

const QUESTION_QUERY: &str = r#"
query questionDetail($titleSlug: String!) {
  question(titleSlug: $titleSlug) {
    questionId
    title
    difficulty
    content
    topicTags { name }
    sampleTestCase
  }
}"#;

const EASY: &[&str] = &[
    "two-sum",
    "valid-parentheses",
    "merge-two-sorted-lists",
    "best-time-to-buy-and-sell-stock",
    "valid-anagram",
    "binary-search",
    "climbing-stairs",
    "reverse-linked-list",
    "maximum-depth-of-binary-tree",
    "contains-duplicate",
];

const MEDIUM: &[&str] = &[
    "longest-substring-without-repeating-characters",
    "3sum",
    "group-anagrams",
    "product-of-array-except-self",
    "top-k-frequent-elements",
    "number-of-islands",
    "coin-change",
    "course-schedule",
    "merge-intervals",
    "search-in-rotated-sorted-array",
];

const HARD: &[&str] = &[
    "median-of-two-sorted-arrays",
    "trapping-rain-water",
    "merge-k-sorted-lists",
    "minimum-window-substring",
    "word-ladder",
    "serialize-and-deserialize-binary-tree",
    "largest-rectangle-in-histogram",
    "n-queens",
];

/// Fetches a problem by `slug`, or a random curated one (optionally by
/// `difficulty`) when no slug is given
pub struct LeetCodeTool {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for LeetCodeTool {
    fn default() -> Self {
        Self::new()
    }
}

impl LeetCodeTool {
    pub fn new() -> Self {
        Self::with_endpoint(GRAPHQL_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Pick a slug from the curated list for `difficulty` (all lists if none)
    pub fn pick_slug(difficulty: Option<&str>) -> Result<&'static str, ToolError> {
        let pool: Vec<&'static str> = match difficulty.map(str::to_lowercase).as_deref() {
            None => EASY.iter().chain(MEDIUM).chain(HARD).copied().collect(),
            Some("easy") => EASY.to_vec(),
            Some("medium") => MEDIUM.to_vec(),
            Some("hard") => HARD.to_vec(),
            Some(other) => {
                return Err(ToolError::validation(format!(
                    "unknown difficulty '{}', expected easy, medium or hard",
                    other
                )));
            }
        };
        let index = (uuid::Uuid::new_v4().as_u128() % pool.len() as u128) as usize;
        Ok(pool[index])
    }

    async fn fetch(&self, slug: &str) -> ToolOutput {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Referer", "https://leetcode.com")
            .json(&json!({
                "query": QUESTION_QUERY,
                "variables": {"titleSlug": slug},
            }))
            .send()
            .await
            .map_err(|e| ToolError::new(ToolErrorKind::Transient, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::new(
                ToolErrorKind::Transient,
                format!("LeetCode returned {}", response.status()),
            ));
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| ToolError::new(ToolErrorKind::InvalidResponse, e.to_string()))?;

        let question = body
            .data
            .and_then(|d| d.question)
            .ok_or_else(|| ToolError::not_found(format!("problem '{}' not found", slug)))?;

        Ok(question.into_value(slug))
    }
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<QuestionData>,
}

#[derive(Deserialize)]
struct QuestionData {
    question: Option<Question>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Question {
    question_id: String,
    title: String,
    difficulty: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    topic_tags: Vec<TopicTag>,
    #[serde(default)]
    sample_test_case: Option<String>,
}

#[derive(Deserialize)]
struct TopicTag {
    name: String,
}

impl Question {
    fn into_value(self, slug: &str) -> Value {
        json!({
            "id": self.question_id,
            "slug": slug,
            "title": self.title,
            "difficulty": self.difficulty,
            "topics": self.topic_tags.into_iter().map(|t| t.name).collect::<Vec<_>>(),
            "description": self.content.unwrap_or_default(),
            "sample_test_case": self.sample_test_case,
        })
    }
}

#[async_trait]
impl Tool for LeetCodeTool {
    fn name(&self) -> &str {
        FETCH_PROBLEM_TOOL
    }

    fn description(&self) -> &str {
        "Fetch a LeetCode problem by slug, or a random one of the given difficulty"
    }

    async fn invoke(&self, args: Value) -> ToolOutput {
        let slug = match args.get("slug").and_then(Value::as_str) {
            Some(slug) if !slug.trim().is_empty() => slug.trim().to_lowercase(),
            _ => Self::pick_slug(args.get("difficulty").and_then(Value::as_str))?.to_string(),
        };
        tracing::debug!(slug = %slug, "fetching problem");
        self.fetch(&slug).await
    }
}
