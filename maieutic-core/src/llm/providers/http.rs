//! JSON-over-HTTP plumbing shared by the chat providers

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{MaieuticError, Result};
use crate::llm::LLMRequest;

/// `{role, content}` as both chat APIs expect it
#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

pub(crate) fn wire_messages(request: &LLMRequest) -> Vec<WireMessage<'_>> {
    request
        .messages
        .iter()
        .map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect()
}

/// Send `body` and decode the reply.
///
/// Non-2xx statuses become [`MaieuticError::Llm`]; `explain` may pull a
/// readable message out of the error body.
pub(crate) async fn post_json<B, R>(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &B,
    explain: fn(&str) -> Option<String>,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| MaieuticError::Llm(format!("{} unreachable: {}", provider, e)))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let detail = explain(&text).unwrap_or(text);
        tracing::debug!(provider, %status, "model call rejected");
        return Err(MaieuticError::Llm(format!(
            "{} returned {}: {}",
            provider, status, detail
        )));
    }

    response
        .json::<R>()
        .await
        .map_err(|e| MaieuticError::Llm(format!("{} reply could not be decoded: {}", provider, e)))
}
