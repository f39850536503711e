//! Network chat providers, each behind its own feature

#[cfg(any(feature = "llm-ollama", feature = "llm-openai"))]
mod http;

#[cfg(feature = "llm-ollama")]
pub mod ollama;
#[cfg(feature = "llm-openai")]
pub mod openai;

#[cfg(feature = "llm-ollama")]
pub use ollama::OllamaProvider;
#[cfg(feature = "llm-openai")]
pub use openai::OpenAIProvider;
