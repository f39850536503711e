//! Backoff and retry at the model boundary
//!
//! Only transient failures ([`MaieuticError::is_transient`]) are retried;
//! configuration and trace errors surface immediately.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{LLMProvider, LLMRequest, LLMResponse, ModelInfo};
use crate::error::{MaieuticError, Result};

/// How many times to try and how long to wait in between
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts including the first one
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Stretch each delay by up to 25%
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Delays to sleep between attempts; yields `max_attempts - 1` values
    pub fn backoff(&self) -> Backoff<'_> {
        Backoff {
            config: self,
            retry: 0,
        }
    }
}

/// Iterator over retry delays
#[derive(Debug)]
pub struct Backoff<'a> {
    config: &'a RetryConfig,
    retry: usize,
}

impl Iterator for Backoff<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.retry + 1 >= self.config.max_attempts {
            return None;
        }
        let exp = self.config.backoff_multiplier.powi(self.retry as i32);
        let mut delay = self.config.initial_delay.mul_f64(exp).min(self.config.max_delay);
        if self.config.add_jitter {
            delay += delay.mul_f64(0.25 * jitter_fraction());
        }
        self.retry += 1;
        Some(delay)
    }
}

/// Value in [0, 1) from a fresh v4 uuid
fn jitter_fraction() -> f64 {
    let bits = uuid::Uuid::new_v4().as_u128() as u32;
    f64::from(bits) / (f64::from(u32::MAX) + 1.0)
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// the attempts run out.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delays = config.backoff();
    let mut attempt = 1;
    loop {
        let error: MaieuticError = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => e,
        };
        let Some(delay) = delays.next() else {
            return Err(error);
        };
        tracing::warn!(attempt, ?delay, "transient failure, retrying: {}", error);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Wraps a network provider so transient failures are retried
pub struct RetryingProvider {
    inner: Arc<dyn LLMProvider>,
    config: RetryConfig,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LLMProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LLMProvider for RetryingProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let inner = &self.inner;
        with_retry(&self.config, move || inner.generate_request(request)).await
    }

    fn model_info(&self) -> ModelInfo {
        self.inner.model_info()
    }
}
