use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use llm_runner_core::{init_tracing, Provider, ProviderError, ProviderRequest, ProviderResponse};

/// Call at the top of a test body to install a tracing subscriber once per
/// process; cheap and idempotent on repeat calls across test files.
pub fn setup() {
    init_tracing();
}

pub struct StaticProvider {
    pub name: String,
    pub text: String,
    pub delay: Duration,
}

impl StaticProvider {
    pub fn new(name: &str, text: &str) -> Self {
        Self { name: name.to_string(), text: text.to_string(), delay: Duration::ZERO }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(ProviderResponse::new(self.text.clone(), request.model.clone()))
    }
}

pub struct FlakyProvider {
    pub name: String,
    pub fail_times: usize,
    pub attempts: Arc<AtomicUsize>,
}

impl FlakyProvider {
    pub fn new(name: &str, fail_times: usize) -> Self {
        Self { name: name.to_string(), fail_times, attempts: Arc::new(AtomicUsize::new(0)) }
    }
}

#[async_trait]
impl Provider for FlakyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            return Err(ProviderError::RateLimit("slow down".to_string()));
        }
        Ok(ProviderResponse::new("recovered", request.model.clone()))
    }
}

pub struct FailingProvider {
    pub name: String,
    pub make_error: fn() -> ProviderError,
}

impl FailingProvider {
    pub fn new(name: &str, make_error: fn() -> ProviderError) -> Self {
        Self { name: name.to_string(), make_error }
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err((self.make_error)())
    }
}
