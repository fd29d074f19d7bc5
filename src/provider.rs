//! Provider SPI: the seam concrete provider clients plug into.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::request::ProviderRequest;
use crate::response::ProviderResponse;

/// A callable LLM backend. Implementations live outside this crate; this
/// trait is the only contract the runtime depends on.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Capability tags (e.g. "chat", "vision") used by callers to decide
    /// whether a provider is eligible for a given request. Empty by default.
    fn capabilities(&self) -> HashSet<String> {
        HashSet::new()
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Best-effort cost estimate in USD for the given token counts. `None`
    /// when the provider cannot price itself.
    fn estimate_cost(&self, _prompt_tokens: u64, _completion_tokens: u64) -> Option<f64> {
        None
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Duration;

    /// Always succeeds after an optional artificial delay.
    pub struct StaticProvider {
        pub name: String,
        pub text: String,
        pub delay: Duration,
        pub calls: Arc<AtomicUsize>,
    }

    impl StaticProvider {
        pub fn new(name: &str, text: &str) -> Self {
            Self {
                name: name.to_string(),
                text: text.to_string(),
                delay: Duration::from_millis(0),
                calls: Arc::new(AtomicUsize::new(0)),
            }
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
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(ProviderResponse::new(self.text.clone(), request.model.clone()))
        }
    }

    /// Always fails with a configured error.
    pub struct FailingProvider {
        pub name: String,
        pub error: fn() -> ProviderError,
    }

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn invoke(&self, _request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err((self.error)())
        }
    }

    /// Fails `fail_times` times, then succeeds.
    pub struct FlakyProvider {
        pub name: String,
        pub fail_times: usize,
        pub attempts: Arc<AtomicUsize>,
        pub error: fn() -> ProviderError,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_times {
                return Err((self.error)());
            }
            Ok(ProviderResponse::new("ok", request.model.clone()))
        }
    }
}
