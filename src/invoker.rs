//! Single-attempt provider invocation: rate-limit, call (with optional
//! shadow), classify, and emit the `provider_call`/`provider_skipped` events.

use std::sync::Arc;

use crate::errors::ProviderError;
use crate::events::{self, EventEnvelope, EventSink};
use crate::provider::Provider;
use crate::rate_limiter::RateLimiter;
use crate::request::ProviderRequest;
use crate::response::ProviderResponse;
use crate::shadow;

#[allow(clippy::too_many_arguments)]
pub async fn attempt(
    provider: &Arc<dyn Provider>,
    shadow_provider: Option<&Arc<dyn Provider>>,
    limiter: Option<&RateLimiter>,
    sink: &Arc<dyn EventSink>,
    envelope: &EventEnvelope,
    request: &ProviderRequest,
    attempt_no: u32,
    total_providers: u32,
) -> Result<ProviderResponse, ProviderError> {
    if let Some(limiter) = limiter {
        limiter.acquire().await;
    }

    let (result, latency_ms) = shadow::run_with_shadow(provider, shadow_provider, request, sink, envelope).await;

    match &result {
        Ok(_) => tracing::debug!(provider = provider.name(), attempt_no, latency_ms, "provider call ok"),
        Err(err) => tracing::warn!(provider = provider.name(), attempt_no, error = %err, "provider call failed"),
    }

    sink.emit(events::provider_call(
        envelope,
        provider.name(),
        attempt_no,
        total_providers,
        latency_ms,
        result.as_ref().ok(),
        result.as_ref().err(),
    ));

    if let Err(err) = &result {
        if err.family() == crate::errors::ErrorFamily::Skip {
            sink.emit(events::provider_skipped(envelope, provider.name(), attempt_no, err));
        }
    }

    result
}
