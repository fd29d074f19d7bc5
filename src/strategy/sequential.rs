//! Sequential strategy: try providers in declaration order, retrying a
//! retryable/rate-limited provider in place before falling back.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RunnerConfig;
use crate::errors::{AllFailedError, ErrorFamily, ProviderError, RunnerError};
use crate::events::{self, EventEnvelope, EventSink};
use crate::invoker;
use crate::provider::Provider;
use crate::rate_limiter::RateLimiter;
use crate::request::ProviderRequest;
use crate::response::ProviderResponse;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    providers: &[Arc<dyn Provider>],
    config: &RunnerConfig,
    request: &ProviderRequest,
    sink: &Arc<dyn EventSink>,
    envelope: &EventEnvelope,
    limiter: Option<Arc<RateLimiter>>,
    shadow: Option<&Arc<dyn Provider>>,
) -> Result<ProviderResponse, RunnerError> {
    let mut global_attempt = 0u32;
    let mut attempts_trail: Vec<String> = Vec::new();
    let mut last_error: Option<ProviderError> = None;
    let total_providers = providers.len() as u32;

    for provider in providers {
        let mut provider_attempts = 0u32;
        loop {
            global_attempt += 1;
            provider_attempts += 1;
            debug!(provider = provider.name(), attempt = global_attempt, "invoking provider");

            let outcome = invoker::attempt(
                provider,
                shadow,
                limiter.as_deref(),
                sink,
                envelope,
                request,
                global_attempt,
                total_providers,
            )
            .await;

            match outcome {
                Ok(response) => {
                    let cost = provider.estimate_cost(response.token_usage.prompt, response.token_usage.completion);
                    sink.emit(events::run_metric(
                        envelope,
                        "ok",
                        global_attempt,
                        global_attempt - 1,
                        Some(provider.name()),
                        response.latency_ms,
                        Some(&response),
                        cost,
                        None,
                    ));
                    return Ok(response);
                }
                Err(err) => {
                    attempts_trail.push(format!("{} (attempt {provider_attempts})", provider.name()));
                    let family = err.family();
                    let should_retry_same_provider = family.is_retry_eligible() && provider_attempts <= config.max_attempts;

                    if family == ErrorFamily::RateLimit {
                        tokio::time::sleep(std::time::Duration::from_secs_f64(config.backoff.rate_limit_sleep_s)).await;
                    } else if family == ErrorFamily::Retryable && should_retry_same_provider {
                        tokio::time::sleep(std::time::Duration::from_secs_f64(
                            config.backoff.retry_delay_s(provider_attempts),
                        ))
                        .await;
                    }

                    last_error = Some(err);
                    if should_retry_same_provider {
                        continue;
                    }

                    warn!(provider = provider.name(), "falling back to next provider");
                    sink.emit(events::provider_fallback(
                        envelope,
                        provider.name(),
                        global_attempt,
                        last_error.as_ref().unwrap(),
                    ));
                    break;
                }
            }
        }
    }

    let last_error = last_error.unwrap_or(ProviderError::Other("no providers configured".to_string()));
    sink.emit(events::provider_chain_failed(envelope, global_attempt, &last_error));
    sink.emit(events::run_metric(
        envelope,
        "error",
        global_attempt,
        global_attempt.saturating_sub(1),
        None,
        0,
        None,
        None,
        Some(&last_error),
    ));
    Err(RunnerError::AllFailed(AllFailedError {
        attempts: attempts_trail,
        last_error,
    }))
}
