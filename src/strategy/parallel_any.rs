//! Parallel-any strategy: race every provider, return the first success,
//! cooperatively cancel the rest.

use std::sync::Arc;

use tracing::info;

use crate::config::RunnerConfig;
use crate::errors::{FailureSummary, ParallelExecutionError, ProviderError, RunnerError};
use crate::events::{self, EventEnvelope, EventSink};
use crate::invoker;
use crate::parallel::fan_out_any;
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
    let total_providers = providers.len() as u32;
    let outcome = fan_out_any(providers.len(), config.max_concurrency, |i| {
        let provider = providers[i].clone();
        let shadow = shadow.cloned();
        let sink = sink.clone();
        let envelope = envelope.clone();
        let request = request.clone();
        let limiter = limiter.clone();
        async move {
            invoker::attempt(
                &provider,
                shadow.as_ref(),
                limiter.as_deref(),
                &sink,
                &envelope,
                &request,
                (i + 1) as u32,
                total_providers,
            )
            .await
        }
    })
    .await;

    if let Some((winner_index, response)) = outcome.winner {
        info!(provider = providers[winner_index].name(), "parallel-any winner");
        let cost = providers[winner_index].estimate_cost(response.token_usage.prompt, response.token_usage.completion);
        sink.emit(events::run_metric(
            envelope,
            "ok",
            outcome.failures.len() as u32 + 1,
            outcome.failures.len() as u32,
            Some(providers[winner_index].name()),
            response.latency_ms,
            Some(&response),
            cost,
            None,
        ));
        return Ok(response);
    }

    let failures: Vec<FailureSummary> = outcome
        .failures
        .iter()
        .map(|(i, err)| FailureSummary {
            provider: providers[*i].name().to_string(),
            attempt: (*i + 1) as u32,
            summary: err.to_string(),
        })
        .collect();
    sink.emit(events::run_metric(envelope, "error", failures.len() as u32, 0, None, 0, None, None, None));
    Err(RunnerError::Parallel(ParallelExecutionError {
        message: "every provider failed in parallel-any".to_string(),
        failures,
    }))
}
