//! Parallel-all strategy: invoke every provider concurrently, wait for all of
//! them, then surface the lowest-index success. Used when the caller wants
//! full per-provider observability (every `provider_call`/`shadow_diff`
//! event fires) while still returning one canonical response.

use std::sync::Arc;

use crate::config::RunnerConfig;
use crate::errors::{FailureSummary, ParallelExecutionError, RunnerError};
use crate::events::{self, EventEnvelope, EventSink};
use crate::invoker;
use crate::parallel::fan_out_all;
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
    let results = fan_out_all(providers.len(), config.max_concurrency, |i| {
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

    let mut failures = Vec::new();
    for (i, result) in &results {
        if let Ok(response) = result {
            let cost = providers[*i].estimate_cost(response.token_usage.prompt, response.token_usage.completion);
            sink.emit(events::run_metric(
                envelope,
                "ok",
                results.len() as u32,
                results.len() as u32 - 1,
                Some(providers[*i].name()),
                response.latency_ms,
                Some(response),
                cost,
                None,
            ));
            return Ok(response.clone());
        }
    }
    for (i, result) in &results {
        if let Err(err) = result {
            failures.push(FailureSummary {
                provider: providers[*i].name().to_string(),
                attempt: (*i + 1) as u32,
                summary: err.to_string(),
            });
        }
    }

    tracing::warn!(failed = failures.len(), "parallel-all had no successful provider");
    sink.emit(events::run_metric(envelope, "error", failures.len() as u32, 0, None, 0, None, None, None));
    Err(RunnerError::Parallel(ParallelExecutionError {
        message: "every provider failed in parallel-all".to_string(),
        failures,
    }))
}
