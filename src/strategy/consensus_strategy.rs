//! Consensus strategy: invoke every provider concurrently, then hand the
//! observations to the voting engine.

use std::sync::Arc;
use std::time::Instant;

use crate::config::RunnerConfig;
use crate::consensus::{self, ConsensusObservation};
use crate::errors::{FailureSummary, RunnerError};
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
    let total_start = Instant::now();
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

    let observations: Vec<ConsensusObservation> = results
        .into_iter()
        .map(|(i, result)| {
            let provider = &providers[i];
            match result {
                Ok(response) => {
                    let cost = provider.estimate_cost(response.token_usage.prompt, response.token_usage.completion);
                    let latency_ms = response.latency_ms;
                    let mut observation = ConsensusObservation::success(i, provider.name(), response, latency_ms);
                    if let Some(cost) = cost {
                        observation = observation.with_cost_estimate(cost);
                    }
                    observation
                }
                Err(err) => ConsensusObservation::failure(i, provider.name(), err, 0),
            }
        })
        .collect();

    match consensus::compute_consensus(&observations, &config.consensus) {
        Ok(result) => {
            tracing::debug!(
                winner = %result.winning_provider,
                votes = result.votes,
                rounds = result.rounds,
                "consensus reached"
            );
            sink.emit(events::consensus_vote(envelope, &result));
            let cost = providers
                .iter()
                .find(|p| p.name() == result.winning_provider)
                .and_then(|p| p.estimate_cost(result.response.token_usage.prompt, result.response.token_usage.completion));
            sink.emit(events::run_metric(
                envelope,
                "ok",
                providers.len() as u32,
                providers.len() as u32 - 1,
                Some(&result.winning_provider),
                total_start.elapsed().as_millis() as u64,
                Some(&result.response),
                cost,
                None,
            ));
            Ok(result.response)
        }
        Err(mut err) => {
            if err.failures.is_empty() {
                err.failures = observations
                    .iter()
                    .filter_map(|o| {
                        o.error.as_ref().map(|e| FailureSummary {
                            provider: o.provider.clone(),
                            attempt: (o.index + 1) as u32,
                            summary: e.to_string(),
                        })
                    })
                    .collect();
            }
            sink.emit(events::run_metric(envelope, "error", providers.len() as u32, 0, None, 0, None, None, None));
            Err(RunnerError::Parallel(err))
        }
    }
}
