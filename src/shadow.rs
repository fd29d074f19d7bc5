//! Shadow execution: an optional second provider called alongside the
//! primary purely for comparison, never allowed to affect the primary path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::events::{self, EventEnvelope, EventSink};
use crate::provider::Provider;
use crate::request::ProviderRequest;
use crate::response::ProviderResponse;
use crate::errors::ProviderError;

/// Runs `primary` under its own timeout; if `shadow` is supplied, spawns it
/// concurrently under an independent timeout budget and emits a `shadow_diff`
/// event once it finishes. The shadow's outcome never touches the returned
/// value or latency — it is observed, not awaited inline.
pub async fn run_with_shadow(
    primary: &Arc<dyn Provider>,
    shadow: Option<&Arc<dyn Provider>>,
    request: &ProviderRequest,
    sink: &Arc<dyn EventSink>,
    envelope: &EventEnvelope,
) -> (Result<ProviderResponse, ProviderError>, u64) {
    let primary_timeout = Duration::from_secs_f64(request.timeout_s.max(0.0));
    let primary_name = primary.name().to_string();

    let shadow_handle = shadow.map(|shadow_provider| {
        let shadow_provider = shadow_provider.clone();
        let shadow_request = request.clone();
        let shadow_timeout = primary_timeout;
        tokio::spawn(async move {
            let started = Instant::now();
            let result = match timeout(shadow_timeout, shadow_provider.invoke(&shadow_request)).await {
                Ok(inner) => inner,
                Err(_) => Err(ProviderError::ShadowTimeout("shadow provider timed out".to_string())),
            };
            (result, started.elapsed().as_millis() as u64)
        })
    });

    let started = Instant::now();
    let primary_result = match timeout(primary_timeout, primary.invoke(request)).await {
        Ok(inner) => inner,
        Err(_) => Err(ProviderError::Timeout(format!("{primary_name} timed out"))),
    };
    let primary_latency_ms = started.elapsed().as_millis() as u64;

    if let (Some(handle), Some(shadow_provider)) = (shadow_handle, shadow) {
        let shadow_name = shadow_provider.name().to_string();
        match handle.await {
            Ok((shadow_result, shadow_latency_ms)) => {
                let record = events::shadow_diff(
                    envelope,
                    &primary_name,
                    &shadow_name,
                    &primary_result,
                    &shadow_result,
                    shadow_latency_ms,
                );
                if record.get("diff_kind").and_then(|v| v.as_str()) != Some("match") {
                    tracing::debug!(primary = %primary_name, shadow = %shadow_name, "shadow diverged from primary");
                }
                sink.emit(record);
            }
            Err(_join_err) => {
                // Shadow task panicked or was aborted: record it as a failed
                // shadow without ever touching the primary result.
                let aborted = Err(ProviderError::Other("shadow task did not complete".to_string()));
                sink.emit(events::shadow_diff(
                    envelope,
                    &primary_name,
                    &shadow_name,
                    &primary_result,
                    &aborted,
                    0,
                ));
            }
        }
    }

    (primary_result, primary_latency_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerMode;
    use crate::events::VecSink;
    use crate::provider::test_support::{FailingProvider, StaticProvider};

    fn envelope() -> EventEnvelope {
        EventEnvelope {
            run_id: "r".to_string(),
            request_fingerprint: "fp".to_string(),
            mode: RunnerMode::Sequential,
            providers: vec!["primary".to_string()],
            shadow_used: true,
            shadow_provider_id: Some("shadow".to_string()),
            trace_id: None,
            project_id: None,
            metrics_path: None,
        }
    }

    #[tokio::test]
    async fn shadow_success_matching_text_is_reported_as_match() {
        let primary: Arc<dyn Provider> = Arc::new(StaticProvider::new("primary", "hi"));
        let shadow: Arc<dyn Provider> = Arc::new(StaticProvider::new("shadow", "hi"));
        let sink_concrete = Arc::new(VecSink::new());
        let sink: Arc<dyn EventSink> = sink_concrete.clone();
        let request = ProviderRequest::new("gpt", "hi");
        let (result, _latency) = run_with_shadow(&primary, Some(&shadow), &request, &sink, &envelope()).await;
        assert!(result.is_ok());
        let records = sink_concrete.of_type("shadow_diff");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("diff_kind").and_then(|v| v.as_str()), Some("match"));
    }

    #[tokio::test]
    async fn shadow_failure_never_propagates_to_primary_result() {
        let primary: Arc<dyn Provider> = Arc::new(StaticProvider::new("primary", "hi"));
        let shadow: Arc<dyn Provider> = Arc::new(FailingProvider {
            name: "shadow".to_string(),
            error: || ProviderError::ServerError("boom".to_string()),
        });
        let sink_concrete = Arc::new(VecSink::new());
        let sink: Arc<dyn EventSink> = sink_concrete.clone();
        let request = ProviderRequest::new("gpt", "hi");
        let (result, _latency) = run_with_shadow(&primary, Some(&shadow), &request, &sink, &envelope()).await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().text, "hi");
        let records = sink_concrete.of_type("shadow_diff");
        assert_eq!(records[0].get("diff_kind").and_then(|v| v.as_str()), Some("shadow_error"));
        assert_eq!(records[0].get("shadow_outcome").and_then(|v| v.as_str()), Some("error"));
        assert_eq!(records[0].get("shadow_error").and_then(|v| v.as_str()), Some("RuntimeError"));
    }

    #[tokio::test]
    async fn shadow_success_with_different_text_is_reported_as_mismatch() {
        let primary: Arc<dyn Provider> = Arc::new(StaticProvider::new("primary", "hi"));
        let shadow: Arc<dyn Provider> = Arc::new(StaticProvider::new("shadow", "bye"));
        let sink_concrete = Arc::new(VecSink::new());
        let sink: Arc<dyn EventSink> = sink_concrete.clone();
        let request = ProviderRequest::new("gpt", "hi");
        run_with_shadow(&primary, Some(&shadow), &request, &sink, &envelope()).await;
        let records = sink_concrete.of_type("shadow_diff");
        assert_eq!(records[0].get("diff_kind").and_then(|v| v.as_str()), Some("mismatch"));
        assert_eq!(records[0].get("shadow_outcome").and_then(|v| v.as_str()), Some("success"));
    }

    #[tokio::test]
    async fn shadow_timeout_is_reported_distinctly_from_other_shadow_failures() {
        let primary: Arc<dyn Provider> = Arc::new(StaticProvider::new("primary", "hi"));
        let shadow: Arc<dyn Provider> =
            Arc::new(StaticProvider::new("shadow", "hi").with_delay(std::time::Duration::from_secs(60)));
        let sink_concrete = Arc::new(VecSink::new());
        let sink: Arc<dyn EventSink> = sink_concrete.clone();
        let request = ProviderRequest::new("gpt", "hi").with_timeout_s(0.05);
        run_with_shadow(&primary, Some(&shadow), &request, &sink, &envelope()).await;
        let records = sink_concrete.of_type("shadow_diff");
        assert_eq!(records[0].get("shadow_outcome").and_then(|v| v.as_str()), Some("timeout"));
        assert_eq!(records[0].get("shadow_error").and_then(|v| v.as_str()), Some("ShadowTimeout"));
        assert_eq!(records[0].get("diff_kind").and_then(|v| v.as_str()), Some("shadow_error"));
    }
}
