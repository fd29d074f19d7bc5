//! Structured event stream: the abstract sink and its typed record builders.
//!
//! A `serde_json::Value`-backed record so an external exporter can serialize
//! it to JSONL without this crate knowing about wire formats.

use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::config::RunnerMode;
use crate::consensus::ConsensusResult;
use crate::errors::ProviderError;
use crate::response::{ProviderResponse, TokenUsage};

/// One emitted event. Backed by a JSON object so downstream consumers can
/// serialize it directly; construct via the typed builder functions below
/// rather than by hand so call sites cannot typo a field name.
#[derive(Debug, Clone)]
pub struct EventRecord(pub Map<String, Value>);

impl EventRecord {
    pub fn event_type(&self) -> Option<&str> {
        self.0.get("event").and_then(Value::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Sink for emitted events. Implementations must never panic: a sink failure
/// (e.g. a full channel) must be swallowed internally rather than unwinding
/// into the caller's request path, per the shadow/consensus non-fatal
/// sink-failure requirement.
pub trait EventSink: Send + Sync {
    fn emit(&self, record: EventRecord);
}

pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _record: EventRecord) {}
}

/// In-memory sink used by tests to assert on emitted events.
#[derive(Default)]
pub struct VecSink {
    records: Mutex<Vec<EventRecord>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().expect("vec sink mutex poisoned").clone()
    }

    pub fn of_type(&self, event: &str) -> Vec<EventRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.event_type() == Some(event))
            .collect()
    }
}

impl EventSink for VecSink {
    fn emit(&self, record: EventRecord) {
        if let Ok(mut guard) = self.records.lock() {
            guard.push(record);
        }
    }
}

fn now_unix_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn token_usage_value(usage: &TokenUsage) -> Value {
    serde_json::json!({
        "prompt": usage.prompt,
        "completion": usage.completion,
        "total": usage.total(),
    })
}

/// Fields shared by every event emitted for one `Runner::run`/`run_async`
/// call. Cheap to clone; carried by value through the strategy/invoker call
/// chain.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub run_id: String,
    pub request_fingerprint: String,
    pub mode: RunnerMode,
    pub providers: Vec<String>,
    pub shadow_used: bool,
    pub shadow_provider_id: Option<String>,
    /// Caller-supplied correlation IDs, read from `ProviderRequest.metadata`
    /// (`"trace_id"`/`"project_id"` string entries) at envelope construction.
    pub trace_id: Option<String>,
    pub project_id: Option<String>,
    /// Resolved per-call > config > default metrics sink address. Opaque to
    /// this crate; carried for the caller's own sink to route on.
    pub metrics_path: Option<String>,
}

impl EventEnvelope {
    fn base(&self, event: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("event".to_string(), Value::String(event.to_string()));
        map.insert("ts_ms".to_string(), Value::from(now_unix_ms() as u64));
        map.insert("run_id".to_string(), Value::String(self.run_id.clone()));
        map.insert(
            "request_fingerprint".to_string(),
            Value::String(self.request_fingerprint.clone()),
        );
        map.insert("mode".to_string(), Value::String(self.mode.as_str().to_string()));
        map.insert(
            "providers".to_string(),
            Value::Array(self.providers.iter().cloned().map(Value::String).collect()),
        );
        map.insert("shadow_used".to_string(), Value::Bool(self.shadow_used));
        if let Some(shadow_id) = &self.shadow_provider_id {
            map.insert("shadow_provider_id".to_string(), Value::String(shadow_id.clone()));
        }
        if let Some(trace_id) = &self.trace_id {
            map.insert("trace_id".to_string(), Value::String(trace_id.clone()));
        }
        if let Some(project_id) = &self.project_id {
            map.insert("project_id".to_string(), Value::String(project_id.clone()));
        }
        if let Some(metrics_path) = &self.metrics_path {
            map.insert("metrics_path".to_string(), Value::String(metrics_path.clone()));
        }
        map
    }
}

#[allow(clippy::too_many_arguments)]
pub fn provider_call(
    envelope: &EventEnvelope,
    provider: &str,
    attempt: u32,
    total_providers: u32,
    latency_ms: u64,
    response: Option<&ProviderResponse>,
    error: Option<&ProviderError>,
) -> EventRecord {
    let mut map = envelope.base("provider_call");
    map.insert("provider".to_string(), Value::String(provider.to_string()));
    map.insert("provider_id".to_string(), Value::String(provider.to_string()));
    map.insert("attempt".to_string(), Value::from(attempt));
    map.insert("total_providers".to_string(), Value::from(total_providers));
    map.insert("latency_ms".to_string(), Value::from(latency_ms));
    let ok = error.is_none();
    map.insert("ok".to_string(), Value::Bool(ok));
    map.insert(
        "status".to_string(),
        Value::String(if ok { "ok" } else { "error" }.to_string()),
    );
    if let Some(response) = response {
        map.insert("tokens_in".to_string(), Value::from(response.token_usage.prompt));
        map.insert("tokens_out".to_string(), Value::from(response.token_usage.completion));
        map.insert("token_usage".to_string(), token_usage_value(&response.token_usage));
    }
    if let Some(err) = error {
        map.insert("error_type".to_string(), Value::String(err.error_type().to_string()));
        map.insert(
            "error_family".to_string(),
            Value::String(err.family().as_str().to_string()),
        );
        map.insert("error_message".to_string(), Value::String(err.to_string()));
    }
    EventRecord(map)
}

pub fn provider_skipped(envelope: &EventEnvelope, provider: &str, attempt: u32, error: &ProviderError) -> EventRecord {
    let mut map = envelope.base("provider_skipped");
    map.insert("provider".to_string(), Value::String(provider.to_string()));
    map.insert("attempt".to_string(), Value::from(attempt));
    map.insert("error_type".to_string(), Value::String(error.error_type().to_string()));
    map.insert("error_family".to_string(), Value::String("skip".to_string()));
    map.insert("error_message".to_string(), Value::String(error.to_string()));
    EventRecord(map)
}

pub fn provider_fallback(
    envelope: &EventEnvelope,
    provider: &str,
    attempt: u32,
    error: &ProviderError,
) -> EventRecord {
    let mut map = envelope.base("provider_fallback");
    map.insert("provider".to_string(), Value::String(provider.to_string()));
    map.insert("attempt".to_string(), Value::from(attempt));
    map.insert("error_type".to_string(), Value::String(error.error_type().to_string()));
    map.insert(
        "error_family".to_string(),
        Value::String(error.family().as_str().to_string()),
    );
    map.insert("error_message".to_string(), Value::String(error.to_string()));
    EventRecord(map)
}

pub fn provider_chain_failed(
    envelope: &EventEnvelope,
    provider_attempts: u32,
    last_error: &ProviderError,
) -> EventRecord {
    let mut map = envelope.base("provider_chain_failed");
    map.insert("provider_attempts".to_string(), Value::from(provider_attempts));
    map.insert(
        "last_error_type".to_string(),
        Value::String(last_error.error_type().to_string()),
    );
    map.insert(
        "last_error_family".to_string(),
        Value::String(last_error.family().as_str().to_string()),
    );
    map.insert("last_error_message".to_string(), Value::String(last_error.to_string()));
    EventRecord(map)
}

/// `shadow_outcome` classifies how the shadow call itself fared;
/// `diff_kind` classifies how its answer compared to the primary's.
/// A shadow timeout reports `shadow_outcome = "timeout"` with the literal
/// `shadow_error = "ShadowTimeout"`, distinct from any other shadow failure.
pub fn shadow_diff(
    envelope: &EventEnvelope,
    primary_provider: &str,
    shadow_provider: &str,
    primary_result: &Result<ProviderResponse, ProviderError>,
    shadow_result: &Result<ProviderResponse, ProviderError>,
    shadow_duration_ms: u64,
) -> EventRecord {
    let mut map = envelope.base("shadow_diff");
    map.insert("primary_provider".to_string(), Value::String(primary_provider.to_string()));
    map.insert("shadow_provider".to_string(), Value::String(shadow_provider.to_string()));
    map.insert("shadow_provider_id".to_string(), Value::String(shadow_provider.to_string()));
    map.insert("shadow_duration_ms".to_string(), Value::from(shadow_duration_ms));

    let shadow_ok = shadow_result.is_ok();
    map.insert("shadow_ok".to_string(), Value::Bool(shadow_ok));

    let diff_kind = match (primary_result, shadow_result) {
        (_, Err(_)) => "shadow_error",
        (Ok(p), Ok(s)) if p.text == s.text => "match",
        (_, Ok(_)) => "mismatch",
    };
    map.insert("diff_kind".to_string(), Value::String(diff_kind.to_string()));

    let shadow_outcome = match shadow_result {
        Ok(_) => "success",
        Err(ProviderError::ShadowTimeout(_)) => "timeout",
        Err(_) => "error",
    };
    map.insert("shadow_outcome".to_string(), Value::String(shadow_outcome.to_string()));

    if let Err(err) = shadow_result {
        map.insert("shadow_error".to_string(), Value::String(err.exception_name().to_string()));
        map.insert("shadow_error_message".to_string(), Value::String(err.to_string()));
    }

    map.insert(
        "primary_text_len".to_string(),
        Value::from(primary_result.as_ref().map(|r| r.text.len() as u64).unwrap_or(0)),
    );
    map.insert(
        "shadow_text_len".to_string(),
        Value::from(shadow_result.as_ref().map(|r| r.text.len() as u64).unwrap_or(0)),
    );
    map.insert(
        "primary_token_usage_total".to_string(),
        Value::from(primary_result.as_ref().map(|r| r.token_usage.total()).unwrap_or(0)),
    );
    map.insert(
        "shadow_token_usage_total".to_string(),
        Value::from(shadow_result.as_ref().map(|r| r.token_usage.total()).unwrap_or(0)),
    );

    EventRecord(map)
}

pub fn consensus_vote(envelope: &EventEnvelope, result: &ConsensusResult) -> EventRecord {
    let mut map = envelope.base("consensus_vote");
    map.insert("strategy".to_string(), Value::String(result.strategy.as_str().to_string()));
    map.insert("bucket_count".to_string(), Value::from(result.bucket_count as u64));
    map.insert("winning_count".to_string(), Value::from(result.votes));
    map.insert("quorum_met".to_string(), Value::Bool(result.quorum_met));
    map.insert("tie_break_applied".to_string(), Value::Bool(result.tie_break_applied));
    map.insert("rounds".to_string(), Value::from(result.rounds));
    map.insert("abstained".to_string(), Value::from(result.abstained));
    map.insert("schema_checked".to_string(), Value::Bool(result.schema_checked));

    map.insert("voters_total".to_string(), Value::from(result.voters_total as u64));
    map.insert("votes_for".to_string(), Value::from(result.votes_for));
    map.insert("votes_against".to_string(), Value::from(result.votes_against));
    map.insert("winner_provider".to_string(), Value::String(result.winning_provider.clone()));
    map.insert("winner_latency_ms".to_string(), Value::from(result.winner_latency_ms));

    let votes: Map<String, Value> = result
        .votes_by_text
        .iter()
        .map(|(text, count)| (text.clone(), Value::from(*count)))
        .collect();
    map.insert("votes".to_string(), Value::Object(votes));

    let tally: Map<String, Value> = result
        .tally
        .iter()
        .map(|(key, count)| (key.clone(), Value::from(*count)))
        .collect();
    map.insert("tally".to_string(), Value::Object(tally));

    let candidate_summaries: Vec<Value> = result
        .candidate_summaries
        .iter()
        .map(|c| {
            serde_json::json!({
                "provider": c.provider,
                "text": c.text,
                "latency_ms": c.latency_ms,
                "cost_estimate": c.cost_estimate,
            })
        })
        .collect();
    map.insert("candidate_summaries".to_string(), Value::Array(candidate_summaries));

    if let Some(tie_breaker) = result.tie_breaker_selected {
        map.insert("tie_breaker_selected".to_string(), Value::String(tie_breaker.as_str().to_string()));
    }
    if let Some(reason) = &result.tie_break_reason {
        map.insert("tie_break_reason".to_string(), Value::String(reason.clone()));
    }
    if let Some(judge_name) = &result.judge_name {
        map.insert("judge_name".to_string(), Value::String(judge_name.clone()));
    }
    if let Some(judge_score) = result.judge_score {
        map.insert("judge_score".to_string(), Value::from(judge_score));
    }

    EventRecord(map)
}

#[allow(clippy::too_many_arguments)]
pub fn run_metric(
    envelope: &EventEnvelope,
    status: &str,
    attempts: u32,
    retries: u32,
    winning_provider: Option<&str>,
    total_latency_ms: u64,
    response: Option<&ProviderResponse>,
    cost_usd: Option<f64>,
    error: Option<&ProviderError>,
) -> EventRecord {
    let mut map = envelope.base("run_metric");
    map.insert("status".to_string(), Value::String(status.to_string()));
    map.insert(
        "outcome".to_string(),
        Value::String(if status == "ok" { "success" } else { "error" }.to_string()),
    );
    map.insert("attempts".to_string(), Value::from(attempts));
    map.insert("retries".to_string(), Value::from(retries));
    if let Some(provider) = winning_provider {
        map.insert("provider".to_string(), Value::String(provider.to_string()));
        map.insert("provider_id".to_string(), Value::String(provider.to_string()));
    }
    map.insert("total_latency_ms".to_string(), Value::from(total_latency_ms));
    if let Some(response) = response {
        map.insert("tokens_in".to_string(), Value::from(response.token_usage.prompt));
        map.insert("tokens_out".to_string(), Value::from(response.token_usage.completion));
        map.insert("token_usage".to_string(), token_usage_value(&response.token_usage));
    }
    if let Some(cost) = cost_usd {
        map.insert("cost_usd".to_string(), Value::from(cost));
        map.insert("cost_estimate".to_string(), Value::from(cost));
    }
    if let Some(err) = error {
        map.insert("error_type".to_string(), Value::String(err.error_type().to_string()));
        map.insert(
            "error_family".to_string(),
            Value::String(err.family().as_str().to_string()),
        );
    }
    EventRecord(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> EventEnvelope {
        EventEnvelope {
            run_id: "abc".to_string(),
            request_fingerprint: "abc".to_string(),
            mode: RunnerMode::Sequential,
            providers: vec!["p1".to_string(), "p2".to_string()],
            shadow_used: false,
            shadow_provider_id: None,
            trace_id: None,
            project_id: None,
            metrics_path: None,
        }
    }

    #[test]
    fn vec_sink_filters_by_event_type() {
        let sink = VecSink::new();
        let env = envelope();
        sink.emit(provider_call(&env, "p1", 1, 2, 10, None, None));
        sink.emit(run_metric(&env, "ok", 1, 0, Some("p1"), 10, None, None, None));
        assert_eq!(sink.of_type("provider_call").len(), 1);
        assert_eq!(sink.of_type("run_metric").len(), 1);
        assert_eq!(sink.of_type("shadow_diff").len(), 0);
    }

    #[test]
    fn provider_call_carries_error_family_on_failure() {
        let env = envelope();
        let err = ProviderError::RateLimit("slow down".to_string());
        let record = provider_call(&env, "p1", 1, 1, 5, None, Some(&err));
        assert_eq!(record.get("error_family").and_then(Value::as_str), Some("rate_limit"));
        assert_eq!(record.get("status").and_then(Value::as_str), Some("error"));
    }

    #[test]
    fn provider_call_carries_token_usage_on_success() {
        let env = envelope();
        let response = ProviderResponse::new("hi", "gpt").with_token_usage(TokenUsage::new(10, 5));
        let record = provider_call(&env, "p1", 1, 1, 5, Some(&response), None);
        assert_eq!(record.get("tokens_in").and_then(Value::as_u64), Some(10));
        assert_eq!(record.get("tokens_out").and_then(Value::as_u64), Some(5));
        assert_eq!(
            record.get("token_usage").and_then(|v| v.get("total")).and_then(Value::as_u64),
            Some(15)
        );
    }

    #[test]
    fn run_metric_carries_cost_and_outcome() {
        let env = envelope();
        let response = ProviderResponse::new("hi", "gpt").with_token_usage(TokenUsage::new(10, 5));
        let record = run_metric(&env, "ok", 1, 0, Some("p1"), 10, Some(&response), Some(0.002), None);
        assert_eq!(record.get("outcome").and_then(Value::as_str), Some("success"));
        assert_eq!(record.get("cost_usd").and_then(Value::as_f64), Some(0.002));
        assert_eq!(
            record.get("token_usage").and_then(|v| v.get("total")).and_then(Value::as_u64),
            Some(15)
        );
    }

    #[test]
    fn envelope_carries_trace_and_project_id_when_present() {
        let mut env = envelope();
        env.trace_id = Some("trace-1".to_string());
        env.project_id = Some("proj-1".to_string());
        let record = run_metric(&env, "ok", 1, 0, Some("p1"), 10, None, None, None);
        assert_eq!(record.get("trace_id").and_then(Value::as_str), Some("trace-1"));
        assert_eq!(record.get("project_id").and_then(Value::as_str), Some("proj-1"));
    }
}
