mod common;

use std::sync::Arc;

use common::{FailingProvider, StaticProvider};
use llm_runner_core::{ProviderError, ProviderRequest, Runner, RunnerConfig, RunnerError, VecSink};

#[tokio::test]
async fn falls_back_to_the_next_provider_on_a_fatal_error() {
    common::setup();
    let primary = Arc::new(FailingProvider::new("primary", || ProviderError::Auth("bad key".to_string())));
    let backup = Arc::new(StaticProvider::new("backup", "fallback answer"));
    let sink = Arc::new(VecSink::new());

    let runner = Runner::new(vec![primary, backup], RunnerConfig::default())
        .unwrap()
        .with_sink(sink.clone());

    let response = runner.run(ProviderRequest::new("gpt", "hello")).await.unwrap();
    assert_eq!(response.text, "fallback answer");
    assert_eq!(sink.of_type("provider_fallback").len(), 1);
    assert_eq!(sink.of_type("run_metric").len(), 1);
    assert_eq!(
        sink.of_type("run_metric")[0].get("status").and_then(|v| v.as_str()),
        Some("ok")
    );
}

#[tokio::test]
async fn every_provider_failing_returns_all_failed_error() {
    common::setup();
    let only = Arc::new(FailingProvider::new("only", || ProviderError::Auth("bad key".to_string())));
    let sink = Arc::new(VecSink::new());
    let runner = Runner::new(vec![only], RunnerConfig::default()).unwrap().with_sink(sink.clone());

    let err = runner.run(ProviderRequest::new("gpt", "hello")).await.unwrap_err();
    assert!(matches!(err, RunnerError::AllFailed(_)));
    assert_eq!(
        sink.of_type("run_metric")[0].get("status").and_then(|v| v.as_str()),
        Some("error")
    );
}
