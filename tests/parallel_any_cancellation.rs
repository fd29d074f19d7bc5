mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::StaticProvider;
use llm_runner_core::{Provider, ProviderError, ProviderRequest, ProviderResponse, Runner, RunnerConfig, RunnerMode};

struct CancellationProbe {
    name: String,
    ran_to_completion: Arc<AtomicBool>,
}

#[async_trait]
impl Provider for CancellationProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.ran_to_completion.store(true, Ordering::SeqCst);
        Ok(ProviderResponse::new("slow", request.model.clone()))
    }
}

#[tokio::test]
async fn parallel_any_returns_as_soon_as_the_fastest_provider_answers() {
    common::setup();
    let fast = Arc::new(StaticProvider::new("fast", "quick answer").with_delay(Duration::from_millis(5)));
    let ran_to_completion = Arc::new(AtomicBool::new(false));
    let slow = Arc::new(CancellationProbe {
        name: "slow".to_string(),
        ran_to_completion: ran_to_completion.clone(),
    });

    let config = RunnerConfig::default().with_mode(RunnerMode::ParallelAny).with_max_concurrency(2);
    let runner = Runner::new(vec![fast, slow], config).unwrap();

    let started = tokio::time::Instant::now();
    let response = runner.run(ProviderRequest::new("gpt", "hi")).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(response.text, "quick answer");
    assert!(elapsed < Duration::from_millis(150), "wall time should be bounded by the fastest provider, took {elapsed:?}");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        !ran_to_completion.load(Ordering::SeqCst),
        "the slower provider should have been cancelled before finishing"
    );
}
