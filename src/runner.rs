//! Runner façade: the single entry point callers use. Validates inputs,
//! builds the per-run event envelope, and dispatches to the configured
//! strategy. `run` and `run_async` share 100% of this code — both fabrics
//! described in the ambient overview are the same call path.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::{RunnerConfig, RunnerMode};
use crate::errors::{RunnerError, RunnerResult};
use crate::events::{EventEnvelope, EventSink, NullSink};
use crate::fingerprint;
use crate::provider::Provider;
use crate::rate_limiter::RateLimiter;
use crate::request::ProviderRequest;
use crate::response::ProviderResponse;
use crate::strategy::{consensus_strategy, parallel_all, parallel_any, sequential};

pub struct Runner {
    providers: Vec<Arc<dyn Provider>>,
    config: RunnerConfig,
    sink: Arc<dyn EventSink>,
    limiter_cell: OnceCell<Option<Arc<RateLimiter>>>,
}

impl Runner {
    pub fn new(providers: Vec<Arc<dyn Provider>>, config: RunnerConfig) -> RunnerResult<Self> {
        config.validate().map_err(RunnerError::Validation)?;
        Ok(Self {
            providers,
            config,
            sink: Arc::new(NullSink),
            limiter_cell: OnceCell::new(),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    async fn limiter(&self) -> Option<Arc<RateLimiter>> {
        self.limiter_cell
            .get_or_init(|| async { self.config.rpm.map(RateLimiter::new).map(Arc::new) })
            .await
            .clone()
    }

    /// Non-cancellable entry point: runs to completion on the current
    /// runtime. Prefer `run_async` when the caller needs to race/cancel the
    /// call itself (e.g. behind a `tokio::select!` or a deadline).
    pub async fn run(&self, request: ProviderRequest) -> RunnerResult<ProviderResponse> {
        self.run_async(request).await
    }

    pub async fn run_async(&self, request: ProviderRequest) -> RunnerResult<ProviderResponse> {
        self.run_async_with(request, None, None).await
    }

    /// Like `run`, but lets the caller override the configured shadow
    /// provider and metrics sink address for this one call.
    pub async fn run_with(
        &self,
        request: ProviderRequest,
        shadow: Option<Arc<dyn Provider>>,
        metrics_path: Option<String>,
    ) -> RunnerResult<ProviderResponse> {
        self.run_async_with(request, shadow, metrics_path).await
    }

    /// Like `run_async`, but lets the caller override the configured shadow
    /// provider and metrics sink address for this one call. Precedence:
    /// per-call shadow/metrics_path > config-level default.
    pub async fn run_async_with(
        &self,
        request: ProviderRequest,
        shadow: Option<Arc<dyn Provider>>,
        metrics_path: Option<String>,
    ) -> RunnerResult<ProviderResponse> {
        request.validate().map_err(RunnerError::Validation)?;

        let fingerprint = fingerprint::compute(
            self.config.mode.as_str(),
            &request.prompt_text(),
            &request.options,
            request.max_tokens,
        );
        let shadow_provider = shadow.or_else(|| self.config.shadow_provider.clone());
        let resolved_metrics_path = metrics_path.or_else(|| self.config.metrics_path.clone());
        let trace_id = request
            .metadata
            .get("trace_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let project_id = request
            .metadata
            .get("project_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let envelope = EventEnvelope {
            run_id: fingerprint.clone(),
            request_fingerprint: fingerprint,
            mode: self.config.mode,
            providers: self.providers.iter().map(|p| p.name().to_string()).collect(),
            shadow_used: shadow_provider.is_some(),
            shadow_provider_id: shadow_provider.as_ref().map(|p| p.name().to_string()),
            trace_id,
            project_id,
            metrics_path: resolved_metrics_path,
        };
        let limiter = self.limiter().await;

        tracing::debug!(mode = self.config.mode.as_str(), providers = self.providers.len(), "dispatching run");

        match self.config.mode {
            RunnerMode::Sequential => {
                sequential::run(
                    &self.providers,
                    &self.config,
                    &request,
                    &self.sink,
                    &envelope,
                    limiter,
                    shadow_provider.as_ref(),
                )
                .await
            }
            RunnerMode::ParallelAny => {
                parallel_any::run(
                    &self.providers,
                    &self.config,
                    &request,
                    &self.sink,
                    &envelope,
                    limiter,
                    shadow_provider.as_ref(),
                )
                .await
            }
            RunnerMode::ParallelAll => {
                parallel_all::run(
                    &self.providers,
                    &self.config,
                    &request,
                    &self.sink,
                    &envelope,
                    limiter,
                    shadow_provider.as_ref(),
                )
                .await
            }
            RunnerMode::Consensus => {
                consensus_strategy::run(
                    &self.providers,
                    &self.config,
                    &request,
                    &self.sink,
                    &envelope,
                    limiter,
                    shadow_provider.as_ref(),
                )
                .await
            }
        }
    }
}
