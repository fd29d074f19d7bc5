//! Runner and consensus configuration surface.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consensus::judge::Judge;
use crate::provider::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerMode {
    Sequential,
    ParallelAny,
    ParallelAll,
    Consensus,
}

impl RunnerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerMode::Sequential => "sequential",
            RunnerMode::ParallelAny => "parallel_any",
            RunnerMode::ParallelAll => "parallel_all",
            RunnerMode::Consensus => "consensus",
        }
    }
}

impl FromStr for RunnerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sequential" => Ok(RunnerMode::Sequential),
            "parallel_any" => Ok(RunnerMode::ParallelAny),
            "parallel_all" => Ok(RunnerMode::ParallelAll),
            "consensus" => Ok(RunnerMode::Consensus),
            other => Err(format!("unknown runner mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusStrategyKind {
    MajorityVote,
    WeightedVote,
    MaxScore,
}

impl ConsensusStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusStrategyKind::MajorityVote => "majority_vote",
            ConsensusStrategyKind::WeightedVote => "weighted_vote",
            ConsensusStrategyKind::MaxScore => "max_score",
        }
    }
}

impl FromStr for ConsensusStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "majority" | "majority_vote" | "vote" | "maj" => Ok(ConsensusStrategyKind::MajorityVote),
            "weighted" | "weighted_vote" => Ok(ConsensusStrategyKind::WeightedVote),
            "max" | "max_score" | "score" | "top" => Ok(ConsensusStrategyKind::MaxScore),
            other => Err(format!("unknown consensus strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieBreakerKind {
    Latency,
    Cost,
    StableOrder,
}

impl TieBreakerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TieBreakerKind::Latency => "latency",
            TieBreakerKind::Cost => "cost",
            TieBreakerKind::StableOrder => "stable_order",
        }
    }
}

impl FromStr for TieBreakerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "latency" | "min_latency" => Ok(TieBreakerKind::Latency),
            "cost" | "min_cost" => Ok(TieBreakerKind::Cost),
            "stable_order" | "first" | "order" => Ok(TieBreakerKind::StableOrder),
            other => Err(format!("unknown tie breaker: {other}")),
        }
    }
}

/// Backoff behaviour for retryable/rate-limited attempts. The rate-limit path
/// always sleeps a fixed duration; other retryable errors use the
/// exponential schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub rate_limit_sleep_s: f64,
    pub initial_delay_s: f64,
    pub max_delay_s: f64,
    pub multiplier: f64,
    pub jitter_fraction: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            rate_limit_sleep_s: 1.0,
            initial_delay_s: 0.5,
            max_delay_s: 10.0,
            multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the `attempt`-th retry against the same provider
    /// (1-based: `attempt == 1` is the first retry after the initial try),
    /// with up to `jitter_fraction` of random spread to avoid synchronized
    /// retries across concurrent callers.
    pub fn retry_delay_s(&self, attempt: u32) -> f64 {
        let exp = self.initial_delay_s * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let base = exp.min(self.max_delay_s);
        if self.jitter_fraction <= 0.0 {
            return base;
        }
        let spread = base * self.jitter_fraction;
        let jitter = rand::thread_rng().gen_range(-spread..=spread);
        (base + jitter).max(0.0)
    }
}

#[derive(Clone)]
pub struct ConsensusConfig {
    pub strategy: ConsensusStrategyKind,
    pub quorum: u32,
    pub tie_breaker: Option<TieBreakerKind>,
    pub max_rounds: u32,
    pub schema: Option<String>,
    pub judge: Option<Arc<dyn Judge>>,
    pub judge_name: Option<String>,
    pub provider_weights: HashMap<String, f64>,
    pub max_latency_ms: Option<u64>,
    pub max_cost_usd: Option<f64>,
}

impl std::fmt::Debug for ConsensusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusConfig")
            .field("strategy", &self.strategy)
            .field("quorum", &self.quorum)
            .field("tie_breaker", &self.tie_breaker)
            .field("max_rounds", &self.max_rounds)
            .field("schema", &self.schema)
            .field("judge_name", &self.judge_name)
            .field("provider_weights", &self.provider_weights)
            .field("max_latency_ms", &self.max_latency_ms)
            .field("max_cost_usd", &self.max_cost_usd)
            .finish()
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            strategy: ConsensusStrategyKind::MajorityVote,
            quorum: 1,
            tie_breaker: None,
            max_rounds: 1,
            schema: None,
            judge: None,
            judge_name: None,
            provider_weights: HashMap::new(),
            max_latency_ms: None,
            max_cost_usd: None,
        }
    }
}

impl ConsensusConfig {
    pub fn with_strategy(mut self, strategy: ConsensusStrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_quorum(mut self, quorum: u32) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_tie_breaker(mut self, tie_breaker: TieBreakerKind) -> Self {
        self.tie_breaker = Some(tie_breaker);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_judge(mut self, name: impl Into<String>, judge: Arc<dyn Judge>) -> Self {
        self.judge_name = Some(name.into());
        self.judge = Some(judge);
        self
    }

    pub fn with_provider_weight(mut self, provider: impl Into<String>, weight: f64) -> Self {
        self.provider_weights.insert(provider.into(), weight);
        self
    }

    pub fn with_max_latency_ms(mut self, max_latency_ms: u64) -> Self {
        self.max_latency_ms = Some(max_latency_ms);
        self
    }

    pub fn with_max_cost_usd(mut self, max_cost_usd: f64) -> Self {
        self.max_cost_usd = Some(max_cost_usd);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.quorum == 0 {
            return Err("quorum must be at least 1".to_string());
        }
        if self.max_rounds == 0 {
            return Err("max_rounds must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct RunnerConfig {
    pub mode: RunnerMode,
    pub max_concurrency: usize,
    pub rpm: Option<u32>,
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub shadow_provider: Option<Arc<dyn Provider>>,
    /// Default metrics sink address (opaque), overridable per call to
    /// `Runner::run`/`run_async`.
    pub metrics_path: Option<String>,
    pub consensus: ConsensusConfig,
}

impl std::fmt::Debug for RunnerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerConfig")
            .field("mode", &self.mode)
            .field("max_concurrency", &self.max_concurrency)
            .field("rpm", &self.rpm)
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("shadow_provider", &self.shadow_provider.as_ref().map(|p| p.name().to_string()))
            .field("metrics_path", &self.metrics_path)
            .field("consensus", &self.consensus)
            .finish()
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: RunnerMode::Sequential,
            max_concurrency: 4,
            rpm: None,
            max_attempts: 2,
            backoff: BackoffPolicy::default(),
            shadow_provider: None,
            metrics_path: None,
            consensus: ConsensusConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn with_mode(mut self, mode: RunnerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_rpm(mut self, rpm: u32) -> Self {
        self.rpm = Some(rpm);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_shadow_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.shadow_provider = Some(provider);
        self
    }

    pub fn with_metrics_path(mut self, metrics_path: impl Into<String>) -> Self {
        self.metrics_path = Some(metrics_path.into());
        self
    }

    pub fn with_consensus(mut self, consensus: ConsensusConfig) -> Self {
        self.consensus = consensus;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".to_string());
        }
        if let Some(rpm) = self.rpm {
            if rpm == 0 {
                return Err("rpm must be at least 1 when set".to_string());
            }
        }
        self.consensus.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sequential", RunnerMode::Sequential)]
    #[case("parallel-any", RunnerMode::ParallelAny)]
    #[case("PARALLEL_ALL", RunnerMode::ParallelAll)]
    #[case("consensus", RunnerMode::Consensus)]
    fn mode_aliases_normalize_dashes_and_case(#[case] input: &str, #[case] expected: RunnerMode) {
        assert_eq!(RunnerMode::from_str(input).unwrap(), expected);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(RunnerMode::from_str("magic").is_err());
    }

    #[rstest]
    #[case("maj", ConsensusStrategyKind::MajorityVote)]
    #[case("weighted", ConsensusStrategyKind::WeightedVote)]
    #[case("score", ConsensusStrategyKind::MaxScore)]
    fn consensus_strategy_aliases(#[case] input: &str, #[case] expected: ConsensusStrategyKind) {
        assert_eq!(ConsensusStrategyKind::from_str(input).unwrap(), expected);
    }

    #[rstest]
    #[case("min_latency", TieBreakerKind::Latency)]
    #[case("min_cost", TieBreakerKind::Cost)]
    #[case("first", TieBreakerKind::StableOrder)]
    fn tie_breaker_aliases(#[case] input: &str, #[case] expected: TieBreakerKind) {
        assert_eq!(TieBreakerKind::from_str(input).unwrap(), expected);
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let cfg = RunnerConfig::default().with_max_concurrency(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn retry_delay_grows_exponentially_and_caps() {
        let backoff = BackoffPolicy { jitter_fraction: 0.0, ..BackoffPolicy::default() };
        assert_eq!(backoff.retry_delay_s(1), 0.5);
        assert_eq!(backoff.retry_delay_s(2), 1.0);
        assert!(backoff.retry_delay_s(20) <= backoff.max_delay_s);
    }

    #[test]
    fn retry_delay_jitter_stays_within_configured_spread() {
        let backoff = BackoffPolicy::default();
        let base = 1.0_f64;
        for _ in 0..50 {
            let delay = backoff.retry_delay_s(2);
            assert!(delay >= base * (1.0 - backoff.jitter_fraction) - 1e-9);
            assert!(delay <= base * (1.0 + backoff.jitter_fraction) + 1e-9);
        }
    }
}
