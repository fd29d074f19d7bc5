//! Response data model: `ProviderResponse` and `TokenUsage`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `total` is always `prompt + completion`; the only constructor enforces it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    total: u64,
}

impl TokenUsage {
    pub fn new(prompt: u64, completion: u64) -> Self {
        Self {
            prompt,
            completion,
            total: prompt + completion,
        }
    }

    pub fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
    pub model: String,
    pub latency_ms: u64,
    pub token_usage: TokenUsage,
    pub finish_reason: Option<String>,
    /// Opaque provider payload, used by the consensus engine to read a
    /// caller-supplied `score` hint for the max-score strategy.
    pub raw: Option<Value>,
}

impl ProviderResponse {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            latency_ms: 0,
            token_usage: TokenUsage::zero(),
            finish_reason: None,
            raw: None,
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_token_usage(mut self, token_usage: TokenUsage) -> Self {
        self.token_usage = token_usage;
        self
    }

    pub fn with_finish_reason(mut self, finish_reason: impl Into<String>) -> Self {
        self.finish_reason = Some(finish_reason.into());
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Score hint read from `raw.score`, coerced to `f64`, for the
    /// max-score consensus strategy.
    pub fn score_hint(&self) -> Option<f64> {
        self.raw.as_ref()?.get("score")?.as_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_usage_total_is_always_the_sum() {
        let usage = TokenUsage::new(10, 5);
        assert_eq!(usage.total(), 15);
    }

    #[test]
    fn score_hint_reads_raw_score() {
        let resp = ProviderResponse::new("ok", "gpt").with_raw(serde_json::json!({"score": 0.9}));
        assert_eq!(resp.score_hint(), Some(0.9));
    }

    #[test]
    fn score_hint_none_without_raw() {
        let resp = ProviderResponse::new("ok", "gpt");
        assert_eq!(resp.score_hint(), None);
    }
}
