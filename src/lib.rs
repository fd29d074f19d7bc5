//! Multi-provider LLM orchestration core.
//!
//! Strategy dispatch (sequential / parallel-any / parallel-all / consensus),
//! a deterministic consensus voting engine, a structured event stream for
//! observability, a token-bucket rate limiter, and optional shadow execution
//! — the runtime seam concrete provider clients and exporters plug into.
//! Concrete HTTP provider clients, config-file parsing, and metric storage
//! are external collaborators, not implemented here.

pub mod config;
pub mod consensus;
pub mod errors;
pub mod events;
pub mod fingerprint;
pub mod invoker;
pub mod logging;
pub mod parallel;
pub mod provider;
pub mod rate_limiter;
pub mod request;
pub mod response;
pub mod runner;
pub mod shadow;
pub mod strategy;

pub use config::{BackoffPolicy, ConsensusConfig, ConsensusStrategyKind, RunnerConfig, RunnerMode, TieBreakerKind};
pub use consensus::{compute_consensus, ConsensusObservation, ConsensusResult};
pub use errors::{AllFailedError, ErrorFamily, ParallelExecutionError, ProviderError, RunnerError, RunnerResult};
pub use events::{EventEnvelope, EventRecord, EventSink, NullSink, VecSink};
pub use logging::init_tracing;
pub use provider::Provider;
pub use rate_limiter::RateLimiter;
pub use request::{ChatMessage, MessageContent, ProviderRequest};
pub use response::{ProviderResponse, TokenUsage};
pub use runner::Runner;
