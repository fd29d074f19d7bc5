//! Execution strategies. A closed set (sequential, parallel-any, parallel-all,
//! consensus) dispatched by `RunnerConfig::mode` via enum-dispatch rather than
//! an open trait-object hierarchy: no fifth strategy is expected to show up
//! as a plugin.

pub mod consensus_strategy;
pub mod parallel_all;
pub mod parallel_any;
pub mod sequential;
