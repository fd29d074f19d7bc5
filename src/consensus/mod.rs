//! Consensus voting engine: bucket observations by normalized text, pick a
//! winning bucket per the configured strategy, and fall back to a tie-break
//! cascade or an optional judge runoff when no bucket meets quorum.
//!
//! Grounded directly on the original `aggregation` package: `majority_vote.py`,
//! `weighted_vote.py`, `max_score.py`, `tie_breakers.py`, `judge.py`,
//! `registry.py`.

pub mod judge;
pub mod schema;
pub mod strategies;
pub mod tie_break;

use std::collections::HashMap;

use crate::config::{ConsensusConfig, ConsensusStrategyKind, TieBreakerKind};
use crate::errors::{FailureSummary, ParallelExecutionError, ProviderError};
use crate::response::ProviderResponse;
use strategies::Bucket;
use tie_break::TieBreakInput;

/// One provider's contribution to a consensus round. `index` is the stable
/// declaration order used by the `stable_order` tie-breaker.
#[derive(Debug, Clone)]
pub struct ConsensusObservation {
    pub index: usize,
    pub provider: String,
    pub latency_ms: u64,
    pub cost_estimate: Option<f64>,
    pub response: Option<ProviderResponse>,
    pub error: Option<ProviderError>,
}

impl ConsensusObservation {
    pub fn success(index: usize, provider: impl Into<String>, response: ProviderResponse, latency_ms: u64) -> Self {
        Self {
            index,
            provider: provider.into(),
            latency_ms,
            cost_estimate: None,
            response: Some(response),
            error: None,
        }
    }

    pub fn failure(index: usize, provider: impl Into<String>, error: ProviderError, latency_ms: u64) -> Self {
        Self {
            index,
            provider: provider.into(),
            latency_ms,
            cost_estimate: None,
            response: None,
            error: Some(error),
        }
    }

    pub fn with_cost_estimate(mut self, cost: f64) -> Self {
        self.cost_estimate = Some(cost);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConsensusResult {
    pub response: ProviderResponse,
    pub winning_provider: String,
    pub winner_latency_ms: u64,
    pub strategy: ConsensusStrategyKind,
    pub quorum_met: bool,
    pub votes: u32,
    pub votes_for: u32,
    pub votes_against: u32,
    pub voters_total: usize,
    pub winning_weight: f64,
    pub total_candidates: usize,
    pub bucket_count: usize,
    pub votes_by_text: HashMap<String, u32>,
    pub tally: HashMap<String, u32>,
    pub candidate_summaries: Vec<CandidateSummary>,
    pub abstained: u32,
    pub schema_checked: bool,
    pub schema_failures: HashMap<usize, String>,
    pub tie_break_applied: bool,
    pub tie_breaker_selected: Option<TieBreakerKind>,
    pub tie_break_reason: Option<String>,
    pub rounds: u32,
    pub judge_name: Option<String>,
    pub judge_score: Option<f64>,
}

/// One voting-pool member's contribution, carried on `ConsensusResult` purely
/// for event-stream reporting (the voting math reads `VotingCandidate`, not this).
#[derive(Debug, Clone)]
pub struct CandidateSummary {
    pub provider: String,
    pub text: String,
    pub latency_ms: u64,
    pub cost_estimate: Option<f64>,
}

struct VotingCandidate<'a> {
    obs_index: usize,
    provider: &'a str,
    text: String,
    latency_ms: u64,
    cost_estimate: Option<f64>,
    response: &'a ProviderResponse,
}

pub fn compute_consensus(
    observations: &[ConsensusObservation],
    config: &ConsensusConfig,
) -> Result<ConsensusResult, ParallelExecutionError> {
    let mut admission_failures = Vec::new();
    let admitted: Vec<&ConsensusObservation> = observations
        .iter()
        .filter(|obs| match admission_reason(obs, config) {
            Some(reason) => {
                admission_failures.push(FailureSummary {
                    provider: obs.provider.clone(),
                    attempt: 1,
                    summary: reason,
                });
                false
            }
            None => true,
        })
        .collect();

    if admitted.is_empty() {
        return Err(ParallelExecutionError {
            message: "no admissible candidates for consensus".to_string(),
            failures: admission_failures,
        });
    }

    let mut schema_failures: HashMap<usize, String> = HashMap::new();
    let schema_checked = config.schema.is_some();
    let mut voting_pool: Vec<VotingCandidate> = Vec::new();
    for obs in &admitted {
        let response = obs.response.as_ref().expect("admitted observations always have a response");
        if let Some(schema) = &config.schema {
            match schema::validate(schema, &response.text) {
                Ok(()) => {}
                Err(reason) => {
                    schema_failures.insert(obs.index, reason);
                    continue;
                }
            }
        }
        voting_pool.push(VotingCandidate {
            obs_index: obs.index,
            provider: &obs.provider,
            text: response.text.clone(),
            latency_ms: obs.latency_ms,
            cost_estimate: obs.cost_estimate,
            response,
        });
    }
    let abstained = schema_failures.len() as u32;

    if voting_pool.is_empty() {
        return Err(ParallelExecutionError {
            message: "every candidate abstained (schema validation failed)".to_string(),
            failures: admission_failures,
        });
    }

    let candidate_summaries: Vec<CandidateSummary> = voting_pool
        .iter()
        .map(|c| CandidateSummary {
            provider: c.provider.to_string(),
            text: c.text.clone(),
            latency_ms: c.latency_ms,
            cost_estimate: c.cost_estimate,
        })
        .collect();
    let voters_total = observations.len();

    let mut rounds = 1u32;
    loop {
        let texts: Vec<String> = voting_pool.iter().map(|c| c.text.clone()).collect();
        let weights: Vec<f64> = voting_pool
            .iter()
            .map(|c| *config.provider_weights.get(c.provider).unwrap_or(&1.0))
            .collect();
        let buckets = strategies::build_buckets(&texts, &weights, schema_checked);
        let tally: HashMap<String, u32> = buckets.iter().map(|b| (b.key.clone(), b.members.len() as u32)).collect();
        let votes_by_text: HashMap<String, u32> = buckets
            .iter()
            .map(|b| (voting_pool[b.members[0]].text.clone(), b.members.len() as u32))
            .collect();
        let bucket_count = buckets.len();

        let selection = select_winner(config.strategy, &buckets, &voting_pool, config.tie_breaker);
        let winner_bucket = &buckets[selection.bucket_index];
        if selection.tie_break_applied {
            rounds += 1;
        }

        let quorum_metric = if config.strategy == ConsensusStrategyKind::WeightedVote {
            winner_bucket.weight
        } else {
            winner_bucket.members.len() as f64
        };
        let quorum_met = quorum_metric >= config.quorum as f64;

        if quorum_met {
            let winner_candidate = &voting_pool[selection.representative];
            let votes_for = winner_bucket.members.len() as u32;
            return Ok(ConsensusResult {
                response: winner_candidate.response.clone(),
                winning_provider: winner_candidate.provider.to_string(),
                winner_latency_ms: winner_candidate.latency_ms,
                strategy: config.strategy,
                quorum_met: true,
                votes: votes_for,
                votes_for,
                votes_against: voting_pool.len() as u32 - votes_for,
                voters_total,
                winning_weight: winner_bucket.weight,
                total_candidates: observations.len(),
                bucket_count,
                votes_by_text,
                tally,
                candidate_summaries,
                abstained,
                schema_checked,
                schema_failures,
                tie_break_applied: selection.tie_break_applied,
                tie_breaker_selected: selection.tie_breaker_selected,
                tie_break_reason: selection.tie_break_reason,
                rounds,
                judge_name: None,
                judge_score: None,
            });
        }

        if let Some(judge) = &config.judge {
            if rounds < config.max_rounds {
                rounds += 1;
                let responses: Vec<ProviderResponse> = voting_pool.iter().map(|c| c.response.clone()).collect();
                let (winner_text, score) = judge.judge(&responses);
                let normalized_winner = strategies::normalize_text(&winner_text);
                if let Some(pos) = voting_pool
                    .iter()
                    .position(|c| strategies::normalize_text(&c.text) == normalized_winner)
                {
                    let winner_candidate = &voting_pool[pos];
                    return Ok(ConsensusResult {
                        response: winner_candidate.response.clone(),
                        winning_provider: winner_candidate.provider.to_string(),
                        winner_latency_ms: winner_candidate.latency_ms,
                        strategy: config.strategy,
                        quorum_met: true,
                        votes: 1,
                        votes_for: 1,
                        votes_against: voting_pool.len() as u32 - 1,
                        voters_total,
                        winning_weight: *config.provider_weights.get(winner_candidate.provider).unwrap_or(&1.0),
                        total_candidates: observations.len(),
                        bucket_count,
                        votes_by_text,
                        tally,
                        candidate_summaries,
                        abstained,
                        schema_checked,
                        schema_failures,
                        tie_break_applied: selection.tie_break_applied,
                        tie_breaker_selected: selection.tie_breaker_selected,
                        tie_break_reason: selection.tie_break_reason,
                        rounds,
                        judge_name: config.judge_name.clone(),
                        judge_score: Some(score),
                    });
                }
                return Err(ParallelExecutionError {
                    message: "judge selected a response not present in the voting pool".to_string(),
                    failures: admission_failures,
                });
            }
        }

        tracing::warn!(rounds, quorum = config.quorum, "consensus quorum not met");
        return Err(ParallelExecutionError {
            message: format!("consensus quorum not met after {rounds} round(s)"),
            failures: admission_failures,
        });
    }
}

fn admission_reason(obs: &ConsensusObservation, config: &ConsensusConfig) -> Option<String> {
    if let Some(err) = &obs.error {
        return Some(format!("provider error: {err}"));
    }
    if let Some(max_latency) = config.max_latency_ms {
        if obs.latency_ms > max_latency {
            return Some(format!("latency {}ms exceeds max_latency_ms {}ms", obs.latency_ms, max_latency));
        }
    }
    if let Some(max_cost) = config.max_cost_usd {
        if let Some(cost) = obs.cost_estimate {
            if cost > max_cost {
                return Some(format!("cost {cost} exceeds max_cost_usd {max_cost}"));
            }
        }
    }
    None
}

struct Selection {
    bucket_index: usize,
    representative: usize,
    tie_break_applied: bool,
    tie_breaker_selected: Option<TieBreakerKind>,
    tie_break_reason: Option<String>,
}

fn select_winner(
    strategy: ConsensusStrategyKind,
    buckets: &[Bucket],
    voting_pool: &[VotingCandidate],
    preferred_tie_breaker: Option<TieBreakerKind>,
) -> Selection {
    let tied_buckets = match strategy {
        ConsensusStrategyKind::MajorityVote => {
            strategies::buckets_with_max(buckets, |b| b.members.len() as f64)
        }
        ConsensusStrategyKind::WeightedVote => strategies::buckets_with_max(buckets, |b| b.weight),
        ConsensusStrategyKind::MaxScore => {
            // Score lives on the candidate, not the bucket: find the
            // bucket containing the highest-scoring candidate (falling
            // back to the tie-break cascade when nobody carries a score).
            let scored: Vec<(usize, f64)> = voting_pool
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.response.score_hint().map(|s| (i, s)))
                .collect();
            if scored.is_empty() {
                strategies::buckets_with_max(buckets, |_| 0.0)
            } else {
                let max_score = scored.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);
                let best_candidate = scored
                    .iter()
                    .filter(|(_, s)| *s == max_score)
                    .map(|(i, _)| *i)
                    .min()
                    .expect("scored is non-empty");
                let bucket_idx = buckets
                    .iter()
                    .position(|b| b.members.contains(&best_candidate))
                    .expect("every candidate belongs to a bucket");
                return Selection {
                    bucket_index: bucket_idx,
                    representative: best_candidate,
                    tie_break_applied: false,
                    tie_breaker_selected: None,
                    tie_break_reason: None,
                };
            }
        }
    };

    if tied_buckets.len() == 1 {
        let bucket_index = tied_buckets[0];
        let representative = buckets[bucket_index].members[0];
        return Selection {
            bucket_index,
            representative,
            tie_break_applied: false,
            tie_breaker_selected: None,
            tie_break_reason: None,
        };
    }

    let pooled: Vec<usize> = tied_buckets.iter().flat_map(|&b| buckets[b].members.clone()).collect();
    let tie_inputs: Vec<TieBreakInput> = pooled
        .iter()
        .map(|&i| TieBreakInput {
            index: voting_pool[i].obs_index,
            latency_ms: voting_pool[i].latency_ms,
            cost_estimate: voting_pool[i].cost_estimate,
        })
        .collect();
    let (winner_pos, breaker, reason) = tie_break::break_tie(&tie_inputs, preferred_tie_breaker);
    let representative = pooled[winner_pos];
    let bucket_index = tied_buckets
        .into_iter()
        .find(|&b| buckets[b].members.contains(&representative))
        .expect("winning candidate belongs to one of the tied buckets");

    Selection {
        bucket_index,
        representative,
        tie_break_applied: true,
        tie_breaker_selected: Some(breaker),
        tie_break_reason: Some(reason),
    }
}
