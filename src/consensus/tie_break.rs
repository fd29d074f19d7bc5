//! Deterministic tie-break cascade: latency -> cost -> stable order.
//!
//! Grounded on `FirstTieBreaker`/`MaxScoreTieBreaker` from the original
//! aggregation module: each criterion is tried in turn and only decides the
//! tie when it uniquely picks one candidate; otherwise the cascade falls
//! through to the next criterion. `stable_order` always decides since
//! indices are distinct.

use crate::config::TieBreakerKind;

pub struct TieBreakInput {
    pub index: usize,
    pub latency_ms: u64,
    pub cost_estimate: Option<f64>,
}

/// Returns `(winning index into `candidates`, breaker that decided, reason string)`.
/// `preferred`, when set, is tried before the default cascade.
pub fn break_tie(candidates: &[TieBreakInput], preferred: Option<TieBreakerKind>) -> (usize, TieBreakerKind, String) {
    assert!(!candidates.is_empty(), "break_tie requires at least one candidate");

    let mut order = vec![TieBreakerKind::Latency, TieBreakerKind::Cost, TieBreakerKind::StableOrder];
    if let Some(first) = preferred {
        order.retain(|k| *k != first);
        order.insert(0, first);
    }

    for criterion in order {
        match criterion {
            TieBreakerKind::Latency => {
                if let Some((idx, value)) = unique_min(candidates, |c| Some(c.latency_ms as f64)) {
                    return (idx, TieBreakerKind::Latency, format!("latency(min={})", value as u64));
                }
            }
            TieBreakerKind::Cost => {
                if let Some((idx, value)) = unique_min(candidates, |c| c.cost_estimate) {
                    return (idx, TieBreakerKind::Cost, format!("cost(min={value})"));
                }
            }
            TieBreakerKind::StableOrder => {
                let idx = candidates
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, c)| c.index)
                    .map(|(i, _)| i)
                    .expect("non-empty candidates");
                return (idx, TieBreakerKind::StableOrder, "stable_order".to_string());
            }
        }
    }
    unreachable!("stable_order always decides the cascade")
}

fn unique_min<F>(candidates: &[TieBreakInput], key: F) -> Option<(usize, f64)>
where
    F: Fn(&TieBreakInput) -> Option<f64>,
{
    let values: Vec<Option<f64>> = candidates.iter().map(&key).collect();
    if values.iter().any(Option::is_none) {
        return None;
    }
    let values: Vec<f64> = values.into_iter().map(Option::unwrap).collect();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let winners: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == min)
        .map(|(i, _)| i)
        .collect();
    if winners.len() == 1 {
        Some((winners[0], min))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(index: usize, latency_ms: u64, cost: Option<f64>) -> TieBreakInput {
        TieBreakInput { index, latency_ms, cost_estimate: cost }
    }

    #[test]
    fn latency_decides_when_unique() {
        let candidates = vec![input(0, 20, None), input(1, 10, None)];
        let (idx, breaker, reason) = break_tie(&candidates, None);
        assert_eq!(idx, 1);
        assert_eq!(breaker, TieBreakerKind::Latency);
        assert_eq!(reason, "latency(min=10)");
    }

    #[test]
    fn falls_through_to_cost_when_latency_ties() {
        let candidates = vec![input(0, 10, Some(0.5)), input(1, 10, Some(0.2))];
        let (idx, breaker, _) = break_tie(&candidates, None);
        assert_eq!(idx, 1);
        assert_eq!(breaker, TieBreakerKind::Cost);
    }

    #[test]
    fn falls_through_to_stable_order_when_everything_ties() {
        let candidates = vec![input(5, 10, Some(0.2)), input(2, 10, Some(0.2))];
        let (idx, breaker, _) = break_tie(&candidates, None);
        assert_eq!(idx, 1, "candidate with the lower declaration index wins");
        assert_eq!(breaker, TieBreakerKind::StableOrder);
    }

    #[test]
    fn preferred_breaker_is_tried_first() {
        let candidates = vec![input(0, 10, Some(0.9)), input(1, 20, Some(0.2))];
        let (idx, breaker, _) = break_tie(&candidates, Some(TieBreakerKind::Cost));
        assert_eq!(idx, 1);
        assert_eq!(breaker, TieBreakerKind::Cost);
    }
}
