use llm_runner_core::{compute_consensus, ConsensusConfig, ConsensusObservation, ProviderResponse};
use proptest::prelude::*;

fn observations_from_texts(texts: &[&str]) -> Vec<ConsensusObservation> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            ConsensusObservation::success(i, format!("p{i}"), ProviderResponse::new(*text, "gpt"), 10 + i as u64)
        })
        .collect()
}

proptest! {
    /// Permuting the declaration order of a fixed observation set must not
    /// change which response wins: bucketing is order-independent and the
    /// `stable_order` tie-break only ever refers to each candidate's own
    /// recorded `index`, never its position in the slice passed in.
    #[test]
    fn winner_is_independent_of_permutation(rotate_by in 0usize..3) {
        let texts = ["Paris", "Paris", "Lyon"];
        let base = observations_from_texts(&texts);
        let config = ConsensusConfig::default().with_quorum(2);
        let expected = compute_consensus(&base, &config).unwrap();

        let mut permuted = base.clone();
        permuted.rotate_left(rotate_by);
        let actual = compute_consensus(&permuted, &config).unwrap();

        prop_assert_eq!(actual.response.text, expected.response.text);
        prop_assert_eq!(actual.winning_provider, expected.winning_provider);
    }
}
