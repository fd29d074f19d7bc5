//! Text normalization and bucketing shared by the three consensus
//! strategies, grounded on `majority_vote.py`/`weighted_vote.py`/`max_score.py`.

use super::schema;

/// Collapses internal whitespace runs and lowercases, so near-identical
/// responses ("Paris." vs "paris.") land in the same bucket.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Bucket key for a candidate's text. When a schema is configured, key by
/// the canonical sorted-key JSON serialization if the text parses as JSON;
/// otherwise (and always when no schema is configured) key by normalized
/// plain text.
pub fn bucket_key(text: &str, schema_configured: bool) -> String {
    if schema_configured {
        if let Some(key) = schema::canonical_json_key(text) {
            return key;
        }
    }
    normalize_text(text)
}

#[derive(Debug, Clone)]
pub struct Bucket {
    pub key: String,
    /// Indices into the candidate slice passed to `build_buckets`.
    pub members: Vec<usize>,
    pub weight: f64,
}

/// Groups candidates by `bucket_key`, preserving first-seen bucket order
/// (mirrors the original's reliance on Python dict insertion order).
pub fn build_buckets(texts: &[String], weights: &[f64], schema_configured: bool) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        let key = bucket_key(text, schema_configured);
        if let Some(bucket) = buckets.iter_mut().find(|b| b.key == key) {
            bucket.members.push(i);
            bucket.weight += weights[i];
        } else {
            buckets.push(Bucket {
                key,
                members: vec![i],
                weight: weights[i],
            });
        }
    }
    buckets
}

/// Index of the bucket(s) with the maximum `metric`. Returns every bucket
/// tied for the maximum so the caller can pool their members for tie-break.
pub fn buckets_with_max<F>(buckets: &[Bucket], metric: F) -> Vec<usize>
where
    F: Fn(&Bucket) -> f64,
{
    let max = buckets.iter().map(&metric).fold(f64::NEG_INFINITY, f64::max);
    buckets
        .iter()
        .enumerate()
        .filter(|(_, b)| metric(b) == max)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_whitespace_and_case() {
        assert_eq!(normalize_text("  Paris   is   great  "), "paris is great");
    }

    #[test]
    fn build_buckets_groups_equal_normalized_text() {
        let texts = vec!["Paris".to_string(), "paris".to_string(), "Lyon".to_string()];
        let weights = vec![1.0, 1.0, 1.0];
        let buckets = build_buckets(&texts, &weights, false);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].members.len(), 2);
    }

    #[test]
    fn json_candidates_bucket_by_canonical_form_only_when_schema_configured() {
        let texts = vec![r#"{"a": 1, "b": 2}"#.to_string(), r#"{"b": 2, "a": 1}"#.to_string()];
        let weights = vec![1.0, 1.0];
        let buckets = build_buckets(&texts, &weights, true);
        assert_eq!(buckets.len(), 1);

        let buckets_no_schema = build_buckets(&texts, &weights, false);
        assert_eq!(buckets_no_schema.len(), 2, "without a schema, JSON text buckets by raw normalized text");
    }

    #[test]
    fn buckets_with_max_returns_all_ties() {
        let buckets = vec![
            Bucket { key: "a".into(), members: vec![0], weight: 2.0 },
            Bucket { key: "b".into(), members: vec![1], weight: 2.0 },
            Bucket { key: "c".into(), members: vec![2], weight: 1.0 },
        ];
        let tied = buckets_with_max(&buckets, |b| b.weight);
        assert_eq!(tied, vec![0, 1]);
    }
}
