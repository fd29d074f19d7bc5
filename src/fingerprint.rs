//! Deterministic, cross-process-stable request fingerprinting.
//!
//! `std::collections::hash_map::DefaultHasher` is intentionally not used: its
//! output is explicitly *not* stable across Rust versions or processes. This
//! is a small FNV-1a implementation instead, run over the canonical
//! serialization of the fingerprinted fields.

use std::collections::HashMap;

use serde_json::Value;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// `options` is a `HashMap` at the API boundary but `serde_json::Map`
/// serializes with sorted keys by default (this crate does not enable the
/// `preserve_order` feature), so the resulting JSON is canonical without
/// any extra sorting step here.
pub fn compute(tag: &str, prompt_text: &str, options: &HashMap<String, Value>, max_tokens: Option<u32>) -> String {
    let canonical = serde_json::json!({
        "tag": tag,
        "prompt_text": prompt_text,
        "options": options,
        "max_tokens": max_tokens,
    });
    let serialized = serde_json::to_string(&canonical).unwrap_or_default();
    format!("{:016x}", fnv1a(serialized.as_bytes()))
}
