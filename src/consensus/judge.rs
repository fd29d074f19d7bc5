//! Judge runoff: an out-of-band callable consulted when no bucket meets
//! quorum on its own. Rust has no runtime `module:function` resolution, so
//! unlike the original the callable itself is supplied directly as a trait
//! object; `judge_name` is carried separately purely as an event/result
//! label (see DESIGN.md).

use crate::response::ProviderResponse;

/// Picks a winner among the surviving candidate responses, returning its
/// text (matched back against a candidate by normalized text) and a score.
pub trait Judge: Send + Sync {
    fn judge(&self, responses: &[ProviderResponse]) -> (String, f64);
}

/// Wraps a plain closure as a `Judge`, for tests and simple call sites.
pub struct JudgeFn<F>(pub F)
where
    F: Fn(&[ProviderResponse]) -> (String, f64) + Send + Sync;

impl<F> Judge for JudgeFn<F>
where
    F: Fn(&[ProviderResponse]) -> (String, f64) + Send + Sync,
{
    fn judge(&self, responses: &[ProviderResponse]) -> (String, f64) {
        (self.0)(responses)
    }
}
