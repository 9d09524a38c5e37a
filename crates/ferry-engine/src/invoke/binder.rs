//! Ranking and selection among viable candidates

use crate::flags::ReorderFlags;
use crate::marshal::CandidateMatch;

/// Strategy for ordering viable candidates and picking one
pub trait Binder: Send + Sync {
    /// Reorder viable candidates, most specific first
    fn reorder(&self, matches: &mut Vec<CandidateMatch>, flags: ReorderFlags);

    /// Index of the candidate to invoke when no explicit index was given
    fn select(&self, matches: &[CandidateMatch]) -> usize {
        let _ = matches;
        0
    }
}

/// Ranks by total coercion cost, then by exact-match count.
///
/// The sort is stable, so ties keep discovery order unless a parameter-count
/// preference is requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBinder;

impl Binder for DefaultBinder {
    fn reorder(&self, matches: &mut Vec<CandidateMatch>, flags: ReorderFlags) {
        matches.sort_by(|a, b| {
            let by_params = if flags.contains(ReorderFlags::FEWEST_PARAMETERS) {
                a.args.len().cmp(&b.args.len())
            } else if flags.contains(ReorderFlags::MOST_PARAMETERS) {
                b.args.len().cmp(&a.args.len())
            } else {
                std::cmp::Ordering::Equal
            };
            a.total_cost()
                .cmp(&b.total_cost())
                .then_with(|| b.exact_count().cmp(&a.exact_count()))
                .then(by_params)
        });
    }
}
