//! Context budgeter: picks the observations to inject under a token ceiling.
//!
//! Candidates arrive already ordered (importance descending, then newest
//! first). The budgeter walks them greedily and stops at the first one
//! that would overflow the ceiling; later, smaller candidates are not
//! considered.

use serde::Serialize;

use crate::observation::Observation;

/// Ceiling used when the caller does not pass one.
pub const DEFAULT_MAX_TOKENS: usize = 4000;

/// Cost assumed for an observation without a precomputed `tokens` value.
pub const FALLBACK_TOKEN_ESTIMATE: usize = 100;

/// The accepted prefix and what it costs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetSelection {
    pub selected: Vec<Observation>,
    pub total_tokens: usize,
}

/// Token cost of one observation.
pub fn token_cost(observation: &Observation) -> usize {
    observation
        .tokens
        .and_then(|t| usize::try_from(t).ok())
        .unwrap_or(FALLBACK_TOKEN_ESTIMATE)
}

/// Greedy prefix accumulation under `max_tokens`.
pub fn select_for_budget(candidates: Vec<Observation>, max_tokens: usize) -> BudgetSelection {
    let mut selection = BudgetSelection::default();
    for observation in candidates {
        let cost = token_cost(&observation);
        if selection.total_tokens + cost > max_tokens {
            break;
        }
        selection.total_tokens += cost;
        selection.selected.push(observation);
    }
    selection
}
