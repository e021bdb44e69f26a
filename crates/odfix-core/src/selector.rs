//! Candidate selection: which causal chains to attempt, and in what order.
//!
//! Chains are bucketed by how promising they look before any build/test
//! cycle is spent on them. Within a bucket chains keep discovery order
//! (`CausalChain::index`), so the same input always yields the same order.

use crate::domain::{same_test_class, CausalChain, Expectation};

/// Ordered candidates plus chains rejected up front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub candidates: Vec<CausalChain>,
    /// Chains whose shape cannot be repaired (reported UNSUPPORTED).
    pub unsupported: Vec<CausalChain>,
}

/// Order `chains` for repairing `victim`.
pub fn select_candidates(victim: &str, expected: Expectation, chains: &[CausalChain]) -> Selection {
    let mut sorted: Vec<&CausalChain> = chains.iter().collect();
    sorted.sort_by_key(|c| c.index);
    match expected {
        Expectation::Pass => select_setters(victim, &sorted),
        Expectation::Fail => select_polluters(victim, &sorted),
    }
}

fn select_setters(victim: &str, chains: &[&CausalChain]) -> Selection {
    let mut same_class = Vec::new();
    let mut other = Vec::new();
    let mut unsupported = Vec::new();
    for &chain in chains {
        match chain.deps.as_slice() {
            [setter] if same_test_class(setter, victim) => same_class.push(chain.clone()),
            [_] => other.push(chain.clone()),
            _ => unsupported.push(chain.clone()),
        }
    }
    same_class.extend(other);
    Selection {
        candidates: same_class,
        unsupported,
    }
}

/// Priority buckets for failing-order repair, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bucket {
    SingleCleanerWithPolluter,
    SingleCleanerWithVictim,
    SingleCleaner,
    AnyCleaner,
    NoCleaner,
}

fn bucket_of(victim: &str, chain: &CausalChain) -> Bucket {
    if !chain.has_cleaner() {
        return Bucket::NoCleaner;
    }
    let polluter = chain.deps.last().map(String::as_str).unwrap_or_default();
    chain
        .cleaners
        .groups
        .iter()
        .filter_map(|g| g.single())
        .map(|cleaner| {
            if same_test_class(cleaner, polluter) {
                Bucket::SingleCleanerWithPolluter
            } else if same_test_class(cleaner, victim) {
                Bucket::SingleCleanerWithVictim
            } else {
                Bucket::SingleCleaner
            }
        })
        .min()
        .unwrap_or(Bucket::AnyCleaner)
}

fn select_polluters(victim: &str, chains: &[&CausalChain]) -> Selection {
    let mut ranked: Vec<(Bucket, &CausalChain)> =
        chains.iter().map(|&c| (bucket_of(victim, c), c)).collect();
    // stable: discovery order within a bucket
    ranked.sort_by_key(|(bucket, _)| *bucket);
    Selection {
        candidates: ranked.into_iter().map(|(_, c)| c.clone()).collect(),
        unsupported: Vec::new(),
    }
}
