//! Causal chains and the upstream victim cases that carry them.

use serde::{Deserialize, Serialize};

use super::record::OperationTime;

/// Fully qualified test identifier, `package.Class.method`.
pub type TestId = String;

/// Class part of a test identifier (everything before the last `.`).
pub fn class_of(test: &str) -> &str {
    test.rsplit_once('.').map_or("", |(class, _)| class)
}

/// Method part of a test identifier (everything after the last `.`).
pub fn method_of(test: &str) -> &str {
    test.rsplit_once('.').map_or(test, |(_, method)| method)
}

/// Whether two tests are declared in the same source class.
pub fn same_test_class(a: &str, b: &str) -> bool {
    class_of(a) == class_of(b)
}

/// A group of tests that together act as a cleaner for a chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CleanerGroup {
    pub tests: Vec<TestId>,
}

impl CleanerGroup {
    pub fn new(tests: Vec<TestId>) -> Self {
        Self { tests }
    }

    /// The sole cleaner test, if the group has exactly one.
    pub fn single(&self) -> Option<&str> {
        match self.tests.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

/// Cleaner candidates observed upstream for one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CleanerInfo {
    #[serde(default)]
    pub groups: Vec<CleanerGroup>,
}

/// Minimal ordered list of tests establishing one causal path to a victim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CausalChain {
    /// Discovery order (0 is the first chain found).
    pub index: usize,
    pub deps: Vec<TestId>,
    pub time: OperationTime,
    #[serde(default)]
    pub cleaners: CleanerInfo,
}

impl CausalChain {
    pub fn new(index: usize, deps: Vec<TestId>, time: OperationTime) -> Self {
        Self {
            index,
            deps,
            time,
            cleaners: CleanerInfo::default(),
        }
    }

    pub fn with_cleaners(mut self, cleaners: CleanerInfo) -> Self {
        self.cleaners = cleaners;
        self
    }

    /// The chain's order followed by the victim (never duplicated).
    pub fn with_victim(&self, victim: &str) -> Vec<TestId> {
        let mut order = self.deps.clone();
        if !order.iter().any(|t| t == victim) {
            order.push(victim.to_string());
        }
        order
    }

    /// The test whose behavior is transplanted when reproducing the effect.
    ///
    /// Polluters contribute their last dependency; setters their first.
    pub fn source_test(&self, expected: Expectation) -> Option<&str> {
        match expected {
            Expectation::Fail => self.deps.last().map(String::as_str),
            Expectation::Pass => self.deps.first().map(String::as_str),
        }
    }

    pub fn has_cleaner(&self) -> bool {
        !self.cleaners.groups.is_empty()
    }
}

/// Outcome of the victim when run after its causal chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Expectation {
    /// The chain makes the victim pass (setters); alone it fails.
    Pass,
    /// The chain makes the victim fail (polluters); alone it passes.
    Fail,
}

/// Upstream flakiness classification of a victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlakyClass {
    OrderDependent,
    /// Flaky without an order dependency (NOD); never patched.
    NonOrderDependent,
}

/// One victim with everything the upstream detector/minimizer found for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictimCase {
    pub victim: TestId,
    pub expected: Expectation,
    pub flaky: FlakyClass,
    #[serde(default)]
    pub chains: Vec<CausalChain>,
}

impl VictimCase {
    /// Fold `other` into `self`, appending chains not already present.
    pub fn absorb(&mut self, other: VictimCase) {
        for chain in other.chains {
            if !self.chains.contains(&chain) {
                self.chains.push(chain);
            }
        }
    }
}

/// Merge cases that share a victim, keeping first-seen order.
pub fn merge_cases(cases: Vec<VictimCase>) -> Vec<VictimCase> {
    let mut merged: Vec<VictimCase> = Vec::new();
    for case in cases {
        match merged.iter_mut().find(|m| m.victim == case.victim) {
            Some(existing) => existing.absorb(case),
            None => merged.push(case),
        }
    }
    merged
}
