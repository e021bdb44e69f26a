//! Hypothesis validation against the real build.
//!
//! A [`Probe`] answers "does this statement sequence reproduce the effect":
//! it prepends the sequence to a target method, flushes, rebuilds, runs the
//! reference order and puts the target file back the way it found it.

use tracing::{debug, warn};

use async_trait::async_trait;

use crate::ddmin::Validity;
use crate::domain::{Expectation, TestId};
use crate::metrics::METRICS;
use crate::obs::emit_restore_error;
use crate::oracle::{BuildTestOracle, OrderOracle, OrderOutcome};
use crate::source::{CodeUnit, SourceTree};
use crate::statement::{resolve_mut, Statement, Step};

/// The effect a transplanted sequence must produce on the reference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    /// Make a passing order fail (polluter reproduction).
    ReproduceFailure,
    /// Make a failing order pass (setter reproduction).
    ReproducePass,
}

impl Goal {
    pub fn for_expectation(expected: Expectation) -> Self {
        match expected {
            Expectation::Fail => Goal::ReproduceFailure,
            Expectation::Pass => Goal::ReproducePass,
        }
    }

    /// Whether `outcome` shows the effect. Build or runner errors never do.
    pub fn reached(&self, outcome: OrderOutcome) -> bool {
        match self {
            Goal::ReproduceFailure => outcome == OrderOutcome::SomeFailed,
            Goal::ReproducePass => outcome == OrderOutcome::AllNotFailing,
        }
    }

    /// Whether the untouched reference order shows the opposite of the effect,
    /// which must hold before repair is meaningful.
    pub fn baseline_holds(&self, outcome: OrderOutcome) -> bool {
        match self {
            Goal::ReproduceFailure => outcome == OrderOutcome::AllNotFailing,
            Goal::ReproducePass => outcome == OrderOutcome::SomeFailed,
        }
    }
}

/// Validity oracle that edits one target method on disk per check.
pub struct Probe<'a, S: SourceTree + ?Sized, O> {
    tree: &'a mut S,
    oracle: &'a OrderOracle<O>,
    target: CodeUnit,
    baseline: Vec<u8>,
    order: Vec<TestId>,
    goal: Goal,
    iterations: usize,
}

impl<'a, S: SourceTree + ?Sized, O: BuildTestOracle> Probe<'a, S, O> {
    /// Probe by prepending to `target`, whose file is read now as the
    /// state to return to after every check.
    pub fn new(
        tree: &'a mut S,
        oracle: &'a OrderOracle<O>,
        target: CodeUnit,
        order: Vec<TestId>,
        goal: Goal,
    ) -> crate::domain::Result<Self> {
        let baseline = tree.read_file(&target.path)?;
        Ok(Self {
            tree,
            oracle,
            target,
            baseline,
            order,
            goal,
            iterations: 0,
        })
    }

    /// Number of checks run so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn target(&self) -> &CodeUnit {
        &self.target
    }

    pub async fn check(&mut self, statements: &[Statement]) -> bool {
        self.iterations += 1;
        METRICS.inc_probes();

        let edited = self.target.prepended(statements);
        let reached = match self.tree.flush(&edited) {
            Ok(_) => {
                let outcome = self.oracle.rebuild_and_check(&self.order).await;
                debug!(target_method = %self.target.id, ?outcome, "probe");
                self.goal.reached(outcome)
            }
            Err(err) => {
                warn!(target_method = %self.target.id, error = %err, "could not write probe edit");
                false
            }
        };

        if let Err(err) = self.tree.write_file(&self.target.path, &self.baseline) {
            emit_restore_error(&self.target.path, &err);
        }
        reached
    }
}

#[async_trait]
impl<S, O> Validity<Statement> for Probe<'_, S, O>
where
    S: SourceTree + ?Sized,
    O: BuildTestOracle,
{
    async fn valid(&mut self, items: &[Statement]) -> bool {
        self.check(items).await
    }
}

/// Validates candidates for one nested sequence by substituting them into
/// the whole top-level sequence.
pub struct BlockProbe<'a, V: ?Sized> {
    inner: &'a mut V,
    root: Vec<Statement>,
    path: Vec<Step>,
}

impl<'a, V: Validity<Statement> + ?Sized> BlockProbe<'a, V> {
    pub fn new(inner: &'a mut V, root: Vec<Statement>, path: Vec<Step>) -> Self {
        Self { inner, root, path }
    }
}

#[async_trait]
impl<V: Validity<Statement> + ?Sized> Validity<Statement> for BlockProbe<'_, V> {
    async fn valid(&mut self, items: &[Statement]) -> bool {
        let mut whole = self.root.clone();
        match resolve_mut(&mut whole, &self.path) {
            Some(slot) => *slot = items.to_vec(),
            None => return false,
        }
        self.inner.valid(&whole).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::Slot;

    #[test]
    fn test_goal_reached() {
        let fail = Goal::for_expectation(Expectation::Fail);
        assert!(fail.reached(OrderOutcome::SomeFailed));
        assert!(!fail.reached(OrderOutcome::Error));
        assert!(!fail.reached(OrderOutcome::AllNotFailing));

        let pass = Goal::for_expectation(Expectation::Pass);
        assert!(pass.reached(OrderOutcome::AllNotFailing));
        assert!(!pass.reached(OrderOutcome::Error));
    }

    #[test]
    fn test_baseline_holds() {
        assert!(Goal::ReproduceFailure.baseline_holds(OrderOutcome::AllNotFailing));
        assert!(!Goal::ReproduceFailure.baseline_holds(OrderOutcome::SomeFailed));
        assert!(Goal::ReproducePass.baseline_holds(OrderOutcome::SomeFailed));
        assert!(!Goal::ReproducePass.baseline_holds(OrderOutcome::Error));
    }

    struct Recorder(Vec<Vec<Statement>>);

    #[async_trait]
    impl Validity<Statement> for Recorder {
        async fn valid(&mut self, items: &[Statement]) -> bool {
            self.0.push(items.to_vec());
            true
        }
    }

    #[tokio::test]
    async fn test_block_probe_substitutes_into_root() {
        let root = vec![
            Statement::plain("a();"),
            Statement::block(vec![Statement::plain("b();"), Statement::plain("c();")]),
        ];
        let mut recorder = Recorder(Vec::new());
        let mut probe = BlockProbe::new(
            &mut recorder,
            root,
            vec![Step { index: 1, slot: Slot::Block }],
        );
        assert!(probe.valid(&[Statement::plain("c();")]).await);
        assert_eq!(
            recorder.0,
            vec![vec![
                Statement::plain("a();"),
                Statement::block(vec![Statement::plain("c();")]),
            ]]
        );
    }
}
