//! Per-victim repair driver.
//!
//! For one [`VictimCase`]: select candidates, then for each candidate run
//! placement, minimization, inline resolution and the removability check,
//! recording one [`PatchRecord`] per attempt. Every file touched during an
//! attempt is restored before the next one starts.

use std::path::PathBuf;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{
    AggregateResult, CausalChain, FlakyClass, OdfixError, OperationTime, PatchRecord, Result,
    Status, Stopwatch, TestId, VictimCase,
};
use crate::inline::try_inline;
use crate::minimizer::minimize;
use crate::obs::{
    emit_candidate_attempted, emit_first_patch, emit_patch_recorded, emit_repair_finished,
    emit_repair_started, RepairSpan,
};
use crate::oracle::{BuildTestOracle, OrderOracle};
use crate::patch::FixPatch;
use crate::placement::{candidate_statements, find_placement};
use crate::probe::{Goal, Probe};
use crate::recorder::{write_patch, PatchArtifact};
use crate::removal::classify_removal;
use crate::selector::select_candidates;
use crate::source::{CodeUnit, FileBackup, MethodId, SourceTree};
use crate::statement::statements_size;

/// State threaded through one victim's repair.
#[derive(Debug)]
pub struct RepairSession {
    pub id: Uuid,
    pub victim: TestId,
    watch: Stopwatch,
    first_patch_logged: bool,
}

impl RepairSession {
    pub fn new(victim: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            victim: victim.to_string(),
            watch: Stopwatch::start(),
            first_patch_logged: false,
        }
    }

    fn note_fix(&mut self, candidate: &str) {
        if !self.first_patch_logged {
            self.first_patch_logged = true;
            emit_first_patch(&self.victim, candidate, self.watch.elapsed_seconds());
        }
    }
}

/// Everything one `repair_case` call produced.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub result: AggregateResult,
    /// One entry per attempt that ended in a working fix, in attempt order.
    pub fixes: Vec<FixPatch>,
}

impl RepairOutcome {
    /// The highest-status fix, earliest on ties.
    pub fn best_fix(&self) -> Option<&FixPatch> {
        self.fixes
            .iter()
            .fold(None, |best: Option<&FixPatch>, fix| match best {
                Some(b) if b.status >= fix.status => Some(b),
                _ => Some(fix),
            })
    }
}

struct Attempt {
    record: PatchRecord,
    fix: Option<FixPatch>,
}

pub struct RepairEngine<S, O> {
    tree: S,
    oracle: OrderOracle<O>,
    config: EngineConfig,
}

impl<S: SourceTree, O: BuildTestOracle> RepairEngine<S, O> {
    pub fn new(tree: S, backend: O, config: EngineConfig) -> Self {
        Self {
            tree,
            oracle: OrderOracle::new(backend),
            config,
        }
    }

    pub fn tree(&self) -> &S {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut S {
        &mut self.tree
    }

    pub fn oracle(&self) -> &OrderOracle<O> {
        &self.oracle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_tree(self) -> S {
        self.tree
    }

    /// Repair one victim and return its aggregate result.
    pub async fn repair(&mut self, case: &VictimCase) -> Result<AggregateResult> {
        Ok(self.repair_case(case).await?.result)
    }

    /// Repair one victim, also returning the fixes found.
    ///
    /// Only failures to create the artifact directory, to write an artifact
    /// or to restore a touched file are returned as errors. Any other
    /// collaborator error ends the current candidate's attempt with a
    /// negative record and the next candidate is tried.
    pub async fn repair_case(&mut self, case: &VictimCase) -> Result<RepairOutcome> {
        let mut session = RepairSession::new(&case.victim);
        let _span = RepairSpan::enter(&case.victim);
        emit_repair_started(&case.victim, case.chains.len());
        std::fs::create_dir_all(self.config.fixer_dir())?;

        let mut records = Vec::new();
        let mut fixes = Vec::new();

        if case.flaky == FlakyClass::NonOrderDependent {
            records.push(PatchRecord::early(Status::Nod, case.victim.as_str(), None));
        } else if case.chains.is_empty() {
            records.push(PatchRecord::early(Status::NoDeps, case.victim.as_str(), None));
        } else {
            let selection = select_candidates(&case.victim, case.expected, &case.chains);
            for chain in &selection.unsupported {
                info!(victim = %case.victim, deps = ?chain.deps, "chain shape not supported");
                let candidate = chain.source_test(case.expected);
                records.push(PatchRecord::early(Status::Unsupported, case.victim.as_str(), candidate));
            }
            for (rank, chain) in selection.candidates.iter().enumerate() {
                let attempt = self.attempt(&mut session, case, chain, rank).await?;
                emit_patch_recorded(
                    &case.victim,
                    &attempt.record.candidate,
                    attempt.record.status,
                    attempt.record.iterations,
                );
                records.push(attempt.record);
                fixes.extend(attempt.fix);
            }
        }

        let result = AggregateResult::from_records(session.watch.finish(), case.victim.as_str(), records);
        emit_repair_finished(
            &case.victim,
            result.status,
            result.records.len(),
            result.time.elapsed_seconds(),
        );
        Ok(RepairOutcome { result, fixes })
    }

    async fn attempt(
        &mut self,
        session: &mut RepairSession,
        case: &VictimCase,
        chain: &CausalChain,
        rank: usize,
    ) -> Result<Attempt> {
        let victim = case.victim.as_str();
        let Some(source_test) = chain.source_test(case.expected) else {
            return Ok(early(Status::MissingMethod, victim, None));
        };
        emit_candidate_attempted(victim, source_test, rank);

        let (Some(victim_unit), Some(source_unit)) =
            (self.locate(victim), self.locate(source_test))
        else {
            return Ok(early(Status::MissingMethod, victim, Some(source_test)));
        };

        let watch = Stopwatch::start();
        let goal = Goal::for_expectation(case.expected);
        let order: Vec<TestId> = vec![victim.to_string()];
        let fixer_dir = self.config.fixer_dir();

        let baseline = self.oracle.rebuild_and_check(&order).await;
        if !goal.baseline_holds(baseline) {
            info!(victim, candidate = source_test, ?baseline, "reference order does not show the baseline");
            let artifact = PatchArtifact {
                status: Status::NotFailing.label(),
                polluter: Some(&source_unit),
                elapsed_secs: watch.elapsed_seconds(),
                ..Default::default()
            };
            let path = record_artifact(&fixer_dir, victim, &artifact)?;
            return Ok(finished(watch.finish(), Status::NotFailing, victim, source_test, 0, path));
        }

        let candidate = match candidate_statements(&self.tree, &source_unit, &victim_unit.id.class, &self.config) {
            Ok(candidate) => candidate,
            Err(err) => {
                warn!(victim, candidate = source_test, error = %err, "could not resolve hooks");
                return Ok(early(Status::MissingMethod, victim, Some(source_test)));
            }
        };
        let original_size = statements_size(&candidate);

        let oracle = &self.oracle;
        let config = &self.config;
        let mut guard = FileBackup::new(&mut self.tree);

        let placement = find_placement(
            &mut guard,
            oracle,
            &victim_unit,
            &source_unit.id.class,
            &candidate,
            &order,
            goal,
            config,
        )
        .await?;
        let Some(placement) = placement else {
            guard.restore()?;
            drop(guard);
            let artifact = PatchArtifact {
                status: Status::CleanerFail.label(),
                modified: Some(&victim_unit),
                polluter: Some(&source_unit),
                original_size,
                block: Some(&candidate),
                begin: 0,
                elapsed_secs: watch.elapsed_seconds(),
            };
            let path = record_artifact(&fixer_dir, victim, &artifact)?;
            return Ok(finished(watch.finish(), Status::CleanerFail, victim, source_test, 0, path));
        };

        let minimize_watch = Stopwatch::start();
        let minimized = match Probe::new(&mut *guard, oracle, placement.helper.clone(), order.clone(), goal) {
            Ok(mut probe) => {
                let minimal = minimize(candidate.clone(), &mut probe).await;
                Ok((minimal, probe.iterations()))
            }
            Err(err) => Err(err),
        };
        let minimize_time = minimize_watch.finish();
        let (minimal, iterations) = match minimized {
            Ok(minimized) => minimized,
            Err(err) => {
                warn!(victim, candidate = source_test, error = %err, "could not set up minimization");
                guard.restore()?;
                drop(guard);
                oracle.rebuild().await;
                let artifact = PatchArtifact {
                    status: Status::CleanerFail.label(),
                    modified: Some(&victim_unit),
                    polluter: Some(&source_unit),
                    original_size,
                    block: Some(&candidate),
                    begin: 0,
                    elapsed_secs: watch.elapsed_seconds(),
                };
                let path = record_artifact(&fixer_dir, victim, &artifact)?;
                return Ok(finished(watch.finish(), Status::CleanerFail, victim, source_test, 0, path));
            }
        };
        info!(
            victim,
            candidate = source_test,
            from = original_size,
            to = statements_size(&minimal),
            iterations,
            elapsed_secs = minimize_time.elapsed_seconds(),
            "minimized"
        );

        let still_valid = match Probe::new(&mut *guard, oracle, placement.helper.clone(), order.clone(), goal) {
            Ok(mut probe) => probe.check(&minimal).await,
            Err(err) => {
                warn!(victim, candidate = source_test, error = %err, "could not set up re-check");
                false
            }
        };
        if !still_valid {
            warn!(victim, candidate = source_test, "minimal sequence no longer reproduces the effect");
            guard.restore()?;
            drop(guard);
            oracle.rebuild().await;
            let artifact = PatchArtifact {
                status: Status::FixInvalid.label(),
                modified: Some(&victim_unit),
                polluter: Some(&source_unit),
                original_size,
                block: Some(&minimal),
                begin: 0,
                elapsed_secs: minimize_time.elapsed_seconds(),
            };
            let path = record_artifact(&fixer_dir, victim, &artifact)?;
            return Ok(finished(minimize_time, Status::FixInvalid, victim, source_test, iterations, path));
        }

        let inlined = try_inline(&mut guard, oracle, &victim_unit.id, &minimal, &order, goal).await?;
        let removability = classify_removal(&mut guard, oracle, &source_unit.id, &minimal, &order).await?;
        let status = Status::for_fix(inlined, removability);

        guard.restore()?;
        drop(guard);
        oracle.rebuild().await;

        let artifact = PatchArtifact {
            status: status.label(),
            modified: Some(&victim_unit),
            polluter: Some(&source_unit),
            original_size,
            block: Some(&minimal),
            begin: victim_unit.begin_line + 1,
            elapsed_secs: minimize_time.elapsed_seconds(),
        };
        let path = record_artifact(&fixer_dir, victim, &artifact)?;
        session.note_fix(source_test);

        let fix = FixPatch {
            victim: victim_unit.id.clone(),
            source_class: source_unit.id.class.clone(),
            call: placement.call,
            block: minimal,
            inlined,
            status,
        };
        Ok(Attempt {
            record: finished(minimize_time, status, victim, source_test, iterations, path).record,
            fix: Some(fix),
        })
    }

    fn locate(&self, test: &str) -> Option<CodeUnit> {
        let id = match MethodId::parse(test) {
            Ok(id) => id,
            Err(err) => {
                warn!(test, error = %err, "unusable test identifier");
                return None;
            }
        };
        match self.tree.find_method(&id) {
            Ok(Some(unit)) => Some(unit),
            Ok(None) => {
                info!(test, "method not found in source tree");
                None
            }
            Err(err) => {
                warn!(test, error = %err, "source lookup failed");
                None
            }
        }
    }
}

fn early(status: Status, victim: &str, candidate: Option<&str>) -> Attempt {
    Attempt {
        record: PatchRecord::early(status, victim, candidate),
        fix: None,
    }
}

fn finished(
    time: OperationTime,
    status: Status,
    victim: &str,
    candidate: &str,
    iterations: usize,
    path: PathBuf,
) -> Attempt {
    Attempt {
        record: PatchRecord::new(time, status, victim, Some(candidate), iterations, Some(path)),
        fix: None,
    }
}

fn record_artifact(dir: &std::path::Path, victim: &str, artifact: &PatchArtifact<'_>) -> Result<PathBuf> {
    write_patch(dir, victim, artifact).map_err(|e| OdfixError::Artifact(format!("{e:#}")))
}
