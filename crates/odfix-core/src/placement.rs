//! Placement search: building the full candidate sequence and finding a
//! helper indirection under which it reproduces the effect.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::domain::{Result, TestId};
use crate::hooks::hook_statements;
use crate::oracle::{BuildTestOracle, OrderOracle};
use crate::probe::{Goal, Probe};
use crate::source::{CodeUnit, FileBackup, HookCategory, SourceTree};
use crate::statement::Statement;

/// How the victim reaches the synthesized helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelperCall {
    /// `new Source().helper();`
    NewInstance,
    /// `helper();`
    Bare,
}

impl HelperCall {
    pub fn statement(&self, source_class: &str, helper: &str) -> Statement {
        match self {
            HelperCall::NewInstance => Statement::call(Some(source_class), helper),
            HelperCall::Bare => Statement::call(None, helper),
        }
    }
}

/// Candidate sequence transplanting `source`'s behavior in front of a test
/// of `target_class`.
///
/// Hook code is grouped in blocks so the minimizer can drop or unravel each
/// group as a unit. Suite hooks are left out when both tests share a class.
pub fn candidate_statements<S: SourceTree + ?Sized>(
    tree: &S,
    source: &CodeUnit,
    target_class: &str,
    config: &EngineConfig,
) -> Result<Vec<Statement>> {
    let class = source.id.class.as_str();
    let same_class = class == target_class;
    let hooks = |category| -> Result<Statement> {
        Ok(Statement::block(hook_statements(tree, class, category, config)?))
    };

    let mut out = Vec::new();
    if !same_class {
        out.push(hooks(HookCategory::PreSuite)?);
    }
    out.push(hooks(HookCategory::PreTest)?);
    if source.expects_exception {
        out.push(Statement::suppressing(source.body.clone(), &config.catch_type));
    } else {
        out.extend(source.body.iter().cloned());
    }
    out.push(hooks(HookCategory::PostTest)?);
    if !same_class {
        out.push(hooks(HookCategory::PostSuite)?);
    }
    Ok(out)
}

/// A working indirection: the victim calls an (empty) helper in the source
/// class. Both edits are on disk when this is returned.
#[derive(Debug, Clone)]
pub struct Placement {
    pub call: HelperCall,
    pub victim: CodeUnit,
    pub helper: CodeUnit,
}

/// Try each configured helper strategy on the victim until the full
/// candidate reproduces the effect.
///
/// Every file edited here is captured by `guard`. A failed strategy is rolled
/// back and the project rebuilt before the next is tried. Returns `None` when
/// no strategy works or the files cannot be backed up, with everything
/// restored. Only a failed restore is an error.
#[allow(clippy::too_many_arguments)]
pub async fn find_placement<S, O>(
    guard: &mut FileBackup<'_, S>,
    oracle: &OrderOracle<O>,
    victim: &CodeUnit,
    source_class: &str,
    candidate: &[Statement],
    order: &[TestId],
    goal: Goal,
    config: &EngineConfig,
) -> Result<Option<Placement>>
where
    S: SourceTree + ?Sized,
    O: BuildTestOracle,
{
    let captured = guard
        .capture(&victim.path)
        .and_then(|_| guard.capture_class(source_class));
    if let Err(err) = captured {
        warn!(victim = %victim.id, error = %err, "could not back up files for placement");
        return Ok(None);
    }

    for &call in &config.placement {
        match attempt(guard, oracle, victim, source_class, candidate, order, goal, call, config).await {
            Ok(Some(placement)) => {
                info!(victim = %victim.id, ?call, "placement reproduces the effect");
                return Ok(Some(placement));
            }
            Ok(None) => {
                info!(victim = %victim.id, ?call, "full candidate does not reproduce the effect");
            }
            Err(err) => {
                warn!(victim = %victim.id, ?call, error = %err, "placement attempt could not be set up");
            }
        }
        guard.restore()?;
        oracle.rebuild().await;
    }
    Ok(None)
}

#[allow(clippy::too_many_arguments)]
async fn attempt<S, O>(
    guard: &mut FileBackup<'_, S>,
    oracle: &OrderOracle<O>,
    victim: &CodeUnit,
    source_class: &str,
    candidate: &[Statement],
    order: &[TestId],
    goal: Goal,
    call: HelperCall,
    config: &EngineConfig,
) -> Result<Option<Placement>>
where
    S: SourceTree + ?Sized,
    O: BuildTestOracle,
{
    let call_stmt = call.statement(source_class, &config.helper_name);
    guard.flush(&victim.prepended(&[call_stmt]))?;
    let helper = guard.add_method(source_class, &config.helper_name)?;

    let mut probe = Probe::new(&mut **guard, oracle, helper.clone(), order.to_vec(), goal)?;
    if !probe.check(candidate).await {
        return Ok(None);
    }
    // reload: adding the helper may have shifted the victim
    let victim = guard
        .find_method(&victim.id)?
        .ok_or_else(|| crate::domain::OdfixError::MethodNotFound(victim.id.qualified()))?;
    Ok(Some(Placement {
        call,
        victim,
        helper,
    }))
}
