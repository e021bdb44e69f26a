//! Inline resolution: can the minimal sequence live directly in the victim?

use tracing::{info, warn};

use crate::domain::{OdfixError, Result, TestId};
use crate::oracle::{BuildTestOracle, OrderOracle};
use crate::probe::{Goal, Probe};
use crate::source::{FileBackup, MethodId, SourceTree};
use crate::statement::Statement;

/// Put the victim's file back to its captured state, then check whether
/// `minimal` prepended straight into the victim reproduces the effect.
///
/// A `false` result is not an error: the fix keeps its helper indirection.
/// Lookup failures also answer `false`; only a failed restore is an error.
pub async fn try_inline<S, O>(
    guard: &mut FileBackup<'_, S>,
    oracle: &OrderOracle<O>,
    victim: &MethodId,
    minimal: &[Statement],
    order: &[TestId],
    goal: Goal,
) -> Result<bool>
where
    S: SourceTree + ?Sized,
    O: BuildTestOracle,
{
    let path = match guard.class_file(&victim.class) {
        Ok(Some(path)) => path,
        Ok(None) => return Ok(not_inlined(victim, &OdfixError::ClassNotFound(victim.class.clone()))),
        Err(err) => return Ok(not_inlined(victim, &err)),
    };
    guard.restore_only(&path)?;

    let unit = match guard.find_method(victim) {
        Ok(Some(unit)) => unit,
        Ok(None) => return Ok(not_inlined(victim, &OdfixError::MethodNotFound(victim.qualified()))),
        Err(err) => return Ok(not_inlined(victim, &err)),
    };
    let mut probe = match Probe::new(&mut **guard, oracle, unit, order.to_vec(), goal) {
        Ok(probe) => probe,
        Err(err) => return Ok(not_inlined(victim, &err)),
    };
    let inlined = probe.check(minimal).await;
    if !inlined {
        info!(victim = %victim, "inlining the minimal sequence does not reproduce the effect");
    }
    Ok(inlined)
}

fn not_inlined(victim: &MethodId, err: &OdfixError) -> bool {
    warn!(victim = %victim, error = %err, "could not set up inline check");
    false
}
