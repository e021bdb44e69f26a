//! Removability check: strip the minimal statements out of the method they
//! came from and see whether it still stands on its own.

use tracing::{debug, info, warn};

use crate::domain::{OdfixError, Removability, Result, TestId};
use crate::oracle::{BuildTestOracle, OrderOracle};
use crate::source::{CodeUnit, FileBackup, MethodId, SourceTree};
use crate::statement::{strip, Statement};

/// Classify whether `minimal` can be removed from `source`.
///
/// Works on pristine files: every captured file is restored first. The
/// source file is restored and the project rebuilt on every exit path.
/// A source that cannot be located or read is not removable; only a failed
/// restore is an error.
pub async fn classify_removal<S, O>(
    guard: &mut FileBackup<'_, S>,
    oracle: &OrderOracle<O>,
    source: &MethodId,
    minimal: &[Statement],
    reference_order: &[TestId],
) -> Result<Removability>
where
    S: SourceTree + ?Sized,
    O: BuildTestOracle,
{
    guard.restore()?;
    let unit = match guard.find_method(source) {
        Ok(Some(unit)) => unit,
        Ok(None) => return Ok(not_removable(source, &OdfixError::MethodNotFound(source.qualified()))),
        Err(err) => return Ok(not_removable(source, &err)),
    };
    if let Err(err) = guard.capture(&unit.path) {
        return Ok(not_removable(source, &err));
    }

    let verdict = strip_and_check(guard, oracle, &unit, minimal, reference_order).await;

    let restored = guard.restore_only(&unit.path);
    oracle.rebuild().await;
    restored?;

    info!(source = %source, ?verdict, "removal check");
    Ok(verdict)
}

fn not_removable(source: &MethodId, err: &OdfixError) -> Removability {
    warn!(source = %source, error = %err, "could not set up removal check");
    Removability::NotRemovable
}

async fn strip_and_check<S, O>(
    guard: &mut FileBackup<'_, S>,
    oracle: &OrderOracle<O>,
    unit: &CodeUnit,
    minimal: &[Statement],
    reference_order: &[TestId],
) -> Removability
where
    S: SourceTree + ?Sized,
    O: BuildTestOracle,
{
    let stripped = strip(&unit.body, minimal);
    if stripped == unit.body {
        return Removability::SetupTeardown;
    }

    if let Err(err) = guard.flush(&unit.with_body(stripped)) {
        debug!(error = %err, "could not write stripped source");
        return Removability::NotRemovable;
    }
    if !oracle.rebuild().await {
        debug!("stripped source does not build");
        return Removability::NotRemovable;
    }

    let source_test = unit.id.qualified();
    if oracle.test_order_fails(std::slice::from_ref(&source_test)).await {
        debug!("stripped source fails on its own");
        return Removability::NotRemovable;
    }

    let mut substituted: Vec<TestId> = reference_order.to_vec();
    substituted.pop();
    substituted.push(source_test);
    if oracle.test_order_fails(&substituted).await {
        debug!("stripped source fails in the reference order");
        return Removability::NotRemovable;
    }

    Removability::CanRemove
}
