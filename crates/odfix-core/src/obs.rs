//! Structured lifecycle events for repair runs.
//!
//! - `RepairSpan`: RAII guard tagging everything logged during one victim's
//!   repair with `victim = ...`
//! - `emit_*`: one `info!` event per lifecycle step

use tracing::info;

use crate::domain::Status;

/// RAII guard that enters a victim-scoped span for the duration of a repair.
///
/// ```ignore
/// let _span = RepairSpan::enter("com.acme.FooTest.testVictim");
/// ```
pub struct RepairSpan {
    _span: tracing::span::EnteredSpan,
}

impl RepairSpan {
    pub fn enter(victim: &str) -> Self {
        let span = tracing::info_span!("odfix.repair", victim = %victim);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_repair_started(victim: &str, chains: usize) {
    info!(event = "repair.started", victim = %victim, chains = chains);
}

pub fn emit_candidate_attempted(victim: &str, candidate: &str, rank: usize) {
    info!(
        event = "repair.candidate_attempted",
        victim = %victim,
        candidate = %candidate,
        rank = rank,
    );
}

/// Logged once per victim, the first time any attempt yields a working fix.
pub fn emit_first_patch(victim: &str, candidate: &str, elapsed_secs: f64) {
    info!(
        event = "repair.first_patch",
        victim = %victim,
        candidate = %candidate,
        elapsed_secs = elapsed_secs,
    );
}

pub fn emit_patch_recorded(victim: &str, candidate: &str, status: Status, iterations: usize) {
    info!(
        event = "repair.patch_recorded",
        victim = %victim,
        candidate = %candidate,
        status = %status,
        iterations = iterations,
    );
}

pub fn emit_repair_finished(victim: &str, status: Status, records: usize, elapsed_secs: f64) {
    info!(
        event = "repair.finished",
        victim = %victim,
        status = %status,
        records = records,
        elapsed_secs = elapsed_secs,
    );
}

/// A restore or rebuild that could not complete (warning level).
pub fn emit_restore_error(path: &std::path::Path, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "repair.restore_error", path = %path.display(), error = %error);
}
