//! Outcome classification lattice for repair attempts.

use serde::{Deserialize, Serialize};

/// Quality of one repair attempt, strictly ordered from worst to best.
///
/// The derived `Ord` follows declaration order, so `max` over a set of
/// statuses picks the best fix seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Victim is flaky without an order dependency; not patched.
    Nod,
    /// Victim has no causal chains.
    NoDeps,
    /// Chain shape is not supported (multi-dependency passing-order repair).
    Unsupported,
    /// Victim or source method could not be located.
    MissingMethod,
    /// Reference order does not reproduce the expected baseline.
    NotFailing,
    NoCleaner,
    /// No placement strategy reproduces the effect.
    CleanerFail,
    /// The minimized sequence no longer validates on re-check.
    FixInvalid,
    FixNoInline,
    FixInline,
    FixNoInlineCanremove,
    FixInlineCanremove,
    FixNoInlineSetupteardown,
    FixInlineSetupteardown,
}

/// Result of stripping the minimal statements out of their source method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Removability {
    /// Stripping did not leave a self-sufficient, order-dependent source.
    NotRemovable,
    /// The source stays self-sufficient without the statements.
    CanRemove,
    /// Every minimal statement is only reachable through lifecycle hooks.
    SetupTeardown,
}

impl Status {
    /// Combine inline success with the removability class.
    pub fn for_fix(inlined: bool, removability: Removability) -> Self {
        match (inlined, removability) {
            (true, Removability::SetupTeardown) => Status::FixInlineSetupteardown,
            (true, Removability::CanRemove) => Status::FixInlineCanremove,
            (true, Removability::NotRemovable) => Status::FixInline,
            (false, Removability::SetupTeardown) => Status::FixNoInlineSetupteardown,
            (false, Removability::CanRemove) => Status::FixNoInlineCanremove,
            (false, Removability::NotRemovable) => Status::FixNoInline,
        }
    }

    /// Whether this status represents a working fix.
    pub fn is_fix(&self) -> bool {
        *self > Status::FixInvalid
    }

    /// Human-readable label written into patch artifacts.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Nod => "NOD",
            Status::NoDeps => "NO DEPS",
            Status::Unsupported => "UNSUPPORTED",
            Status::MissingMethod => "MISSING METHOD",
            Status::NotFailing => "NOT PASSING ORDER",
            Status::NoCleaner => "NO CLEANER",
            Status::CleanerFail => "CLEANER DOES NOT FIX",
            Status::FixInvalid => "BROKEN MINIMAL",
            Status::FixNoInline => "INLINE FAIL",
            Status::FixInline => "INLINE SUCCESSFUL",
            Status::FixNoInlineCanremove => "INLINE FAIL CANREMOVE",
            Status::FixInlineCanremove => "INLINE SUCCESSFUL CANREMOVE",
            Status::FixNoInlineSetupteardown => "INLINE FAIL SETUPTEARDOWN",
            Status::FixInlineSetupteardown => "INLINE SUCCESSFUL SETUPTEARDOWN",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATTICE: [Status; 14] = [
        Status::Nod,
        Status::NoDeps,
        Status::Unsupported,
        Status::MissingMethod,
        Status::NotFailing,
        Status::NoCleaner,
        Status::CleanerFail,
        Status::FixInvalid,
        Status::FixNoInline,
        Status::FixInline,
        Status::FixNoInlineCanremove,
        Status::FixInlineCanremove,
        Status::FixNoInlineSetupteardown,
        Status::FixInlineSetupteardown,
    ];

    #[test]
    fn test_lattice_is_strictly_increasing() {
        for pair in LATTICE.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should rank below {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_fix_statuses_are_monotone() {
        assert!(Status::FixInlineSetupteardown >= Status::FixInlineCanremove);
        assert!(Status::FixInlineCanremove >= Status::FixInline);
        assert!(Status::FixInline >= Status::FixNoInline);
        assert!(Status::FixNoInlineSetupteardown >= Status::FixNoInlineCanremove);
        assert!(Status::FixNoInlineCanremove >= Status::FixNoInline);
        assert!(Status::FixNoInline >= Status::FixInvalid);
    }

    #[test]
    fn test_for_fix_picks_matching_entry() {
        assert_eq!(
            Status::for_fix(true, Removability::NotRemovable),
            Status::FixInline
        );
        assert_eq!(
            Status::for_fix(false, Removability::CanRemove),
            Status::FixNoInlineCanremove
        );
        assert_eq!(
            Status::for_fix(true, Removability::SetupTeardown),
            Status::FixInlineSetupteardown
        );
    }

    #[test]
    fn test_is_fix_threshold() {
        assert!(!Status::FixInvalid.is_fix());
        assert!(!Status::CleanerFail.is_fix());
        assert!(Status::FixNoInline.is_fix());
    }

    #[test]
    fn test_max_over_statuses() {
        let best = [Status::CleanerFail, Status::FixInline, Status::MissingMethod]
            .into_iter()
            .max();
        assert_eq!(best, Some(Status::FixInline));
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&Status::FixNoInlineCanremove).expect("serialize");
        assert_eq!(json, "\"FIX_NO_INLINE_CANREMOVE\"");
        let back: Status = serde_json::from_str("\"NOT_FAILING\"").expect("deserialize");
        assert_eq!(back, Status::NotFailing);
    }
}
