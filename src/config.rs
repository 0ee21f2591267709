//! # Reconciliation Tuning
//!
//! Knobs for a reconciliation run. Defaults reproduce the behavior of the
//! production sync pipeline; deviations are explicit caller choices.

/// Tie-break policy for canonical records whose names normalize to the
/// same key.
///
/// Canonical names are assumed unique per source; when they are not, the
/// winner is chosen deterministically rather than treated as an error.
/// `LastWins` matches the historical behavior of the sync pipeline. The
/// policy is configurable because it is an observed accident of iteration
/// order, not a confirmed business rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The last canonical record in iteration order shadows earlier ones.
    #[default]
    LastWins,
    /// The first canonical record in iteration order is kept.
    FirstWins,
}

/// Tuning for matching and identifier allocation.
#[derive(Debug, Clone, Copy)]
pub struct MatchTuning {
    /// Starting candidate for allocation when no canonical identifiers
    /// push the floor higher.
    pub start_id: i64,
    /// Duplicate canonical name policy.
    pub tie_break: TieBreak,
}

impl Default for MatchTuning {
    fn default() -> Self {
        Self {
            start_id: 1,
            tie_break: TieBreak::LastWins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tuning() {
        let tuning = MatchTuning::default();
        assert_eq!(tuning.start_id, 1);
        assert_eq!(tuning.tie_break, TieBreak::LastWins);
    }
}
