//! Per-entity merge policies.

use std::fmt;

/// How a remote change is reconciled with local state.
///
/// Each [`EntityChange`](crate::EntityChange) variant maps to exactly one
/// policy; the applying side implements one handler per policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergePolicy {
    /// Add `new - old` to the current local value.
    DeltaMerge,
    /// Upsert by primary key, falling back to a natural key.
    Upsert,
    /// Remove the row and its dependent history.
    HardDelete,
    /// Clear the active flag, keep the row.
    SoftDelete,
    /// Rewrite a grouping key on every dependent row.
    BulkFieldUpdate,
    /// Apply only if the incoming change is not older than local state.
    LastWriterWins,
    /// Replace the whole row keyed by id.
    ReplaceById,
    /// Nothing to apply locally.
    Ignore,
}

impl MergePolicy {
    /// Short label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::DeltaMerge => "delta-merge",
            MergePolicy::Upsert => "upsert",
            MergePolicy::HardDelete => "hard-delete",
            MergePolicy::SoftDelete => "soft-delete",
            MergePolicy::BulkFieldUpdate => "bulk-field-update",
            MergePolicy::LastWriterWins => "last-writer-wins",
            MergePolicy::ReplaceById => "replace-by-id",
            MergePolicy::Ignore => "ignore",
        }
    }

    /// Returns true if applying the policy writes user data.
    pub fn mutates_local_state(&self) -> bool {
        !matches!(self, MergePolicy::Ignore)
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
