//! Sorted change sets and sort configuration.

use crate::change_set::ChangeSet;
use alloc::sync::Arc;

/// Default batch size above which the sort engine stops computing
/// per-item positions and emits a full replacement instead.
pub const DEFAULT_RESET_THRESHOLD: usize = 100;

/// Why a sorted change set was emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortReason {
    /// First population of an empty projection.
    #[default]
    InitialLoad,
    /// The comparer was replaced.
    ComparerChanged,
    /// Per-item incremental changes.
    DataChanged,
    /// An explicit re-sort with the current comparer.
    Reorder,
    /// A batch was too large for per-item positioning.
    Reset,
}

impl SortReason {
    /// Returns true when the batch replaces the whole projection.
    pub fn is_replacement(&self) -> bool {
        matches!(
            self,
            SortReason::ComparerChanged | SortReason::Reorder | SortReason::Reset
        )
    }
}

/// Flags describing what the sort engine may assume about its comparer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortOptimisations {
    /// The comparer only reads fields that never change after insertion, so
    /// positions can be found by binary search.
    pub compares_immutable_values_only: bool,
    /// Refresh changes are dropped instead of re-evaluating positions.
    pub ignore_refresh: bool,
}

impl SortOptimisations {
    /// No assumptions.
    pub const NONE: Self = Self {
        compares_immutable_values_only: false,
        ignore_refresh: false,
    };

    /// Enables binary-search positioning.
    pub const fn compares_immutable_values_only(mut self) -> Self {
        self.compares_immutable_values_only = true;
        self
    }

    /// Drops refresh changes.
    pub const fn ignore_refresh(mut self) -> Self {
        self.ignore_refresh = true;
        self
    }
}

/// Configuration for a sort stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortOptions {
    /// Positioning assumptions.
    #[cfg_attr(feature = "serde", serde(default))]
    pub optimisations: SortOptimisations,
    /// Batches with more changes than this are handled as a reset.
    /// Zero disables the reset path.
    #[cfg_attr(feature = "serde", serde(default = "default_reset_threshold"))]
    pub reset_threshold: usize,
}

#[cfg(feature = "serde")]
fn default_reset_threshold() -> usize {
    DEFAULT_RESET_THRESHOLD
}

impl SortOptions {
    /// Default options: no optimisations, threshold of 100.
    pub const DEFAULT: Self = Self {
        optimisations: SortOptimisations::NONE,
        reset_threshold: DEFAULT_RESET_THRESHOLD,
    };

    /// Sets the optimisation flags.
    pub const fn with_optimisations(mut self, optimisations: SortOptimisations) -> Self {
        self.optimisations = optimisations;
        self
    }

    /// Sets the reset threshold.
    pub const fn with_reset_threshold(mut self, reset_threshold: usize) -> Self {
        self.reset_threshold = reset_threshold;
        self
    }

    /// Returns true if a batch of `len` changes takes the reset path.
    #[inline]
    pub fn exceeds_threshold(&self, len: usize) -> bool {
        self.reset_threshold > 0 && len > self.reset_threshold
    }
}

impl Default for SortOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Context attached to every batch emitted by a sort stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sorted<K, V> {
    /// Why the batch was emitted.
    pub reason: SortReason,
    /// The full ordered projection after the batch was applied. Shared, so
    /// downstream stages can keep it without copying.
    pub items: Arc<[(K, V)]>,
}

/// A change set emitted by a sort stage.
pub type SortedChangeSet<K, V> = ChangeSet<K, V, Sorted<K, V>>;

impl<K, V> ChangeSet<K, V, Sorted<K, V>> {
    /// Why this batch was emitted.
    #[inline]
    pub fn sort_reason(&self) -> SortReason {
        self.context().reason
    }

    /// The ordered projection after this batch.
    #[inline]
    pub fn sorted_items(&self) -> &[(K, V)] {
        &self.context().items
    }

    /// A shared handle to the ordered projection.
    #[inline]
    pub fn shared_items(&self) -> Arc<[(K, V)]> {
        Arc::clone(&self.context().items)
    }
}
