//! A single keyed mutation.
//!
//! `Change` is a sum type: each variant carries only the fields that are
//! meaningful for it. Indices are present only when the change was produced
//! by an indexed projection (sort, window); plain keyed streams carry `None`.

/// The reason a change was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeReason {
    /// A key entered the collection.
    Add,
    /// The value of an existing key was replaced.
    Update,
    /// A key left the collection.
    Remove,
    /// An existing value should be re-evaluated.
    Refresh,
    /// An existing item changed position.
    Moved,
}

/// One mutation of a keyed collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change<K, V> {
    /// A key was added.
    Add {
        key: K,
        current: V,
        index: Option<usize>,
    },
    /// A key's value was replaced without changing position.
    Update {
        key: K,
        current: V,
        previous: V,
        index: Option<usize>,
    },
    /// A key was removed. `previous` is the value held at removal.
    Remove {
        key: K,
        previous: V,
        index: Option<usize>,
    },
    /// A key was re-signalled with an unchanged identity.
    Refresh {
        key: K,
        current: V,
        index: Option<usize>,
    },
    /// A key changed position. `previous` is the value held before the
    /// mutation that caused the move.
    Moved {
        key: K,
        current: V,
        previous: V,
        current_index: usize,
        previous_index: usize,
    },
}

impl<K, V> Change<K, V> {
    /// Creates an unindexed add.
    #[inline]
    pub fn add(key: K, current: V) -> Self {
        Change::Add {
            key,
            current,
            index: None,
        }
    }

    /// Creates an add at the given position.
    #[inline]
    pub fn add_at(key: K, current: V, index: usize) -> Self {
        Change::Add {
            key,
            current,
            index: Some(index),
        }
    }

    /// Creates an unindexed update.
    #[inline]
    pub fn update(key: K, current: V, previous: V) -> Self {
        Change::Update {
            key,
            current,
            previous,
            index: None,
        }
    }

    /// Creates an update at the given position.
    #[inline]
    pub fn update_at(key: K, current: V, previous: V, index: usize) -> Self {
        Change::Update {
            key,
            current,
            previous,
            index: Some(index),
        }
    }

    /// Creates an unindexed remove.
    #[inline]
    pub fn remove(key: K, previous: V) -> Self {
        Change::Remove {
            key,
            previous,
            index: None,
        }
    }

    /// Creates a remove from the given position.
    #[inline]
    pub fn remove_at(key: K, previous: V, index: usize) -> Self {
        Change::Remove {
            key,
            previous,
            index: Some(index),
        }
    }

    /// Creates an unindexed refresh.
    #[inline]
    pub fn refresh(key: K, current: V) -> Self {
        Change::Refresh {
            key,
            current,
            index: None,
        }
    }

    /// Creates a refresh at the given position.
    #[inline]
    pub fn refresh_at(key: K, current: V, index: usize) -> Self {
        Change::Refresh {
            key,
            current,
            index: Some(index),
        }
    }

    /// Creates a move.
    #[inline]
    pub fn moved(key: K, current: V, previous: V, current_index: usize, previous_index: usize) -> Self {
        Change::Moved {
            key,
            current,
            previous,
            current_index,
            previous_index,
        }
    }

    /// Returns the reason for this change.
    pub fn reason(&self) -> ChangeReason {
        match self {
            Change::Add { .. } => ChangeReason::Add,
            Change::Update { .. } => ChangeReason::Update,
            Change::Remove { .. } => ChangeReason::Remove,
            Change::Refresh { .. } => ChangeReason::Refresh,
            Change::Moved { .. } => ChangeReason::Moved,
        }
    }

    /// Returns the key this change refers to.
    pub fn key(&self) -> &K {
        match self {
            Change::Add { key, .. }
            | Change::Update { key, .. }
            | Change::Remove { key, .. }
            | Change::Refresh { key, .. }
            | Change::Moved { key, .. } => key,
        }
    }

    /// Returns the value after the change, `None` for removals.
    pub fn current(&self) -> Option<&V> {
        match self {
            Change::Add { current, .. }
            | Change::Update { current, .. }
            | Change::Refresh { current, .. }
            | Change::Moved { current, .. } => Some(current),
            Change::Remove { .. } => None,
        }
    }

    /// Returns the value before the change (Update, Remove, Moved).
    pub fn previous(&self) -> Option<&V> {
        match self {
            Change::Update { previous, .. }
            | Change::Remove { previous, .. }
            | Change::Moved { previous, .. } => Some(previous),
            Change::Add { .. } | Change::Refresh { .. } => None,
        }
    }

    /// Returns the most recent value known for the key: the current value,
    /// or the removed value for a removal.
    pub fn value(&self) -> &V {
        match self {
            Change::Add { current, .. }
            | Change::Update { current, .. }
            | Change::Refresh { current, .. }
            | Change::Moved { current, .. } => current,
            Change::Remove { previous, .. } => previous,
        }
    }

    /// Returns the position this change refers to. For a removal this is the
    /// position the item was removed from.
    pub fn current_index(&self) -> Option<usize> {
        match self {
            Change::Add { index, .. }
            | Change::Update { index, .. }
            | Change::Remove { index, .. }
            | Change::Refresh { index, .. } => *index,
            Change::Moved { current_index, .. } => Some(*current_index),
        }
    }

    /// Returns the position an item moved from.
    pub fn previous_index(&self) -> Option<usize> {
        match self {
            Change::Moved { previous_index, .. } => Some(*previous_index),
            _ => None,
        }
    }

    /// Consumes the change and returns its key.
    pub fn into_key(self) -> K {
        match self {
            Change::Add { key, .. }
            | Change::Update { key, .. }
            | Change::Remove { key, .. }
            | Change::Refresh { key, .. }
            | Change::Moved { key, .. } => key,
        }
    }

    /// Returns true for additions.
    #[inline]
    pub fn is_add(&self) -> bool {
        matches!(self, Change::Add { .. })
    }

    /// Returns true for removals.
    #[inline]
    pub fn is_remove(&self) -> bool {
        matches!(self, Change::Remove { .. })
    }
}

impl<K: Clone, V: Clone> Change<K, V> {
    /// Returns a copy of this change with its positional information
    /// replaced. Moves lose their indices and become updates.
    pub fn with_index(&self, index: Option<usize>) -> Self {
        match self {
            Change::Add { key, current, .. } => Change::Add {
                key: key.clone(),
                current: current.clone(),
                index,
            },
            Change::Update {
                key,
                current,
                previous,
                ..
            }
            | Change::Moved {
                key,
                current,
                previous,
                ..
            } => Change::Update {
                key: key.clone(),
                current: current.clone(),
                previous: previous.clone(),
                index,
            },
            Change::Remove { key, previous, .. } => Change::Remove {
                key: key.clone(),
                previous: previous.clone(),
                index,
            },
            Change::Refresh { key, current, .. } => Change::Refresh {
                key: key.clone(),
                current: current.clone(),
                index,
            },
        }
    }
}
