//! Comparers that drive sorted projections.

use alloc::sync::Arc;
use core::cmp::Ordering;
use core::fmt;

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl SortOrder {
    /// Applies this order to a comparison result.
    #[inline]
    pub fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

/// A shareable total order over values.
///
/// Cloning a comparer is cheap; clones share the same function.
pub struct Comparer<V> {
    compare: Arc<dyn Fn(&V, &V) -> Ordering + Send + Sync>,
}

impl<V> Clone for Comparer<V> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
        }
    }
}

impl<V> fmt::Debug for Comparer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparer").finish_non_exhaustive()
    }
}

impl<V: 'static> Comparer<V> {
    /// Creates a comparer from a comparison function.
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&V, &V) -> Ordering + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
        }
    }

    /// Orders values by a key, in the given direction.
    pub fn by_key<T, F>(key: F, order: SortOrder) -> Self
    where
        T: Ord,
        F: Fn(&V) -> T + Send + Sync + 'static,
    {
        Self::new(move |a, b| order.apply(key(a).cmp(&key(b))))
    }

    /// Orders values by a key, smallest first.
    pub fn ascending_by<T, F>(key: F) -> Self
    where
        T: Ord,
        F: Fn(&V) -> T + Send + Sync + 'static,
    {
        Self::by_key(key, SortOrder::Asc)
    }

    /// Orders values by a key, largest first.
    pub fn descending_by<T, F>(key: F) -> Self
    where
        T: Ord,
        F: Fn(&V) -> T + Send + Sync + 'static,
    {
        Self::by_key(key, SortOrder::Desc)
    }

    /// Breaks ties of this comparer with `next`.
    pub fn then(self, next: Comparer<V>) -> Self {
        Self::new(move |a, b| self.compare(a, b).then_with(|| next.compare(a, b)))
    }

    /// Returns the reverse order.
    pub fn reverse(self) -> Self {
        Self::new(move |a, b| self.compare(a, b).reverse())
    }
}

impl<V: Ord + 'static> Comparer<V> {
    /// Orders values by their natural order.
    pub fn natural() -> Self {
        Self::new(|a: &V, b: &V| a.cmp(b))
    }
}

impl<V> Comparer<V> {
    /// Compares two values.
    #[inline]
    pub fn compare(&self, a: &V, b: &V) -> Ordering {
        (self.compare)(a, b)
    }

    /// Returns true if a > b according to this comparer.
    #[inline]
    pub fn is_greater(&self, a: &V, b: &V) -> bool {
        self.compare(a, b) == Ordering::Greater
    }
}
