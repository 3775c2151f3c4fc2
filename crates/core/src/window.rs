//! Window requests and responses for paging and virtualisation.

use crate::change_set::ChangeSet;
use crate::error::{Error, Result};
use alloc::vec::Vec;

/// A request for one page of a sorted projection.
///
/// Pages are numbered from 1. Fields are private so every instance has
/// passed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PageRequest {
    page: usize,
    size: usize,
}

impl PageRequest {
    /// Page 1 with 25 items per page.
    pub const DEFAULT: Self = Self { page: 1, size: 25 };

    /// Creates a validated page request.
    pub fn new(page: usize, size: usize) -> Result<Self> {
        if page == 0 {
            return Err(Error::invalid_argument("page", "page numbers start at 1"));
        }
        if size == 0 {
            return Err(Error::invalid_argument("size", "page size must be greater than zero"));
        }
        Ok(Self { page, size })
    }

    /// The requested page number.
    #[inline]
    pub fn page(&self) -> usize {
        self.page
    }

    /// The requested page size.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A request for an offset-based slice of a sorted projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VirtualRequest {
    start_index: usize,
    size: usize,
}

impl VirtualRequest {
    /// Offset 0 with 25 items.
    pub const DEFAULT: Self = Self {
        start_index: 0,
        size: 25,
    };

    /// Creates a validated virtual request.
    pub fn new(start_index: usize, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid_argument("size", "window size must be greater than zero"));
        }
        Ok(Self { start_index, size })
    }

    /// The first requested index.
    #[inline]
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// The requested window size.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for VirtualRequest {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(feature = "serde")]
mod de {
    use super::{PageRequest, VirtualRequest};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    struct RawPage {
        page: usize,
        size: usize,
    }

    #[derive(Deserialize)]
    struct RawVirtual {
        start_index: usize,
        size: usize,
    }

    impl<'de> Deserialize<'de> for PageRequest {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let raw = RawPage::deserialize(deserializer)?;
            PageRequest::new(raw.page, raw.size).map_err(D::Error::custom)
        }
    }

    impl<'de> Deserialize<'de> for VirtualRequest {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let raw = RawVirtual::deserialize(deserializer)?;
            VirtualRequest::new(raw.start_index, raw.size).map_err(D::Error::custom)
        }
    }
}

/// Either kind of window request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowRequest {
    /// Page number + size.
    Page(PageRequest),
    /// Offset + size.
    Virtual(VirtualRequest),
}

impl WindowRequest {
    /// The requested window size.
    pub fn size(&self) -> usize {
        match self {
            WindowRequest::Page(p) => p.size(),
            WindowRequest::Virtual(v) => v.size(),
        }
    }

    /// Resolves the request against a projection of `total_size` items.
    ///
    /// Pages are clamped into `[1, pages]`; a virtual offset is used as is,
    /// so an offset past the end yields an empty window.
    pub fn resolve(&self, total_size: usize) -> WindowResponse {
        let size = self.size();
        let pages = page_count(total_size, size);
        match self {
            WindowRequest::Page(p) => {
                let page = p.page().clamp(1, pages);
                WindowResponse {
                    size,
                    total_size,
                    page,
                    pages,
                    start_index: size * (page - 1),
                }
            }
            WindowRequest::Virtual(v) => WindowResponse {
                size,
                total_size,
                page: (v.start_index() / size + 1).clamp(1, pages),
                pages,
                start_index: v.start_index(),
            },
        }
    }
}

impl From<PageRequest> for WindowRequest {
    fn from(request: PageRequest) -> Self {
        WindowRequest::Page(request)
    }
}

impl From<VirtualRequest> for WindowRequest {
    fn from(request: VirtualRequest) -> Self {
        WindowRequest::Virtual(request)
    }
}

/// Number of pages needed for `total_size` items; at least 1.
pub fn page_count(total_size: usize, size: usize) -> usize {
    if size == 0 || size >= total_size {
        1
    } else {
        total_size.div_ceil(size)
    }
}

/// A request resolved against the current projection size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowResponse {
    /// Window size.
    pub size: usize,
    /// Number of items in the full projection.
    pub total_size: usize,
    /// Clamped page number, from 1.
    pub page: usize,
    /// Number of pages, at least 1.
    pub pages: usize,
    /// Index of the first visible item in the full projection.
    pub start_index: usize,
}

impl WindowResponse {
    /// Number of items the window shows.
    pub fn visible_len(&self) -> usize {
        self.size.min(self.total_size.saturating_sub(self.start_index))
    }
}

/// Context attached to every batch emitted by a window stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Windowed<K, V> {
    /// Resolved window metadata.
    pub response: WindowResponse,
    /// Visible items, in projection order.
    pub items: Vec<(K, V)>,
}

/// A change set emitted by a page or virtualise stage.
pub type WindowedChangeSet<K, V> = ChangeSet<K, V, Windowed<K, V>>;

impl<K, V> ChangeSet<K, V, Windowed<K, V>> {
    /// The resolved window for this batch.
    #[inline]
    pub fn response(&self) -> &WindowResponse {
        &self.context().response
    }

    /// The visible items after this batch.
    #[inline]
    pub fn visible_items(&self) -> &[(K, V)] {
        &self.context().items
    }
}
