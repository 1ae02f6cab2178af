use serde::Serialize;

use crate::cursor::Cursor;
use crate::error::DataError;
use crate::sort::Sort;
use crate::value::Value;

pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// How a [`Pageable`] positions its window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PageMode {
    /// Skip `(page - 1) * size` entities.
    Offset,
    /// Entities strictly after the cursor, in sort order.
    CursorNext(Cursor),
    /// Entities strictly before the cursor, returned in sort order.
    CursorPrevious(Cursor),
}

/// A request for one window of results.
///
/// Page numbers start at 1. The request is echoed back by every result
/// window so that the next or previous request can be derived from it.
///
/// ```ignore
/// let first = Pageable::of_size(10)?.sort_by([Sort::asc("name")]);
/// let slice = catalog.find_by_name_like("%a%", &first).await?;
/// if let Some(next) = slice.next_pageable() { /* ... */ }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pageable {
    page: u64,
    size: u64,
    sorts: Vec<Sort>,
    mode: PageMode,
}

impl Default for Pageable {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
            sorts: Vec::new(),
            mode: PageMode::Offset,
        }
    }
}

impl Pageable {
    /// Request page `page` with the default size.
    pub fn of_page(page: u64) -> Result<Self, DataError> {
        Self::new(page, DEFAULT_PAGE_SIZE)
    }

    /// Request the first page of `size` entities.
    pub fn of_size(size: u64) -> Result<Self, DataError> {
        Self::new(1, size)
    }

    pub fn new(page: u64, size: u64) -> Result<Self, DataError> {
        if page < 1 {
            return Err(DataError::InvalidArgument(format!(
                "page number must be at least 1, got {page}"
            )));
        }
        if size < 1 {
            return Err(DataError::InvalidArgument(format!(
                "page size must be at least 1, got {size}"
            )));
        }
        Ok(Self {
            page,
            size,
            ..Self::default()
        })
    }

    pub fn with_size(self, size: u64) -> Result<Self, DataError> {
        let checked = Self::new(self.page, size)?;
        Ok(Self {
            size: checked.size,
            ..self
        })
    }

    pub fn sort_by(mut self, sorts: impl IntoIterator<Item = Sort>) -> Self {
        self.sorts = sorts.into_iter().collect();
        self
    }

    /// Entities after the given sort-key values.
    pub fn after_keyset(self, keys: impl IntoIterator<Item = Value>) -> Self {
        self.after_cursor(Cursor::new(keys))
    }

    /// Entities before the given sort-key values.
    pub fn before_keyset(self, keys: impl IntoIterator<Item = Value>) -> Self {
        self.before_cursor(Cursor::new(keys))
    }

    pub fn after_cursor(mut self, cursor: Cursor) -> Self {
        self.mode = PageMode::CursorNext(cursor);
        self
    }

    pub fn before_cursor(mut self, cursor: Cursor) -> Self {
        self.mode = PageMode::CursorPrevious(cursor);
        self
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    pub fn mode(&self) -> &PageMode {
        &self.mode
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        match &self.mode {
            PageMode::Offset => None,
            PageMode::CursorNext(c) | PageMode::CursorPrevious(c) => Some(c),
        }
    }

    /// Number of entities skipped in offset mode.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.size)
    }

    /// The following page in offset mode. Stays put at `u64::MAX`.
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            mode: PageMode::Offset,
            ..self.clone()
        }
    }

    /// The preceding page in offset mode, or `None` on the first page.
    pub fn previous(&self) -> Option<Self> {
        (self.page > 1).then(|| Self {
            page: self.page - 1,
            mode: PageMode::Offset,
            ..self.clone()
        })
    }

    /// Cap the page size.
    pub(crate) fn clamp_size(mut self, max: u64) -> Self {
        if self.size > max {
            tracing::debug!(requested = self.size, max, "Clamping page size");
            self.size = max;
        }
        self
    }
}

/// A window of results without a total count.
#[derive(Debug, Clone, Serialize)]
pub struct Slice<T> {
    pub content: Vec<T>,
    pub pageable: Pageable,
    pub has_next: bool,
}

impl<T> Slice<T> {
    pub fn new(content: Vec<T>, pageable: Pageable, has_next: bool) -> Self {
        Self {
            content,
            pageable,
            has_next,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.content.iter()
    }

    pub fn next_pageable(&self) -> Option<Pageable> {
        self.has_next.then(|| self.pageable.next())
    }

    pub fn previous_pageable(&self) -> Option<Pageable> {
        self.pageable.previous()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            pageable: self.pageable,
            has_next: self.has_next,
        }
    }
}

impl<T> IntoIterator for Slice<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.content.into_iter()
    }
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub pageable: Pageable,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, pageable: Pageable, total_elements: u64) -> Self {
        let total_pages = total_elements.div_ceil(pageable.size());
        Self {
            content,
            pageable,
            total_elements,
            total_pages,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.content.iter()
    }

    pub fn has_next(&self) -> bool {
        self.pageable.page() < self.total_pages
    }

    pub fn next_pageable(&self) -> Option<Pageable> {
        self.has_next().then(|| self.pageable.next())
    }

    pub fn previous_pageable(&self) -> Option<Pageable> {
        self.pageable.previous()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            pageable: self.pageable,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.content.into_iter()
    }
}

/// A keyset window: each element carries the cursor it was read at.
#[derive(Debug, Clone, Serialize)]
pub struct KeysetAwareSlice<T> {
    pub content: Vec<T>,
    pub pageable: Pageable,
    pub cursors: Vec<Cursor>,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> KeysetAwareSlice<T> {
    pub fn new(
        content: Vec<T>,
        pageable: Pageable,
        cursors: Vec<Cursor>,
        has_next: bool,
        has_previous: bool,
    ) -> Self {
        Self {
            content,
            pageable,
            cursors,
            has_next,
            has_previous,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.content.iter()
    }

    /// Cursor of the element at `index`.
    pub fn key_cursor(&self, index: usize) -> Option<&Cursor> {
        self.cursors.get(index)
    }

    /// Request for the entities after the last element of this window.
    pub fn next_pageable(&self) -> Option<Pageable> {
        if !self.has_next {
            return None;
        }
        let last = self.cursors.last()?.clone();
        Some(self.pageable.next().after_cursor(last))
    }

    /// Request for the entities before the first element of this window.
    pub fn previous_pageable(&self) -> Option<Pageable> {
        if !self.has_previous {
            return None;
        }
        let first = self.cursors.first()?.clone();
        let previous = self
            .pageable
            .previous()
            .unwrap_or_else(|| self.pageable.clone());
        Some(previous.before_cursor(first))
    }
}

impl<T> IntoIterator for KeysetAwareSlice<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.content.into_iter()
    }
}

/// A keyset window with a total count.
///
/// The totals are advisory: with keyset pagination, entities may be added or
/// removed between requests, so the page number and total pages only
/// approximate the window's position.
#[derive(Debug, Clone, Serialize)]
pub struct KeysetAwarePage<T> {
    #[serde(flatten)]
    pub slice: KeysetAwareSlice<T>,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> KeysetAwarePage<T> {
    pub fn new(slice: KeysetAwareSlice<T>, total_elements: u64) -> Self {
        let total_pages = total_elements.div_ceil(slice.pageable.size());
        Self {
            slice,
            total_elements,
            total_pages,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.slice.content
    }

    pub fn pageable(&self) -> &Pageable {
        &self.slice.pageable
    }

    pub fn has_next(&self) -> bool {
        self.slice.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.slice.has_previous
    }

    pub fn key_cursor(&self, index: usize) -> Option<&Cursor> {
        self.slice.key_cursor(index)
    }

    pub fn next_pageable(&self) -> Option<Pageable> {
        self.slice.next_pageable()
    }

    pub fn previous_pageable(&self) -> Option<Pageable> {
        self.slice.previous_pageable()
    }
}

impl<T> IntoIterator for KeysetAwarePage<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.slice.content.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_start_at_one() {
        assert!(matches!(Pageable::of_page(0), Err(DataError::InvalidArgument(_))));
        assert!(matches!(Pageable::of_size(0), Err(DataError::InvalidArgument(_))));

        let p = Pageable::of_page(3).unwrap().with_size(10).unwrap();
        assert_eq!(p.offset(), 20);
        assert_eq!(Pageable::default().offset(), 0);
        assert_eq!(Pageable::default().size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_next_and_previous_return_to_offset_mode() {
        let p = Pageable::of_page(2)
            .unwrap()
            .after_keyset([Value::from("desk")]);
        assert_eq!(p.next().page(), 3);
        assert_eq!(p.next().mode(), &PageMode::Offset);
        assert_eq!(p.previous().map(|p| p.page()), Some(1));
        assert!(Pageable::default().previous().is_none());
    }

    #[test]
    fn test_next_saturates_on_last_page_number() {
        let last = Pageable::new(u64::MAX, 10).unwrap();
        assert_eq!(last.next().page(), u64::MAX);
        assert_eq!(last.offset(), u64::MAX);
        assert_eq!(last.previous().map(|p| p.page()), Some(u64::MAX - 1));
    }

    #[test]
    fn test_page_total_pages_rounds_up() {
        let page = Page::new(vec![1, 2], Pageable::of_size(2).unwrap(), 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert_eq!(page.next_pageable().map(|p| p.page()), Some(2));

        let empty: Page<i32> = Page::new(vec![], Pageable::default(), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next());
    }

    #[test]
    fn test_slice_next_pageable_follows_has_next() {
        let slice = Slice::new(vec!["a"], Pageable::of_size(1).unwrap(), false);
        assert!(slice.next_pageable().is_none());
        let slice = Slice::new(vec!["a"], Pageable::of_size(1).unwrap(), true);
        assert_eq!(slice.next_pageable().map(|p| p.page()), Some(2));
    }

    #[test]
    fn test_keyset_pageables_anchor_to_edge_cursors() {
        let cursors = vec![Cursor::new([Value::Int(1)]), Cursor::new([Value::Int(2)])];
        let pageable = Pageable::of_page(2).unwrap().with_size(2).unwrap();
        let slice = KeysetAwareSlice::new(vec!["a", "b"], pageable, cursors, true, true);

        let next = slice.next_pageable().unwrap();
        assert_eq!(next.page(), 3);
        assert_eq!(next.mode(), &PageMode::CursorNext(Cursor::new([Value::Int(2)])));

        let previous = slice.previous_pageable().unwrap();
        assert_eq!(previous.page(), 1);
        assert_eq!(
            previous.mode(),
            &PageMode::CursorPrevious(Cursor::new([Value::Int(1)]))
        );
        assert_eq!(slice.key_cursor(1).map(|c| c.keys().to_vec()), Some(vec![Value::Int(2)]));
        assert!(slice.key_cursor(2).is_none());
    }
}
