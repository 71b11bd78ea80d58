use serde::{Deserialize, Serialize};

use crate::constants::MAX_COUNT_PER_PAGE;

/// 1-based page number and page size, clamped to sane values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
}

impl Page {
    pub fn new(number: Option<i64>, size: Option<i64>, default_size: i64) -> Self {
        Self {
            number: number.unwrap_or(1).max(1),
            size: size.unwrap_or(default_size).clamp(1, MAX_COUNT_PER_PAGE),
        }
    }

    /// Saturates instead of overflowing; a saturated offset reads past the
    /// last row and yields an empty page.
    pub fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.size)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page: Page) -> Self {
        if rows.is_empty() {
            return Self::no_rows(total_rows, page);
        }

        let next = if page.offset().saturating_add(page.size) < total_rows {
            Some(page.number + 1)
        } else {
            None
        };

        Self {
            count: total_rows,
            next,
            previous: Self::previous_of(page),
            results: rows,
        }
    }

    /// Past the last page `COUNT(*) OVER()` has nothing to report, so the
    /// caller counts the matching rows separately.
    pub fn no_rows(total_rows: i64, page: Page) -> Self {
        Self {
            count: total_rows,
            next: None,
            previous: Self::previous_of(page),
            results: vec![],
        }
    }

    pub fn map<U, F>(self, f: F) -> PageContext<U>
    where
        F: FnMut(T) -> U,
    {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }

    fn previous_of(page: Page) -> Option<i64> {
        if page.number > 1 {
            Some(page.number - 1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_page_parameters() {
        let page = Page::new(Some(0), Some(1000), 6);
        assert_eq!(page, Page { number: 1, size: MAX_COUNT_PER_PAGE });

        let page = Page::new(None, None, 6);
        assert_eq!(page, Page { number: 1, size: 6 });
        assert_eq!(Page::new(Some(3), Some(10), 6).offset(), 20);
    }

    #[test]
    fn huge_page_number_does_not_overflow() {
        let page = Page::new(Some(i64::MAX), Some(100), 6);
        assert_eq!(page.offset(), i64::MAX);

        let ctx = PageContext::from_rows(vec![1], 5, page);
        assert_eq!(ctx.next, None);
        assert_eq!(ctx.previous, Some(i64::MAX - 1));
    }

    #[test]
    fn links_neighbouring_pages() {
        let page = Page::new(Some(2), Some(2), 6);
        let ctx = PageContext::from_rows(vec![3, 4], 5, page);
        assert_eq!(ctx.count, 5);
        assert_eq!(ctx.previous, Some(1));
        assert_eq!(ctx.next, Some(3));

        let last = PageContext::from_rows(vec![5], 5, Page::new(Some(3), Some(2), 6));
        assert_eq!(last.next, None);
        assert_eq!(last.previous, Some(2));
    }

    #[test]
    fn empty_page() {
        let ctx: PageContext<i32> = PageContext::from_rows(vec![], 0, Page::new(None, None, 6));
        assert_eq!(ctx.count, 0);
        assert!(ctx.results.is_empty());
        assert_eq!(ctx.next, None);
        assert_eq!(ctx.previous, None);
    }

    #[test]
    fn maps_results() {
        let ctx = PageContext::from_rows(vec![1, 2], 2, Page::new(None, None, 6));
        let mapped = ctx.map(|n| n * 10);
        assert_eq!(mapped.results, vec![10, 20]);
        assert_eq!(mapped.count, 2);
    }
}
