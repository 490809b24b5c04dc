//! Pagination for list endpoints.

use serde::{Deserialize, Serialize};

/// Default page size for list pages.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size the console will request.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Which page of a list to fetch.
///
/// The keyword is trimmed on construction and dropped when blank, so equal
/// requests compare equal no matter how the search box was filled in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
    keyword: Option<String>,
}

impl PageRequest {
    /// Build a request. `page` is 1-based and clamped to at least 1;
    /// `page_size` is clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(page: u32, page_size: u32, keyword: Option<&str>) -> Self {
        let keyword = keyword
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(ToOwned::to_owned);
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            keyword,
        }
    }

    /// First page with the given size and no filter.
    #[must_use]
    pub fn first(page_size: u32) -> Self {
        Self::new(1, page_size, None)
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// Same filter, different page.
    #[must_use]
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// Pagination block returned alongside list data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Pagination {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default, rename = "pageSize")]
    pub page_size: Option<u32>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    /// Wrap a full, unpaginated result set.
    #[must_use]
    pub fn unpaginated(items: Vec<T>) -> Self {
        let total = items.len() as u64;
        Self { items, total }
    }

    /// Number of pages for `page_size`, at least 1.
    #[must_use]
    pub fn total_pages(&self, page_size: u32) -> u64 {
        let size = u64::from(page_size.max(1));
        self.total.div_ceil(size).max(1)
    }

    /// Filter and slice a full result set the way the backend would for
    /// `request`. Used for endpoints that return everything at once.
    ///
    /// The keyword matches case-insensitively anywhere in `name`.
    #[must_use]
    pub fn from_all(items: Vec<T>, request: &PageRequest, name: impl Fn(&T) -> &str) -> Self {
        let keyword = request.keyword().map(str::to_lowercase);
        let matching: Vec<T> = items
            .into_iter()
            .filter(|item| {
                keyword
                    .as_deref()
                    .is_none_or(|k| name(item).to_lowercase().contains(k))
            })
            .collect();

        let total = matching.len() as u64;
        let size = request.page_size() as usize;
        let skip = (request.page() as usize - 1).saturating_mul(size);
        Self {
            items: matching.into_iter().skip(skip).take(size).collect(),
            total,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_is_trimmed_and_blank_dropped() {
        assert_eq!(PageRequest::new(1, 20, Some("  spring ")).keyword(), Some("spring"));
        assert_eq!(PageRequest::new(1, 20, Some("   ")).keyword(), None);
        assert_eq!(
            PageRequest::new(1, 20, Some(" a ")),
            PageRequest::new(1, 20, Some("a"))
        );
    }

    #[test]
    fn test_bounds_are_clamped() {
        let req = PageRequest::new(0, 0, None);
        assert_eq!(req.page(), 1);
        assert_eq!(req.page_size(), 1);
        assert_eq!(PageRequest::new(2, 5000, None).page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_total_pages() {
        let page = Page::<u8> {
            items: vec![],
            total: 41,
        };
        assert_eq!(page.total_pages(20), 3);
        assert_eq!(Page::<u8>::default().total_pages(20), 1);
    }

    #[test]
    fn test_from_all_filters_then_slices() {
        let names = vec!["North", "south", "East", "Southwest", "West"];
        let page = Page::from_all(names.clone(), &PageRequest::new(1, 2, Some("SOUTH")), |n| *n);
        assert_eq!(page.items, vec!["south", "Southwest"]);
        assert_eq!(page.total, 2);

        let page = Page::from_all(names, &PageRequest::new(3, 2, None), |n| *n);
        assert_eq!(page.items, vec!["West"]);
        assert_eq!(page.total, 5);
    }
}
