/// Pagination, free-text search and ordering for list endpoints
///
/// Query strings look like
/// `?page=0&page_size=10&search=rex&order_by=created_at&order_type=desc`.
/// Every field is optional.
///
/// `order_by` is never interpolated as given: callers pass the list of
/// columns their table allows and anything else falls back to
/// `created_at`.
///
/// # Example
///
/// ```
/// use hearth_shared::search::{SearchParams, SortOrder};
///
/// let params = SearchParams {
///     page: 1,
///     page_size: 2,
///     ..Default::default()
/// };
///
/// let page = params.paginate(vec!["a", "b", "c", "d", "e"]);
/// assert_eq!(page.items, vec!["c", "d"]);
/// assert_eq!(page.total, 5);
/// assert_eq!(params.order_type, SortOrder::Desc);
/// ```

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_ORDER_BY: &str = "created_at";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Common list query parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Zero-based page index
    pub page: i64,

    /// Items per page, clamped to `1..=100`
    pub page_size: i64,

    /// Case-insensitive substring filter
    pub search: String,

    pub order_by: String,

    pub order_type: SortOrder,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            search: String::new(),
            order_by: DEFAULT_ORDER_BY.to_string(),
            order_type: SortOrder::Desc,
        }
    }
}

impl SearchParams {
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Rows to skip; saturates instead of overflowing on absurd pages
    pub fn offset(&self) -> i64 {
        self.page.max(0).saturating_mul(self.limit())
    }

    /// The requested ordering column if `allowed` lists it
    pub fn order_column<'a>(&'a self, allowed: &[&'static str]) -> &'a str {
        if allowed.contains(&self.order_by.as_str()) {
            &self.order_by
        } else {
            DEFAULT_ORDER_BY
        }
    }

    /// `ORDER BY` clause body, e.g. `date ASC`
    pub fn order_clause(&self, allowed: &[&'static str]) -> String {
        format!("{} {}", self.order_column(allowed), self.order_type.as_sql())
    }

    /// Trimmed search term, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        let term = self.search.trim();
        (!term.is_empty()).then_some(term)
    }

    /// Case-insensitive match of the search term against `haystack`
    pub fn matches(&self, haystack: &str) -> bool {
        match self.search_term() {
            Some(term) => haystack.to_lowercase().contains(&term.to_lowercase()),
            None => true,
        }
    }

    /// `ILIKE` pattern for SQL-side search
    pub fn like_pattern(&self) -> Option<String> {
        self.search_term().map(|term| {
            let escaped = term
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
    }

    /// Slices an already filtered and ordered list
    pub fn paginate<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.limit() as usize)
            .collect();

        self.page_of(items, total)
    }

    /// Wraps one page fetched with `LIMIT`/`OFFSET`
    pub fn page_of<T>(&self, items: Vec<T>, total: i64) -> Page<T> {
        Page {
            items,
            total,
            page: self.page.max(0),
            page_size: self.limit(),
        }
    }
}

/// One page of a list response
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }

    /// Like [`Page::map`] but stops at the first error
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SearchParams::default();
        assert_eq!(params.page, 0);
        assert_eq!(params.limit(), 10);
        assert_eq!(params.offset(), 0);
        assert_eq!(params.order_by, "created_at");
        assert_eq!(params.order_type, SortOrder::Desc);
        assert!(params.search_term().is_none());
    }

    #[test]
    fn test_deserialize_partial_query() {
        let params: SearchParams =
            serde_json::from_str(r#"{"page": 2, "order_type": "asc"}"#).unwrap();
        assert_eq!(params.page, 2);
        assert_eq!(params.page_size, 10);
        assert_eq!(params.order_type, SortOrder::Asc);
    }

    #[test]
    fn test_page_size_is_clamped() {
        let huge = SearchParams { page_size: 10_000, ..Default::default() };
        assert_eq!(huge.limit(), MAX_PAGE_SIZE);

        let zero = SearchParams { page_size: 0, page: 3, ..Default::default() };
        assert_eq!(zero.limit(), 1);
        assert_eq!(zero.offset(), 3);
    }

    #[test]
    fn test_order_column_whitelist() {
        let params = SearchParams {
            order_by: "date; DROP TABLE tasks".to_string(),
            ..Default::default()
        };
        assert_eq!(params.order_column(&["date", "created_at"]), "created_at");

        let params = SearchParams { order_by: "date".to_string(), ..Default::default() };
        assert_eq!(params.order_clause(&["date", "created_at"]), "date DESC");
    }

    #[test]
    fn test_matches_and_like_pattern() {
        let params = SearchParams { search: "  ReX ".to_string(), ..Default::default() };
        assert!(params.matches("T-Rex walk"));
        assert!(!params.matches("Biscuit"));
        assert_eq!(params.like_pattern().as_deref(), Some("%ReX%"));

        let wild = SearchParams { search: "50%_off".to_string(), ..Default::default() };
        assert_eq!(wild.like_pattern().as_deref(), Some("%50\\%\\_off%"));
    }

    #[test]
    fn test_paginate_past_the_end() {
        let params = SearchParams { page: 5, page_size: 10, ..Default::default() };
        let page = params.paginate(vec![1, 2, 3]);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.page, 5);
    }

    #[test]
    fn test_huge_page_saturates() {
        let params = SearchParams { page: i64::MAX, page_size: 100, ..Default::default() };
        assert_eq!(params.offset(), i64::MAX);

        let page = params.paginate(vec![1, 2, 3]);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);

        let halfway = SearchParams { page: i64::MAX / 2, page_size: 100, ..Default::default() };
        assert!(halfway.offset() > 0);
        assert!(halfway.paginate(vec![1, 2, 3]).items.is_empty());
    }

    #[test]
    fn test_page_map() {
        let page = SearchParams::default().paginate(vec![1, 2]).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);

        let failed: Result<Page<i32>, &str> =
            SearchParams::default().paginate(vec![1, 2]).try_map(|_| Err("boom"));
        assert!(failed.is_err());
    }
}
