//! Page-number pagination
//!
//! [`paginate`] turns a row count, a page size and an untrusted requested
//! page into a [`Pagination`] that is safe to use both for the store query
//! (`range_start..=range_end`) and for rendering page controls.

use crate::{CacheError, Result};
use std::ops::RangeInclusive;

#[cfg(feature = "serde")]
use serde::Serialize;

/// One page of a larger result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Pagination {
    /// Total number of rows
    pub total_items: u64,
    /// Rows per page
    pub page_size: u64,
    /// Current page (1-indexed), always within `1..=total_pages`
    pub current_page: u64,
    /// Number of pages, at least 1
    pub total_pages: u64,
    /// First row of the page (0-indexed, inclusive)
    pub range_start: u64,
    /// Last row of the page (0-indexed, inclusive)
    pub range_end: u64,
}

impl Pagination {
    /// Rows to request from the store
    pub fn range(&self) -> RangeInclusive<u64> {
        self.range_start..=self.range_end
    }

    /// Whether there is a page before this one
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    /// Whether there is a page after this one
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Previous page number, if any
    pub fn previous_page(&self) -> Option<u64> {
        self.has_previous().then(|| self.current_page - 1)
    }

    /// Next page number, if any
    pub fn next_page(&self) -> Option<u64> {
        self.has_next().then(|| self.current_page + 1)
    }
}

/// Compute the page descriptor for `requested_page`.
///
/// Out-of-range pages are clamped into `1..=total_pages`; an empty result
/// set still has one (empty) page. A zero `page_size` is a caller bug and
/// fails with [`CacheError::InvalidArgument`].
///
/// # Examples
///
/// ```rust
/// use servercache::paginate;
///
/// let page = paginate(95, 10, 999).unwrap();
/// assert_eq!(page.current_page, 10);
/// assert_eq!((page.range_start, page.range_end), (90, 99));
/// ```
pub fn paginate(total_items: u64, page_size: u64, requested_page: i64) -> Result<Pagination> {
    if page_size == 0 {
        return Err(CacheError::invalid_argument("page size must be positive"));
    }

    let total_pages = total_items.div_ceil(page_size).max(1);
    let current_page = u64::try_from(requested_page)
        .unwrap_or(1)
        .clamp(1, total_pages);

    let range_start = (current_page - 1).saturating_mul(page_size);
    let range_end = range_start.saturating_add(page_size - 1);

    Ok(Pagination {
        total_items,
        page_size,
        current_page,
        total_pages,
        range_start,
        range_end,
    })
}

/// Read a page number from a raw query parameter.
///
/// Lenient like a browser's integer parse: surrounding whitespace is
/// ignored, an optional sign and the leading run of digits are used, and
/// trailing garbage is dropped (`"3abc"` is 3). Missing, empty or
/// non-numeric input reads as page 1. The result still needs clamping by
/// [`paginate`].
pub fn parse_page(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 1;
    };

    let trimmed = raw.trim();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_len = unsigned.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return 1;
    }

    let magnitude = unsigned[..digits_len]
        .bytes()
        .fold(0i128, |acc, digit| {
            acc.saturating_mul(10).saturating_add(i128::from(digit - b'0'))
        });

    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).unwrap_or(if negative { i64::MIN } else { i64::MAX })
}
