//! Pagination arithmetic over the token sequence.
//!
//! Pages are fixed-size windows of token indices and are numbered from 1.
//! Layout-aware pagination lives in the UI; this module only answers which
//! page holds a given token and which tokens a page covers.

use std::ops::Range;

/// Minimum allowed page size (tokens).
pub const MIN_PAGE_SIZE: usize = 50;
/// Maximum allowed page size (tokens).
pub const MAX_PAGE_SIZE: usize = 5000;
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// 1-based page containing `index`.
pub fn page_of(index: usize, page_size: usize) -> usize {
    index / page_size.max(1) + 1
}

/// Number of pages needed for `token_count` tokens. An empty document still
/// has one (empty) page.
pub fn page_count(token_count: usize, page_size: usize) -> usize {
    token_count.div_ceil(page_size.max(1)).max(1)
}

/// Token indices shown on 1-based `page`, clamped to the document.
pub fn page_bounds(page: usize, page_size: usize, token_count: usize) -> Range<usize> {
    let page_size = page_size.max(1);
    let start = page.saturating_sub(1).saturating_mul(page_size).min(token_count);
    let end = start.saturating_add(page_size).min(token_count);
    start..end
}

/// Clamp a requested page into `1..=page_count`.
pub fn clamp_page(page: usize, token_count: usize, page_size: usize) -> usize {
    page.clamp(1, page_count(token_count, page_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_of_exact_boundaries() {
        assert_eq!(page_of(0, 500), 1);
        assert_eq!(page_of(499, 500), 1);
        assert_eq!(page_of(500, 500), 2);
        assert_eq!(page_of(550, 500), 2);
    }

    #[test]
    fn page_count_rounds_up_and_never_hits_zero() {
        assert_eq!(page_count(0, 500), 1);
        assert_eq!(page_count(500, 500), 1);
        assert_eq!(page_count(501, 500), 2);
    }

    #[test]
    fn bounds_clamp_to_document() {
        assert_eq!(page_bounds(1, 4, 10), 0..4);
        assert_eq!(page_bounds(3, 4, 10), 8..10);
        assert_eq!(page_bounds(9, 4, 10), 10..10);
        assert_eq!(page_bounds(0, 4, 10), 0..4);
    }

    #[test]
    fn clamp_page_stays_in_range() {
        assert_eq!(clamp_page(0, 10, 4), 1);
        assert_eq!(clamp_page(7, 10, 4), 3);
    }
}
