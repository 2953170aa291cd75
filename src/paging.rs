//! Pagination helpers shared by every task runner
//!
//! Remote pagination follows the `Link` response header GitHub sends with
//! every collection endpoint:
//!
//! ```text
//! <https://api.github.com/repositories/1/pulls?page=3&per_page=100>; rel="next",
//! <https://api.github.com/repositories/1/pulls?page=9&per_page=100>; rel="last"
//! ```
//!
//! Local pagination walks the SQLite store in fixed pages of [`PAGE_SIZE`].

use url::Url;

/// Fixed page size for local store listings and remote `per_page`
pub const PAGE_SIZE: u32 = 100;

/// Extracts the page number of the `rel="next"` entry of a link relation string
///
/// Returns `None` when no entry is tagged `next`, which means the current page
/// is the last one.
///
/// # Example
///
/// ```
/// use pull_harvest::paging::next_page;
///
/// let link = r#"<https://api.github.com/x?page=3&per_page=100>; rel="next""#;
/// assert_eq!(next_page(link), Some(3));
/// assert_eq!(next_page(""), None);
/// ```
pub fn next_page(link: &str) -> Option<u32> {
    link.split(',')
        .find(|entry| is_next_relation(entry))
        .and_then(page_parameter)
}

/// Returns the number of local pages needed to hold `count` items
pub fn page_count(count: u64) -> u32 {
    count.div_ceil(PAGE_SIZE as u64) as u32
}

/// Zero-based row offset of a one-based page
pub fn page_offset(page: u32) -> u64 {
    page.saturating_sub(1) as u64 * PAGE_SIZE as u64
}

fn is_next_relation(entry: &str) -> bool {
    entry.split(';').skip(1).any(|param| {
        let param = param.trim();
        match param.strip_prefix("rel=") {
            Some(value) => value
                .trim_matches('"')
                .split_whitespace()
                .any(|rel| rel == "next"),
            None => false,
        }
    })
}

fn page_parameter(entry: &str) -> Option<u32> {
    let target = entry.split(';').next()?.trim();
    let target = target.trim_start_matches('<').trim_end_matches('>');

    if let Ok(url) = Url::parse(target) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok());
    }

    // Relative targets: scan the raw query string
    let query = target.split_once('?').map(|(_, q)| q)?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "page")
        .and_then(|(_, value)| value.parse().ok())
}
