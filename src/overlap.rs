//! Overlap-based deduplication of canonical URLs.
//!
//! Text extraction fragments URLs in predictable ways: a link broken across
//! two lines shows up both as a truncated prefix and as the full string, or
//! with trailing text glued on. Two canonical URLs *overlap* when, ignoring
//! the scheme, one is a substring of the other. The helpers here keep one
//! representative per overlapping group.

use std::borrow::Borrow;
use std::cmp::Reverse;

/// The URL without its `scheme://` prefix.
fn strip_scheme(url: &str) -> &str {
    match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    }
}

/// True iff one scheme-stripped URL is a substring of the other.
pub fn overlaps(x: &str, y: &str) -> bool {
    let (x, y) = (strip_scheme(x), strip_scheme(y));
    x.contains(y) || y.contains(x)
}

/// Whether `url` overlaps any member of `pool`.
pub fn has_overlap<S: Borrow<str>>(url: &str, pool: &[S]) -> bool {
    pool.iter().any(|other| overlaps(url, other.borrow()))
}

/// Pick one representative per overlapping group.
///
/// Candidates are ordered by length (shortest first, or longest first with
/// `prefer_long`) with a stable sort, so equal-length candidates keep their
/// input order. Each candidate is admitted only if it overlaps nothing
/// admitted so far. The result is in admission order.
pub fn pick_unique<I>(pool: I, prefer_long: bool) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut ordered: Vec<String> = pool.into_iter().collect();
    if prefer_long {
        ordered.sort_by_key(|u| Reverse(u.len()));
    } else {
        ordered.sort_by_key(|u| u.len());
    }

    let mut admitted: Vec<String> = Vec::with_capacity(ordered.len());
    for url in ordered {
        if !has_overlap(&url, &admitted) {
            admitted.push(url);
        }
    }
    admitted
}

/// Members of `pool` that overlap no member of `reference`.
pub fn pick_new<I, S>(pool: I, reference: &[S]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
    S: Borrow<str>,
{
    pool.into_iter()
        .filter(|url| !has_overlap(url, reference))
        .collect()
}
