//! Case-insensitive substring search shared by filtering and highlighting.

use std::ops::Range;

/// Byte range of the first case-insensitive occurrence of `needle`.
///
/// Characters are compared by their lowercase mapping, so the returned range
/// always falls on char boundaries of `haystack` and covers exactly as many
/// characters as `needle` has. An empty needle never matches.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<Range<usize>> {
    if needle.is_empty() {
        return None;
    }
    let needle: Vec<char> = needle.chars().collect();

    'outer: for (start, _) in haystack.char_indices() {
        let mut candidate = haystack[start..].char_indices();
        let mut end = start;
        for &expected in &needle {
            match candidate.next() {
                Some((offset, actual)) if chars_eq_ignore_case(actual, expected) => {
                    end = start + offset + actual.len_utf8();
                }
                _ => continue 'outer,
            }
        }
        return Some(start..end);
    }

    None
}

/// Whether `haystack` contains `needle`, ignoring case. Everything contains "".
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || find_ignore_case(haystack, needle).is_some()
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}
