//! Splitting a name into emphasized and plain spans around query matches.

use crate::matching::find_ignore_case;
use crate::types::HighlightSpan;

/// Split `name` into spans, emphasizing each case-insensitive occurrence of
/// `query` from left to right.
///
/// Matched text keeps its original casing. Empty spans are left out, except
/// that an empty name yields a single empty plain span. Concatenating the
/// span texts always gives back `name`.
pub fn highlight(name: &str, query: &str) -> Vec<HighlightSpan> {
    // An empty needle would match at every position.
    if query.is_empty() {
        return vec![HighlightSpan::plain(name)];
    }

    let mut spans = Vec::new();
    let mut rest = name;
    while !rest.is_empty() {
        let Some(found) = find_ignore_case(rest, query) else {
            spans.push(HighlightSpan::plain(rest));
            break;
        };
        if found.start > 0 {
            spans.push(HighlightSpan::plain(&rest[..found.start]));
        }
        spans.push(HighlightSpan::emphasized(&rest[found.clone()]));
        rest = &rest[found.end..];
    }

    if spans.is_empty() {
        spans.push(HighlightSpan::plain(name));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(spans: &[HighlightSpan]) -> String {
        spans.iter().map(|span| span.text.as_str()).collect()
    }

    #[test]
    fn test_empty_query_is_single_plain_span() {
        assert_eq!(highlight("Lily", ""), vec![HighlightSpan::plain("Lily")]);
    }

    #[test]
    fn test_prefix_match_keeps_casing() {
        assert_eq!(
            highlight("Lily", "li"),
            vec![HighlightSpan::emphasized("Li"), HighlightSpan::plain("ly")]
        );
    }

    #[test]
    fn test_every_occurrence_is_emphasized() {
        assert_eq!(
            highlight("Anna", "n"),
            vec![
                HighlightSpan::plain("A"),
                HighlightSpan::emphasized("n"),
                HighlightSpan::emphasized("n"),
                HighlightSpan::plain("a"),
            ]
        );
        assert_eq!(
            highlight("Sharon", "a"),
            vec![
                HighlightSpan::plain("Sh"),
                HighlightSpan::emphasized("a"),
                HighlightSpan::plain("ron"),
            ]
        );
    }

    #[test]
    fn test_no_match_and_long_query() {
        assert_eq!(highlight("Tom", "x"), vec![HighlightSpan::plain("Tom")]);
        assert_eq!(
            highlight("Tom", "Tommy"),
            vec![HighlightSpan::plain("Tom")]
        );
    }

    #[test]
    fn test_whole_name_match() {
        assert_eq!(highlight("Zoe", "ZOE"), vec![HighlightSpan::emphasized("Zoe")]);
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(highlight("", "a"), vec![HighlightSpan::plain("")]);
        assert_eq!(highlight("", ""), vec![HighlightSpan::plain("")]);
    }

    #[test]
    fn test_lossless_on_multibyte_names() {
        let name = "Åsa Ågren";
        let spans = highlight(name, "å");
        assert_eq!(joined(&spans), name);
        assert_eq!(spans.iter().filter(|s| s.emphasized).count(), 2);
    }
}
