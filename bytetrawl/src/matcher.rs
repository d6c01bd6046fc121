//! Compiles queries into matchers over content bytes.

use std::fmt::Write as _;

use aho_corasick::{AhoCorasick, MatchKind};
use bytetrawl_common::{AbsoluteOffset, Len};
use regex::bytes::{Regex, RegexBuilder};

use crate::{
    error::{Error, Result},
    query::{Query, QueryPattern, parse_hex_pattern},
    span::MatchSpan,
};

/// The overlap allowance for patterns without a static length bound.
///
/// A regular expression match longer than this may be missed when it straddles a
/// scan window edge; literal needles are always found.
const REGEX_OVERLAP: usize = 1024;

/// A compiled query, ready to match against byte windows.
pub struct Matcher {
    /// The matching backend for the query's pattern kind.
    kind: MatcherKind,
}

/// The matching backends.
enum MatcherKind {
    /// Literal needle search, possibly over several needles at once.
    Needles {
        /// The compiled needle automaton.
        searcher: AhoCorasick,
        /// The length of the longest needle.
        max_needle_len: usize,
    },
    /// Regular expression search.
    Regex(Regex),
}

impl Matcher {
    /// Compiles the given query.
    ///
    /// Pattern errors are reported here, synchronously; scanning never starts on an
    /// invalid or empty pattern.
    pub fn compile(query: &Query) -> Result<Matcher> {
        match &query.pattern {
            QueryPattern::Regex(pattern) => Matcher::regex(pattern, !query.case_sensitive),
            QueryPattern::Hex(pattern) => {
                let bytes = parse_hex_pattern(pattern)?;
                if bytes.iter().all(Option::is_some) {
                    let needle: Vec<u8> = bytes.into_iter().flatten().collect();
                    Matcher::needles(vec![needle], false)
                } else {
                    Matcher::regex(&hex_regex(&bytes), false)
                }
            }
            QueryPattern::Bytes(_) | QueryPattern::Text { .. } => {
                let needles = query
                    .literal_needles()?
                    .expect("byte and text patterns always resolve to needles");
                Matcher::needles(needles, !query.case_sensitive)
            }
        }
    }

    /// Builds a needle matcher.
    fn needles(needles: Vec<Vec<u8>>, ascii_case_insensitive: bool) -> Result<Matcher> {
        if needles.iter().any(Vec::is_empty) {
            return Err(Error::EmptyQuery);
        }

        let max_needle_len = needles.iter().map(Vec::len).max().unwrap_or(0);
        let searcher = AhoCorasick::builder()
            .ascii_case_insensitive(ascii_case_insensitive)
            .match_kind(MatchKind::LeftmostFirst)
            .build(&needles)
            .map_err(|err| Error::InvalidPattern(err.to_string()))?;

        Ok(Matcher {
            kind: MatcherKind::Needles {
                searcher,
                max_needle_len,
            },
        })
    }

    /// Builds a regular expression matcher.
    fn regex(pattern: &str, case_insensitive: bool) -> Result<Matcher> {
        if pattern.is_empty() {
            return Err(Error::EmptyQuery);
        }

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .dot_matches_new_line(true)
            .build()
            .map_err(|err| Error::InvalidPattern(err.to_string()))?;

        Ok(Matcher {
            kind: MatcherKind::Regex(regex),
        })
    }

    /// Finds the first match in the window at or after `search_from`.
    ///
    /// `window_base` is the absolute offset of the window's first byte; the returned
    /// span is absolute within the content. Zero-length matches are rejected: the
    /// search resumes one byte further instead.
    pub fn find_first(
        &self,
        window: &[u8],
        window_base: AbsoluteOffset,
        search_from: AbsoluteOffset,
    ) -> Option<MatchSpan> {
        debug_assert!(window_base <= search_from);

        let from: usize = (search_from - window_base)
            .as_u64()
            .try_into()
            .expect("window offsets fit into `usize`");
        if from >= window.len() {
            return None;
        }

        match &self.kind {
            MatcherKind::Needles { searcher, .. } => searcher.find(&window[from..]).map(|found| {
                span_at(window_base, from + found.start(), found.len())
            }),
            MatcherKind::Regex(regex) => {
                let mut at = from;
                while at <= window.len() {
                    let found = regex.find_at(window, at)?;
                    if found.start() == found.end() {
                        // zero-width match, advance one byte and retry
                        at = found.start() + 1;
                        continue;
                    }
                    return Some(span_at(window_base, found.start(), found.len()));
                }
                None
            }
        }
    }

    /// The longest match length the scanner must account for at window edges.
    pub fn max_pattern_len(&self) -> usize {
        match &self.kind {
            MatcherKind::Needles { max_needle_len, .. } => *max_needle_len,
            MatcherKind::Regex(_) => REGEX_OVERLAP,
        }
    }

    /// Determines if the entire byte slice is exactly one match.
    pub(crate) fn matches_exact(&self, bytes: &[u8]) -> bool {
        self.find_first(bytes, AbsoluteOffset::ZERO, AbsoluteOffset::ZERO)
            .is_some_and(|span| {
                span.offset().is_start_of_content() && span.end() == AbsoluteOffset::ZERO + len_of(bytes.len())
            })
    }
}

/// Builds the absolute span for a match found within a window.
fn span_at(window_base: AbsoluteOffset, start: usize, len: usize) -> MatchSpan {
    MatchSpan::new(window_base + len_of(start), len_of(len))
}

/// Converts a buffer quantity into a [`Len`].
fn len_of(len: usize) -> Len {
    Len::from(u64::try_from(len).expect("buffer sizes fit into `u64`"))
}

/// Renders a wildcarded hex pattern as a byte regular expression.
fn hex_regex(bytes: &[Option<u8>]) -> String {
    let mut pattern = String::from("(?s-u)");
    for byte in bytes {
        match byte {
            Some(byte) => write!(pattern, "\\x{byte:02X}").expect("writing to a string cannot fail"),
            None => pattern.push('.'),
        }
    }

    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TextEncoding;

    fn find(matcher: &Matcher, haystack: &[u8]) -> Option<(u64, u64)> {
        matcher
            .find_first(haystack, AbsoluteOffset::ZERO, AbsoluteOffset::ZERO)
            .map(|span| (span.offset().as_u64(), span.len().as_u64()))
    }

    #[test]
    fn plain_needle_search() {
        let matcher = Matcher::compile(&Query::bytes(*b"ab")).unwrap();
        assert_eq!(find(&matcher, b"xxabyy"), Some((2, 2)));
        assert_eq!(find(&matcher, b"xxAByy"), None);
        assert_eq!(matcher.max_pattern_len(), 2);
    }

    #[test]
    fn ascii_case_insensitive_needle_search() {
        let matcher = Matcher::compile(&Query::bytes(*b"ab").case_insensitive()).unwrap();
        assert_eq!(find(&matcher, b"xxAByy"), Some((2, 2)));
    }

    #[test]
    fn utf16_variants_match_with_their_own_length() {
        let matcher =
            Matcher::compile(&Query::text("ab", TextEncoding::Utf8).with_utf16_variants()).unwrap();
        assert_eq!(find(&matcher, b"xxab"), Some((2, 2)));
        assert_eq!(find(&matcher, b"xa\0b\0x"), Some((1, 4)));
        assert_eq!(find(&matcher, b"x\0a\0bx"), Some((1, 4)));
        assert_eq!(matcher.max_pattern_len(), 4);
    }

    #[test]
    fn search_from_skips_earlier_matches() {
        let matcher = Matcher::compile(&Query::bytes(*b"a")).unwrap();
        let span = matcher
            .find_first(b"aXa", AbsoluteOffset::from(10), AbsoluteOffset::from(11))
            .unwrap();
        assert_eq!(span.offset(), AbsoluteOffset::from(12));
    }

    #[test]
    fn regex_search() {
        let matcher = Matcher::compile(&Query::regex("a+b")).unwrap();
        assert_eq!(find(&matcher, b"xaaab"), Some((1, 4)));
        assert_eq!(matcher.max_pattern_len(), REGEX_OVERLAP);
    }

    #[test]
    fn regex_case_flag() {
        let matcher = Matcher::compile(&Query::regex("ab").case_insensitive()).unwrap();
        assert_eq!(find(&matcher, b"xAB"), Some((1, 2)));
    }

    #[test]
    fn invalid_regex_is_a_compile_error() {
        assert!(matches!(
            Matcher::compile(&Query::regex("(unclosed")),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[test]
    fn zero_width_matches_are_rejected() {
        let matcher = Matcher::compile(&Query::regex("a*")).unwrap();
        assert_eq!(find(&matcher, b"bbb"), None);
        // still finds real occurrences further in
        assert_eq!(find(&matcher, b"bbaa"), Some((2, 2)));
    }

    #[test]
    fn hex_pattern_without_wildcards_is_a_needle() {
        let matcher = Matcher::compile(&Query::hex("AB CD")).unwrap();
        assert_eq!(find(&matcher, &[0x00, 0xAB, 0xCD]), Some((1, 2)));
        assert_eq!(matcher.max_pattern_len(), 2);
    }

    #[test]
    fn hex_pattern_with_wildcards() {
        let matcher = Matcher::compile(&Query::hex("AB ?? CD")).unwrap();
        assert_eq!(find(&matcher, &[0xAB, 0x00, 0xCD]), Some((0, 3)));
        assert_eq!(find(&matcher, &[0xAB, 0xFF, 0xCD]), Some((0, 3)));
        assert_eq!(find(&matcher, &[0xAB, 0xFF, 0xCC]), None);
    }

    #[test]
    fn exact_matching_for_replace_verification() {
        let matcher = Matcher::compile(&Query::bytes(*b"ab")).unwrap();
        assert!(matcher.matches_exact(b"ab"));
        assert!(!matcher.matches_exact(b"abc"));
        assert!(!matcher.matches_exact(b"xb"));
    }
}
