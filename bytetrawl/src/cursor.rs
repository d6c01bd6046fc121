//! Tracks the current position within a discovered match set.

use bytetrawl_common::AbsoluteOffset;

use crate::{
    error::{Error, Result},
    span::MatchSpan,
};

/// How navigation behaves at the ends of the match set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationMode {
    /// Find-again semantics: `next` at the last match wraps to the first and
    /// `prev` at the first match wraps to the last.
    #[default]
    Wrapping,
    /// Stepped semantics for one-by-one replace: navigation past either end fails
    /// instead of wrapping.
    Bounded,
}

/// A navigable pointer into a session's match list.
///
/// A fresh cursor points at no match; `next` enters the set at the head and `prev`
/// enters it at the tail. The current index is only ever absent while the set is
/// empty or untouched.
#[derive(Debug, Clone)]
pub struct MatchCursor {
    /// The discovered matches, in ascending offset order.
    matches: Vec<MatchSpan>,
    /// The index of the current match, if any.
    current: Option<usize>,
    /// How navigation behaves at the ends of the set.
    mode: NavigationMode,
}

impl MatchCursor {
    /// Creates a cursor over the given matches, pointing at no match yet.
    pub fn new(matches: Vec<MatchSpan>, mode: NavigationMode) -> MatchCursor {
        MatchCursor {
            matches,
            current: None,
            mode,
        }
    }

    /// The number of matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Determines if the match set is empty.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// The matches the cursor navigates, in ascending offset order.
    pub fn matches(&self) -> &[MatchSpan] {
        &self.matches
    }

    /// The index of the current match, for "match i of n" displays.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// The current match, if the cursor points at one.
    pub fn current(&self) -> Option<MatchSpan> {
        self.check_invariant();

        self.current.map(|index| self.matches[index])
    }

    /// Moves to the next match and returns it.
    ///
    /// Entering an untouched set starts at the first match. At the last match,
    /// wrapping mode starts over at the first while bounded mode fails with
    /// [`Error::AtLastMatch`].
    pub fn next(&mut self) -> Result<MatchSpan> {
        self.check_invariant();

        if self.matches.is_empty() {
            return Err(Error::NoMatches);
        }

        let next = match self.current {
            None => 0,
            Some(index) if index + 1 < self.matches.len() => index + 1,
            Some(_) => match self.mode {
                NavigationMode::Wrapping => 0,
                NavigationMode::Bounded => return Err(Error::AtLastMatch),
            },
        };
        self.current = Some(next);

        Ok(self.matches[next])
    }

    /// Moves to the previous match and returns it.
    ///
    /// Entering an untouched set starts at the last match. At the first match,
    /// wrapping mode continues at the last while bounded mode fails with
    /// [`Error::AtFirstMatch`].
    pub fn prev(&mut self) -> Result<MatchSpan> {
        self.check_invariant();

        if self.matches.is_empty() {
            return Err(Error::NoMatches);
        }

        let prev = match self.current {
            None => self.matches.len() - 1,
            Some(index) if index > 0 => index - 1,
            Some(_) => match self.mode {
                NavigationMode::Wrapping => self.matches.len() - 1,
                NavigationMode::Bounded => return Err(Error::AtFirstMatch),
            },
        };
        self.current = Some(prev);

        Ok(self.matches[prev])
    }

    /// Jumps to the match at the given index.
    pub fn jump(&mut self, index: usize) -> Result<MatchSpan> {
        self.check_invariant();

        if index >= self.matches.len() {
            return Err(Error::InvalidMatchIndex {
                index,
                count: self.matches.len(),
            });
        }
        self.current = Some(index);

        Ok(self.matches[index])
    }

    /// Replaces the match set, forgetting the current position.
    pub fn set_matches(&mut self, matches: Vec<MatchSpan>) {
        self.matches = matches;
        self.current = None;
    }

    /// Drops all matches, for when the content changed without a rescan.
    pub fn clear(&mut self) {
        self.set_matches(Vec::new());
    }

    /// Applies a content shift record to the match set.
    ///
    /// Every span starting at or after the edit offset moves by the signed delta;
    /// spans before the edit are untouched. This keeps the set consistent with the
    /// mutated content without rescanning.
    pub fn apply_shift(&mut self, edit_offset: AbsoluteOffset, delta: i64) {
        if delta == 0 {
            return;
        }

        for span in &mut self.matches {
            if span.offset() >= edit_offset {
                *span = span.shifted_by(delta);
            }
        }
    }

    /// Checks the index invariant: a current index exists only within a non-empty
    /// set and is always in bounds.
    fn check_invariant(&self) {
        debug_assert!(match self.current {
            None => true,
            Some(index) => index < self.matches.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use bytetrawl_common::Len;

    use super::*;

    fn three_matches() -> Vec<MatchSpan> {
        [0u64, 10, 20]
            .iter()
            .map(|&offset| MatchSpan::new(AbsoluteOffset::from(offset), Len::from(2)))
            .collect()
    }

    #[test]
    fn next_wraps_around_at_the_last_match() {
        let mut cursor = MatchCursor::new(three_matches(), NavigationMode::Wrapping);

        let indices: Vec<_> = (0..4)
            .map(|_| {
                cursor.next().unwrap();
                cursor.current_index().unwrap()
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 0]);
    }

    #[test]
    fn prev_from_the_first_match_wraps_to_the_last() {
        let mut cursor = MatchCursor::new(three_matches(), NavigationMode::Wrapping);

        cursor.next().unwrap();
        assert_eq!(cursor.current_index(), Some(0));
        cursor.prev().unwrap();
        assert_eq!(cursor.current_index(), Some(2));
    }

    #[test]
    fn a_fresh_cursor_enters_at_either_end() {
        let mut cursor = MatchCursor::new(three_matches(), NavigationMode::Wrapping);
        assert_eq!(cursor.prev().unwrap().offset(), AbsoluteOffset::from(20));

        let mut cursor = MatchCursor::new(three_matches(), NavigationMode::Wrapping);
        assert_eq!(cursor.next().unwrap().offset(), AbsoluteOffset::ZERO);
    }

    #[test]
    fn bounded_navigation_fails_at_the_ends() {
        let mut cursor = MatchCursor::new(three_matches(), NavigationMode::Bounded);

        cursor.next().unwrap();
        assert!(matches!(cursor.prev(), Err(Error::AtFirstMatch)));
        assert_eq!(cursor.current_index(), Some(0));

        cursor.jump(2).unwrap();
        assert!(matches!(cursor.next(), Err(Error::AtLastMatch)));
        // the failed calls did not move the cursor
        assert_eq!(cursor.current_index(), Some(2));
    }

    #[test]
    fn empty_sets_fail_with_no_matches() {
        let mut cursor = MatchCursor::new(Vec::new(), NavigationMode::Wrapping);
        assert!(matches!(cursor.next(), Err(Error::NoMatches)));
        assert!(matches!(cursor.prev(), Err(Error::NoMatches)));
        assert_eq!(cursor.current_index(), None);
    }

    #[test]
    fn jump_bounds_checks() {
        let mut cursor = MatchCursor::new(three_matches(), NavigationMode::Wrapping);
        assert!(matches!(
            cursor.jump(3),
            Err(Error::InvalidMatchIndex { index: 3, count: 3 })
        ));
        assert_eq!(cursor.jump(1).unwrap().offset(), AbsoluteOffset::from(10));
    }

    #[test]
    fn shifts_move_only_spans_at_or_after_the_edit() {
        let mut cursor = MatchCursor::new(three_matches(), NavigationMode::Wrapping);
        cursor.apply_shift(AbsoluteOffset::from(10), 3);

        let offsets: Vec<_> = cursor
            .matches()
            .iter()
            .map(|span| span.offset().as_u64())
            .collect();
        assert_eq!(offsets, vec![0, 13, 23]);
    }

    #[test]
    fn clearing_forgets_matches_and_position() {
        let mut cursor = MatchCursor::new(three_matches(), NavigationMode::Wrapping);
        cursor.next().unwrap();
        cursor.clear();
        assert!(cursor.is_empty());
        assert_eq!(cursor.current_index(), None);
    }
}
