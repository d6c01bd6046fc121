//! Applies find-then-replace over a discovered match set.

use std::io;

use tracing::{debug, warn};

use crate::{
    cursor::{MatchCursor, NavigationMode},
    data::ByteSplice,
    error::{Error, Result},
    matcher::Matcher,
    query::Query,
    span::MatchSpan,
};

/// The phase of a replace run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacePhase {
    /// No match has been armed yet.
    Idle,
    /// A match is armed for replacement.
    Matched,
    /// The match set is exhausted.
    Done,
}

/// What happened to one armed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// The match was replaced.
    Replaced,
    /// The match's bytes no longer matched the query and were left untouched.
    SkippedStale,
}

/// The tally of a replace-all run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaceSummary {
    /// How many matches were replaced.
    pub replaced: usize,
    /// How many stale matches were skipped.
    pub skipped: usize,
}

/// Sequentially applies replacements to an already-discovered match set.
///
/// The coordinator never re-scans: it trusts the match set plus shift bookkeeping,
/// re-deriving offsets after each mutation. A find session must have finished or
/// been cancelled before the target content is touched.
pub struct ReplaceCoordinator<T: ByteSplice> {
    /// The content being mutated.
    target: T,
    /// The compiled query, used to verify matches before replacing them.
    matcher: Matcher,
    /// The matches still to visit, stepped without wraparound.
    cursor: MatchCursor,
    /// The phase of the run.
    phase: ReplacePhase,
}

impl<T: ByteSplice> ReplaceCoordinator<T> {
    /// Creates a coordinator over a finished session's matches.
    pub fn new(target: T, query: &Query, matches: Vec<MatchSpan>) -> Result<ReplaceCoordinator<T>> {
        Ok(ReplaceCoordinator {
            target,
            matcher: Matcher::compile(query)?,
            cursor: MatchCursor::new(matches, NavigationMode::Bounded),
            phase: ReplacePhase::Idle,
        })
    }

    /// The phase of the run.
    pub fn phase(&self) -> ReplacePhase {
        self.phase
    }

    /// The armed match, if any.
    pub fn current(&self) -> Option<MatchSpan> {
        self.cursor.current()
    }

    /// The content being mutated.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Consumes the coordinator, returning the mutated content.
    pub fn into_target(self) -> T {
        self.target
    }

    /// Arms the next match without touching the current one.
    ///
    /// Returns `None` once the match set is exhausted.
    pub fn find_next(&mut self) -> Result<Option<MatchSpan>> {
        match self.cursor.next() {
            Ok(span) => {
                self.phase = ReplacePhase::Matched;
                Ok(Some(span))
            }
            Err(Error::NoMatches | Error::AtLastMatch) => {
                self.phase = ReplacePhase::Done;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Replaces the armed match and arms the next one.
    ///
    /// The target bytes are verified against the query first; a match whose bytes
    /// no longer match (possible for adjacent zero-gap matches altered by an
    /// earlier replacement) is skipped, not blindly applied. Fails with
    /// [`Error::NoCurrentMatch`] unless a match is armed.
    pub fn replace_current(&mut self, replacement: &[u8]) -> Result<ReplaceOutcome> {
        if self.phase != ReplacePhase::Matched {
            return Err(Error::NoCurrentMatch);
        }

        let outcome = self.replace_armed(replacement).map_err(Error::Read)?;
        self.find_next()?;

        Ok(outcome)
    }

    /// Replaces every remaining match in ascending offset order.
    ///
    /// Shifts are applied cumulatively, so each subsequent match is adjusted for
    /// all prior replacements in the same pass. A write failure stops the run with
    /// [`Error::PartialReplace`]; already-applied replacements are not rolled back.
    pub fn replace_all(&mut self, replacement: &[u8]) -> Result<ReplaceSummary> {
        let mut summary = ReplaceSummary::default();

        if self.phase == ReplacePhase::Idle {
            self.find_next()?;
        }

        while self.phase == ReplacePhase::Matched {
            match self.replace_armed(replacement) {
                Ok(ReplaceOutcome::Replaced) => summary.replaced += 1,
                Ok(ReplaceOutcome::SkippedStale) => summary.skipped += 1,
                Err(source) => {
                    return Err(Error::PartialReplace {
                        completed: summary.replaced,
                        source,
                    });
                }
            }
            self.find_next()?;
        }

        debug!(
            replaced = summary.replaced,
            skipped = summary.skipped,
            "replace run finished"
        );

        Ok(summary)
    }

    /// Verifies and replaces the armed match, shifting the spans after it.
    fn replace_armed(&mut self, replacement: &[u8]) -> io::Result<ReplaceOutcome> {
        let span = self
            .cursor
            .current()
            .expect("the matched phase always has an armed match");

        if self.is_stale(span)? {
            warn!(?span, "skipping stale match");
            return Ok(ReplaceOutcome::SkippedStale);
        }

        self.target.splice(span.offset(), span.len(), replacement)?;

        let delta = i64::try_from(replacement.len()).expect("replacements fit into `i64`")
            - i64::try_from(span.len().as_u64()).expect("match lengths fit into `i64`");
        self.cursor.apply_shift(span.offset(), delta);

        Ok(ReplaceOutcome::Replaced)
    }

    /// Determines if the span's bytes no longer match the query.
    fn is_stale(&self, span: MatchSpan) -> io::Result<bool> {
        let len: usize = span
            .len()
            .as_u64()
            .try_into()
            .map_err(|_| io::Error::other("match length does not fit into `usize`"))?;
        let mut buf = vec![0; len];
        let bytes = self.target.window_at(span.offset(), &mut buf)?;

        Ok(bytes.len() != len || !self.matcher.matches_exact(bytes))
    }
}
