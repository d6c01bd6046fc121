//! Defines the errors reported by the search engine.

use std::io;

/// The errors reported by the search engine.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The pattern could not be compiled into a matcher.
    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),
    /// The pattern resolves to zero bytes.
    #[error("the search pattern resolves to zero bytes")]
    EmptyQuery,
    /// A previous session on the same content has not reached a terminal state.
    #[error("a search is already running for this content")]
    AlreadyRunning,
    /// Reading from the content source failed.
    #[error("failed to read from the content source: {0}")]
    Read(#[from] io::Error),
    /// The search worker terminated without reaching a terminal state.
    #[error("the search worker panicked")]
    WorkerPanic,
    /// There are no matches to navigate.
    #[error("no matches to navigate")]
    NoMatches,
    /// Bounded navigation cannot move before the first match.
    #[error("already at the first match")]
    AtFirstMatch,
    /// Bounded navigation cannot move past the last match.
    #[error("already at the last match")]
    AtLastMatch,
    /// The requested match index does not exist.
    #[error("match index {index} is out of range for {count} matches")]
    InvalidMatchIndex {
        /// The requested index.
        index: usize,
        /// The number of known matches.
        count: usize,
    },
    /// No match is currently armed for replacement.
    #[error("no current match to replace")]
    NoCurrentMatch,
    /// A replace-all run stopped early; completed replacements are not rolled back.
    #[error("replace stopped after {completed} replacements: {source}")]
    PartialReplace {
        /// How many replacements were applied before the failure.
        completed: usize,
        /// The write failure that stopped the run.
        source: io::Error,
    },
}

/// The result type of the search engine.
pub type Result<T> = std::result::Result<T, Error>;
