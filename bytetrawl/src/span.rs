//! Models spans of matched content.

use std::fmt;

use bytetrawl_common::{AbsoluteOffset, Len};
use size_format::SizeFormatterBinary;

/// One occurrence of the search pattern within the content.
///
/// Spans are produced in strictly increasing offset order and never overlap.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchSpan {
    /// The offset of the first matched byte.
    offset: AbsoluteOffset,
    /// The number of matched bytes, at least one.
    len: Len,
}

impl MatchSpan {
    /// Creates a new match span.
    pub fn new(offset: AbsoluteOffset, len: Len) -> MatchSpan {
        debug_assert!(!len.is_zero());

        MatchSpan { offset, len }
    }

    /// The offset of the first matched byte.
    pub fn offset(self) -> AbsoluteOffset {
        self.offset
    }

    /// The number of matched bytes.
    pub fn len(self) -> Len {
        self.len
    }

    /// The offset one past the last matched byte.
    pub fn end(self) -> AbsoluteOffset {
        self.offset + self.len
    }

    /// Determines if the span contains the given offset.
    pub fn contains(self, offset: AbsoluteOffset) -> bool {
        self.offset <= offset && offset < self.end()
    }

    /// Returns the span moved by a signed byte delta.
    ///
    /// Shifts never move a span before the edit that caused them, so clamping at
    /// the content start is unobservable in correct bookkeeping.
    pub fn shifted_by(self, delta: i64) -> MatchSpan {
        MatchSpan {
            offset: self.offset.saturating_add_signed(delta),
            len: self.len,
        }
    }
}

impl fmt::Debug for MatchSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MatchSpan(at: {}B ({:?}), len: {}B)",
            SizeFormatterBinary::new(self.offset.as_u64()),
            self.offset,
            SizeFormatterBinary::new(self.len.as_u64()),
        )
    }
}
