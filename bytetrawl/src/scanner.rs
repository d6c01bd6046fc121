//! Drives a matcher across a byte source in bounded-memory windows.

use std::{
    cmp, io,
    sync::atomic::{AtomicBool, Ordering},
};

use bytetrawl_common::{AbsoluteOffset, Len};
use tracing::{debug, trace};

use crate::{data::ByteSource, matcher::Matcher, span::MatchSpan};

/// The default size of the scan window.
pub const DEFAULT_WINDOW_SIZE: usize = 4 * 1024 * 1024;

/// The smallest configurable scan window.
pub const MIN_WINDOW_SIZE: usize = 64 * 1024;

/// The direction of a search relative to its start offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    /// Ascending offsets starting at the start offset.
    Forward,
    /// Descending offsets ending before the start offset.
    ///
    /// Implemented as a full forward scan of the content before the start offset
    /// whose results are consumed from the tail, since byte-level backward matching
    /// of a regular expression is not well defined.
    Backward,
}

/// How a scan run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The whole region was scanned.
    Completed,
    /// The cancellation flag was observed before the region was fully scanned.
    Cancelled,
}

/// Scans a byte source window by window, reporting matches as they are found.
#[derive(Debug, Clone, Copy)]
pub struct ChunkScanner {
    /// The configured window size in bytes.
    window_size: usize,
}

impl ChunkScanner {
    /// Creates a scanner with the default window size.
    pub fn new() -> ChunkScanner {
        ChunkScanner {
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Creates a scanner with the given window size, raised to the allowed minimum.
    pub fn with_window_size(window_size: usize) -> ChunkScanner {
        ChunkScanner {
            window_size: cmp::max(window_size, MIN_WINDOW_SIZE),
        }
    }

    /// Scans the content for matches, in ascending offset order.
    ///
    /// Matches are reported through `on_match` in strictly increasing offset order
    /// without overlaps. Progress percentages are reported through `on_progress`
    /// after every window; an empty scan region is immediately 100% complete.
    ///
    /// The cancellation flag is checked once per window, so a cancellation takes
    /// effect within one window's worth of work. Matches reported before a
    /// cancellation or a read error remain valid.
    pub fn scan<S: ByteSource>(
        &self,
        source: &S,
        matcher: &Matcher,
        start: AbsoluteOffset,
        direction: SearchDirection,
        cancel: &AtomicBool,
        mut on_match: impl FnMut(MatchSpan),
        mut on_progress: impl FnMut(u8),
    ) -> io::Result<ScanOutcome> {
        let content_end = AbsoluteOffset::ZERO + source.len();
        let start = cmp::min(start, content_end);
        let (region_start, region_end) = match direction {
            SearchDirection::Forward => (start, content_end),
            SearchDirection::Backward if start.is_start_of_content() => {
                (AbsoluteOffset::ZERO, content_end)
            }
            SearchDirection::Backward => (AbsoluteOffset::ZERO, start),
        };

        let region_len = region_end - region_start;
        if region_len.is_zero() {
            on_progress(100);
            return Ok(ScanOutcome::Completed);
        }

        let overlap = matcher.max_pattern_len().saturating_sub(1);
        let buf_len = cmp::max(self.window_size, matcher.max_pattern_len() * 2);
        let mut buf = vec![0; buf_len];

        debug!(
            region_start = region_start.as_u64(),
            region_end = region_end.as_u64(),
            buf_len,
            overlap,
            "starting scan"
        );

        // The absolute offset of the next unread byte.
        let mut current = region_start;
        // The earliest offset the next reported match may start at.
        let mut report_floor = region_start;
        // Bytes of the previous window kept at the start of the buffer.
        let mut carry = 0;

        loop {
            if cancel.load(Ordering::Relaxed) {
                debug!(current = current.as_u64(), "scan cancelled");
                return Ok(ScanOutcome::Cancelled);
            }

            let to_read = cmp::min(
                (region_end - current).as_u64(),
                u64::try_from(buf_len - carry).expect("buffer sizes fit into `u64`"),
            );
            let to_read: usize = to_read
                .try_into()
                .expect("bounded by the buffer size, so this fits into `usize`");
            if to_read == 0 {
                break;
            }

            let filled = source.window_at(current, &mut buf[carry..carry + to_read])?.len();
            if filled == 0 {
                // the content ended before the region did
                break;
            }

            let window_len = carry + filled;
            let window = &buf[..window_len];
            let window_base =
                current - Len::from(u64::try_from(carry).expect("buffer sizes fit into `u64`"));
            trace!(
                window_base = window_base.as_u64(),
                window_len, "scanning window"
            );

            let mut search_from = cmp::max(report_floor, window_base);
            while let Some(found) = matcher.find_first(window, window_base, search_from) {
                on_match(found);
                report_floor = found.end();
                search_from = found.end();
            }

            current += Len::from(u64::try_from(filled).expect("buffer sizes fit into `u64`"));

            let scanned = (current - region_start).as_u64();
            let percent = cmp::min(100, scanned * 100 / region_len.as_u64()) as u8;
            on_progress(percent);

            carry = cmp::min(overlap, window_len);
            if carry > 0 {
                buf.copy_within(window_len - carry..window_len, 0);
            }
        }

        on_progress(100);

        Ok(ScanOutcome::Completed)
    }
}

impl Default for ChunkScanner {
    fn default() -> ChunkScanner {
        ChunkScanner::new()
    }
}
