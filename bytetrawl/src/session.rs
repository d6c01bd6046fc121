//! Orchestrates search sessions over a dedicated background worker.

use std::{
    io,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread::JoinHandle,
};

use bytetrawl_common::AbsoluteOffset;
use tracing::{debug, warn};

use crate::{
    cursor::{MatchCursor, NavigationMode},
    data::ByteSource,
    error::{Error, Result},
    matcher::Matcher,
    query::Query,
    scanner::{ChunkScanner, ScanOutcome, SearchDirection},
    span::MatchSpan,
};

/// The lifecycle state of a search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The session exists but the worker has not started scanning yet.
    Idle,
    /// The worker is scanning.
    Running,
    /// The cancellation flag was observed; the matches found so far remain valid.
    Cancelled,
    /// The whole region was scanned.
    Done,
    /// A read error ended the scan; the matches found so far remain valid.
    Failed,
}

impl SessionState {
    /// Determines if the session has finished, one way or another.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Cancelled | SessionState::Done | SessionState::Failed
        )
    }
}

/// The state shared between the worker and the session handle.
struct SessionShared {
    /// The lifecycle state of the session.
    state: RwLock<SessionState>,
    /// The scan progress in percent.
    progress: AtomicU8,
    /// The cooperative cancellation flag.
    cancel: AtomicBool,
    /// The append-only match buffer.
    matches: RwLock<Vec<MatchSpan>>,
    /// The read error of a failed session, until it is claimed.
    error: Mutex<Option<io::Error>>,
}

impl SessionShared {
    /// Creates the shared state of a fresh session.
    fn new() -> SessionShared {
        SessionShared {
            state: RwLock::new(SessionState::Idle),
            progress: AtomicU8::new(0),
            cancel: AtomicBool::new(false),
            matches: RwLock::new(Vec::new()),
            error: Mutex::new(None),
        }
    }

    /// The current lifecycle state.
    fn state(&self) -> SessionState {
        *self.state.read().unwrap()
    }

    /// Publishes a new lifecycle state.
    fn set_state(&self, state: SessionState) {
        *self.state.write().unwrap() = state;
    }
}

/// A point-in-time view of a session.
///
/// The matches are a monotonically growing prefix of the final match list; polling
/// repeatedly never observes a reordering or retraction.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// The lifecycle state at the time of the snapshot.
    pub state: SessionState,
    /// The progress in percent at the time of the snapshot.
    pub progress: u8,
    /// The matches discovered so far, in ascending offset order.
    pub matches: Vec<MatchSpan>,
}

/// Starts search sessions over one document's content.
///
/// At most one session may be running at a time; a new search can only start once
/// the previous session has reached a terminal state or was cancelled.
pub struct SearchEngine {
    /// The scanner configuration used for every session.
    scanner: ChunkScanner,
    /// The shared state of the most recently started session.
    current: Option<Arc<SessionShared>>,
}

impl SearchEngine {
    /// Creates an engine with the default window size.
    pub fn new() -> SearchEngine {
        SearchEngine {
            scanner: ChunkScanner::new(),
            current: None,
        }
    }

    /// Creates an engine with the given scan window size, raised to the allowed minimum.
    pub fn with_window_size(window_size: usize) -> SearchEngine {
        SearchEngine {
            scanner: ChunkScanner::with_window_size(window_size),
            current: None,
        }
    }

    /// Starts a forward search over the whole content.
    pub fn start<S>(&mut self, query: &Query, source: S) -> Result<SessionHandle>
    where
        S: ByteSource + Send + 'static,
    {
        self.start_from(query, source, AbsoluteOffset::ZERO, SearchDirection::Forward)
    }

    /// Starts a search from the given offset in the given direction.
    ///
    /// A zero start offset covers the whole content in either direction. Pattern
    /// problems are reported here, before any worker is spawned. Fails with
    /// [`Error::AlreadyRunning`] while a previous session is not terminal.
    pub fn start_from<S>(
        &mut self,
        query: &Query,
        source: S,
        start: AbsoluteOffset,
        direction: SearchDirection,
    ) -> Result<SessionHandle>
    where
        S: ByteSource + Send + 'static,
    {
        if let Some(previous) = &self.current
            && !previous.state().is_terminal()
        {
            return Err(Error::AlreadyRunning);
        }

        let matcher = Matcher::compile(query)?;
        let shared = Arc::new(SessionShared::new());
        self.current = Some(Arc::clone(&shared));

        let scanner = self.scanner;
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::spawn(move || {
            run_session(scanner, matcher, source, start, direction, &worker_shared);
        });

        Ok(SessionHandle {
            shared,
            direction,
            worker: Some(worker),
        })
    }
}

impl Default for SearchEngine {
    fn default() -> SearchEngine {
        SearchEngine::new()
    }
}

/// The worker body of one session.
fn run_session<S: ByteSource>(
    scanner: ChunkScanner,
    matcher: Matcher,
    source: S,
    start: AbsoluteOffset,
    direction: SearchDirection,
    shared: &SessionShared,
) {
    shared.set_state(SessionState::Running);
    debug!(start = start.as_u64(), ?direction, "search session running");

    let result = scanner.scan(
        &source,
        &matcher,
        start,
        direction,
        &shared.cancel,
        |span| shared.matches.write().unwrap().push(span),
        |percent| shared.progress.store(percent, Ordering::Relaxed),
    );

    let state = match result {
        Ok(ScanOutcome::Completed) => SessionState::Done,
        Ok(ScanOutcome::Cancelled) => SessionState::Cancelled,
        Err(err) => {
            warn!("search session failed: {err}");
            *shared.error.lock().unwrap() = Some(err);
            SessionState::Failed
        }
    };
    let matches_found = shared.matches.read().unwrap().len();
    shared.set_state(state);
    debug!(?state, matches_found, "search session finished");
}

/// A handle to one search session.
///
/// The handle is the only way to observe or end the session; dropping it detaches
/// the worker, which keeps scanning to its natural end.
pub struct SessionHandle {
    /// The state shared with the worker.
    shared: Arc<SessionShared>,
    /// The direction the session was started in.
    direction: SearchDirection,
    /// The worker thread, until it is joined.
    worker: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Requests cancellation without blocking.
    ///
    /// The session transitions to [`SessionState::Cancelled`] once the worker
    /// observes the flag, bounded by one window's worth of work.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Relaxed);
        debug!("session cancellation requested");
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// The current scan progress in percent.
    pub fn progress(&self) -> u8 {
        self.shared.progress.load(Ordering::Relaxed)
    }

    /// The direction the session was started in.
    pub fn direction(&self) -> SearchDirection {
        self.direction
    }

    /// Takes a cheap, non-blocking snapshot of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        // the state is read before the matches so a terminal snapshot never misses
        // a late append
        let state = self.shared.state();
        let progress = self.progress();
        let matches = self.shared.matches.read().unwrap().clone();

        SessionSnapshot {
            state,
            progress,
            matches,
        }
    }

    /// Blocks until the session reaches a terminal state.
    ///
    /// Returns the matches found for finished and cancelled sessions. A failed
    /// session returns the read error instead; its partial matches remain
    /// available through [`SessionHandle::snapshot`].
    pub fn await_completion(&mut self) -> Result<Vec<MatchSpan>> {
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            self.shared.set_state(SessionState::Failed);
            return Err(Error::WorkerPanic);
        }

        match self.state() {
            SessionState::Done | SessionState::Cancelled => {
                Ok(self.shared.matches.read().unwrap().clone())
            }
            SessionState::Failed => Err(self
                .shared
                .error
                .lock()
                .unwrap()
                .take()
                .map(Error::Read)
                .unwrap_or(Error::WorkerPanic)),
            // the worker publishes a terminal state before it returns
            SessionState::Idle | SessionState::Running => Err(Error::WorkerPanic),
        }
    }

    /// Creates a cursor over the matches discovered so far.
    ///
    /// Meant to be used once the session is terminal. A fresh cursor enters the
    /// match set at the head via `next` and at the tail via `prev`, which is how a
    /// backward session's results are consumed.
    pub fn cursor(&self, mode: NavigationMode) -> MatchCursor {
        MatchCursor::new(self.shared.matches.read().unwrap().clone(), mode)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Condvar, Mutex};

    use super::*;
    use crate::{data::Input, scanner::MIN_WINDOW_SIZE};
    use bytetrawl_common::Len;

    /// A source that consumes one permit per read, blocking until one is granted.
    #[derive(Clone)]
    struct GateSource {
        inner: Input,
        permits: Arc<(Mutex<usize>, Condvar)>,
    }

    impl GateSource {
        fn new(inner: Input, initial_permits: usize) -> GateSource {
            GateSource {
                inner,
                permits: Arc::new((Mutex::new(initial_permits), Condvar::new())),
            }
        }

        fn grant(&self, count: usize) {
            let (permits, condvar) = &*self.permits;
            *permits.lock().unwrap() += count;
            condvar.notify_all();
        }
    }

    impl ByteSource for GateSource {
        fn len(&self) -> Len {
            self.inner.len()
        }

        fn window_at<'buf>(
            &self,
            offset: AbsoluteOffset,
            buf: &'buf mut [u8],
        ) -> io::Result<&'buf [u8]> {
            let (permits, condvar) = &*self.permits;
            let mut permits = permits.lock().unwrap();
            while *permits == 0 {
                permits = condvar.wait(permits).unwrap();
            }
            *permits -= 1;
            drop(permits);

            self.inner.window_at(offset, buf)
        }
    }

    /// A source that fails every read at or beyond the given offset.
    struct FailingSource {
        inner: Input,
        fail_at: u64,
    }

    impl ByteSource for FailingSource {
        fn len(&self) -> Len {
            self.inner.len()
        }

        fn window_at<'buf>(
            &self,
            offset: AbsoluteOffset,
            buf: &'buf mut [u8],
        ) -> io::Result<&'buf [u8]> {
            if offset.as_u64() >= self.fail_at {
                return Err(io::Error::other("injected read failure"));
            }
            self.inner.window_at(offset, buf)
        }
    }

    #[test]
    fn finds_sparse_needles_in_a_mebibyte_of_zeros() {
        let mut content = vec![0u8; 1024 * 1024];
        for &offset in &[100usize, 500_000, 999_998] {
            content[offset] = 0xAB;
            content[offset + 1] = 0xCD;
        }

        let mut engine = SearchEngine::with_window_size(MIN_WINDOW_SIZE);
        let mut handle = engine
            .start(&Query::bytes(vec![0xAB, 0xCD]), Input::from_bytes(content))
            .unwrap();
        let matches = handle.await_completion().unwrap();

        assert_eq!(handle.state(), SessionState::Done);
        assert_eq!(handle.progress(), 100);
        assert_eq!(
            matches
                .iter()
                .map(|span| (span.offset().as_u64(), span.len().as_u64()))
                .collect::<Vec<_>>(),
            vec![(100, 2), (500_000, 2), (999_998, 2)]
        );
    }

    #[test]
    fn only_one_session_may_run_at_a_time() {
        let source = GateSource::new(Input::from_bytes(vec![0u8; 4 * MIN_WINDOW_SIZE]), 0);
        let mut engine = SearchEngine::with_window_size(MIN_WINDOW_SIZE);

        let mut first = engine.start(&Query::bytes(*b"ab"), source.clone()).unwrap();
        assert!(matches!(
            engine.start(&Query::bytes(*b"ab"), source.clone()),
            Err(Error::AlreadyRunning)
        ));

        source.grant(1_000);
        first.await_completion().unwrap();

        // terminal sessions no longer block new ones
        let mut second = engine.start(&Query::bytes(*b"ab"), source).unwrap();
        second.await_completion().unwrap();
    }

    #[test]
    fn cancellation_is_observed_within_one_window() {
        let window_count = 10;
        let mut content = vec![0u8; window_count * MIN_WINDOW_SIZE];
        let expected: Vec<u64> = (0..window_count as u64)
            .map(|i| i * MIN_WINDOW_SIZE as u64)
            .collect();
        for &offset in &expected {
            content[offset as usize] = b'a';
            content[offset as usize + 1] = b'b';
        }

        let source = GateSource::new(Input::from_bytes(content), 1);
        let mut engine = SearchEngine::with_window_size(MIN_WINDOW_SIZE);
        let mut handle = engine.start(&Query::bytes(*b"ab"), source.clone()).unwrap();

        handle.cancel();
        source.grant(1_000);
        let matches = handle.await_completion().unwrap();

        assert_eq!(handle.state(), SessionState::Cancelled);
        // a prefix of the full result, at most one window past the cancellation
        assert!(matches.len() < window_count);
        let offsets: Vec<u64> = matches.iter().map(|span| span.offset().as_u64()).collect();
        assert_eq!(offsets, expected[..offsets.len()]);
    }

    #[test]
    fn pattern_problems_are_synchronous() {
        let mut engine = SearchEngine::new();
        assert!(matches!(
            engine.start(&Query::bytes(Vec::new()), Input::from_bytes(*b"abc")),
            Err(Error::EmptyQuery)
        ));
        assert!(matches!(
            engine.start(&Query::regex("(unclosed"), Input::from_bytes(*b"abc")),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[test]
    fn failed_sessions_keep_their_partial_matches() {
        let mut content = vec![0u8; 3 * MIN_WINDOW_SIZE];
        content[0] = b'a';
        content[1] = b'b';
        let source = FailingSource {
            inner: Input::from_bytes(content),
            fail_at: MIN_WINDOW_SIZE as u64,
        };

        let mut engine = SearchEngine::with_window_size(MIN_WINDOW_SIZE);
        let mut handle = engine.start(&Query::bytes(*b"ab"), source).unwrap();

        assert!(matches!(handle.await_completion(), Err(Error::Read(_))));
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, SessionState::Failed);
        assert_eq!(snapshot.matches.len(), 1);
        assert_eq!(snapshot.matches[0].offset(), AbsoluteOffset::ZERO);
    }

    #[test]
    fn backward_sessions_are_consumed_from_the_tail() {
        let mut engine = SearchEngine::new();
        let mut handle = engine
            .start_from(
                &Query::bytes(*b"ab"),
                Input::from_bytes(*b"ab..ab..ab"),
                AbsoluteOffset::ZERO,
                SearchDirection::Backward,
            )
            .unwrap();
        handle.await_completion().unwrap();

        let mut cursor = handle.cursor(NavigationMode::Wrapping);
        let last = cursor.prev().unwrap();
        assert_eq!(last.offset(), AbsoluteOffset::from(8));
    }
}
