//! Transfer handles.
//!
//! A [`Transfer`] owns one transfer's configuration, response buffers, and
//! lifecycle state. Handles are cheap clones over shared state so the caller,
//! the session, and the engine's [`ResponseSink`] all observe the same
//! transfer. The session relies on a small control contract
//! (`begin_attach`/`mark_*`); callers get the read side (state, buffers,
//! status, timing) plus `reset`/`close`.

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::base::multierror::MultiError;
use crate::base::transferstate::{TransferOutcome, TransferState};
use crate::transfer::config::TransferConfig;

static NEXT_TRANSFER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one transfer handle.
///
/// Sessions and engines key every lookup by id rather than by handle
/// reference, so a removed or closed handle can never be confused with a
/// live one occupying the same allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(u64);

impl TransferId {
    fn next() -> Self {
        TransferId(NEXT_TRANSFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct TransferInner {
    config: Option<TransferConfig>,
    state: TransferState,
    closed: bool,
    header_buf: BytesMut,
    body_buf: BytesMut,
    response_code: i64,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl TransferInner {
    fn new(config: Option<TransferConfig>) -> Self {
        let state = if config.is_some() {
            TransferState::Configured
        } else {
            TransferState::Idle
        };
        Self {
            config,
            state,
            closed: false,
            header_buf: BytesMut::new(),
            body_buf: BytesMut::new(),
            response_code: 0,
            started_at: None,
            finished_at: None,
        }
    }

    fn clear_response(&mut self) {
        self.header_buf.clear();
        self.body_buf.clear();
        self.response_code = 0;
        self.started_at = None;
        self.finished_at = None;
    }
}

/// One configured transfer and its accumulated response.
#[derive(Clone)]
pub struct Transfer {
    id: TransferId,
    inner: Arc<Mutex<TransferInner>>,
}

impl Transfer {
    /// Create an empty handle in `Idle` state.
    pub fn new() -> Self {
        Self {
            id: TransferId::next(),
            inner: Arc::new(Mutex::new(TransferInner::new(None))),
        }
    }

    /// Create a handle already carrying its configuration.
    pub fn with_config(config: TransferConfig) -> Self {
        Self {
            id: TransferId::next(),
            inner: Arc::new(Mutex::new(TransferInner::new(Some(config)))),
        }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    /// Install or replace the configuration. Valid until the handle is
    /// attached to a session.
    pub fn configure(&self, config: TransferConfig) -> Result<(), MultiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(MultiError::HandleClosed);
        }
        if inner.state.is_attached() {
            return Err(MultiError::HandleAttached);
        }
        inner.config = Some(config);
        inner.state = TransferState::Configured;
        Ok(())
    }

    pub fn state(&self) -> TransferState {
        self.inner.lock().unwrap().state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), TransferState::Running)
    }

    /// The outcome, once a completion message for this handle has been
    /// applied. `None` while the transfer has not finished.
    pub fn read_result(&self) -> Option<TransferOutcome> {
        match self.inner.lock().unwrap().state {
            TransferState::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Accumulated response header bytes, in arrival order.
    pub fn header_bytes(&self) -> Result<Bytes, MultiError> {
        let inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(MultiError::HandleClosed);
        }
        Ok(Bytes::copy_from_slice(&inner.header_buf))
    }

    /// Accumulated response body bytes, in arrival order.
    pub fn body_bytes(&self) -> Result<Bytes, MultiError> {
        let inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(MultiError::HandleClosed);
        }
        Ok(Bytes::copy_from_slice(&inner.body_buf))
    }

    /// Numeric response code; `0` until the engine records one.
    pub fn response_code(&self) -> Result<i64, MultiError> {
        let inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(MultiError::HandleClosed);
        }
        Ok(inner.response_code)
    }

    /// Wall-clock duration of the transfer, once finished.
    pub fn total_time(&self) -> Result<Option<Duration>, MultiError> {
        let inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(MultiError::HandleClosed);
        }
        match (inner.started_at, inner.finished_at) {
            (Some(start), Some(end)) => Ok(Some(end.duration_since(start))),
            _ => Ok(None),
        }
    }

    /// Return the handle to `Configured`, clearing response state.
    ///
    /// Invalid while attached to a session; remove it first.
    pub fn reset(&self) -> Result<(), MultiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(MultiError::HandleClosed);
        }
        match inner.state {
            TransferState::Running => return Err(MultiError::StillRunning),
            TransferState::Added | TransferState::Completed(_) => {
                return Err(MultiError::HandleAttached)
            }
            _ => {}
        }
        inner.clear_response();
        inner.state = if inner.config.is_some() {
            TransferState::Configured
        } else {
            TransferState::Idle
        };
        Ok(())
    }

    /// Release the handle's resources. Invalid while attached; all later
    /// operations fail with `HandleClosed`. Idempotent.
    pub fn close(&self) -> Result<(), MultiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Ok(());
        }
        match inner.state {
            TransferState::Running => return Err(MultiError::StillRunning),
            TransferState::Added | TransferState::Completed(_) => {
                return Err(MultiError::HandleAttached)
            }
            _ => {}
        }
        inner.closed = true;
        inner.config = None;
        inner.clear_response();
        Ok(())
    }

    /// Session side of `add_handle`: validates the state machine and flips
    /// to `Added`, returning the configuration snapshot the engine will run.
    pub(crate) fn begin_attach(&self) -> Result<TransferConfig, MultiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(MultiError::HandleClosed);
        }
        if inner.state.is_attached() {
            return Err(MultiError::HandleAttached);
        }
        let config = match &inner.config {
            Some(config) => config.clone(),
            None => return Err(MultiError::HandleUnconfigured),
        };
        inner.clear_response();
        inner.state = TransferState::Added;
        Ok(config)
    }

    pub(crate) fn mark_running(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = TransferState::Running;
        inner.started_at = Some(Instant::now());
    }

    pub(crate) fn mark_completed(&self, outcome: TransferOutcome) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = TransferState::Completed(outcome);
        inner.finished_at = Some(Instant::now());
    }

    pub(crate) fn mark_removed(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = TransferState::Removed;
    }

    /// Write side handed to the engine when the transfer starts.
    pub(crate) fn sink(&self) -> ResponseSink {
        ResponseSink {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for Transfer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("Transfer")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("response_code", &inner.response_code)
            .field("body_len", &inner.body_buf.len())
            .finish()
    }
}

/// Engine-facing write access to a transfer's response buffers.
///
/// The engine appends whatever the wire produced; the orchestration layer
/// never inspects the content.
#[derive(Clone)]
pub struct ResponseSink {
    inner: Arc<Mutex<TransferInner>>,
}

impl ResponseSink {
    /// Append one response header line, terminated like the wire delivers it.
    pub fn push_header_line(&self, line: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.header_buf.extend_from_slice(line.as_bytes());
        inner.header_buf.extend_from_slice(b"\r\n");
    }

    /// Append a chunk of response body.
    pub fn push_body(&self, chunk: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.body_buf.extend_from_slice(chunk);
    }

    /// Record the numeric response code.
    pub fn set_response_code(&self, code: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.response_code = code;
    }
}
