//! The multi-transfer orchestrator.
//!
//! A [`MultiSession`] owns the set of attached transfer handles, drives the
//! engine through its event loop, and surfaces completion three ways:
//!
//! - [`execute`](MultiSession::execute): blocking, one transfer.
//! - [`perform`](MultiSession::perform) / [`wait`](MultiSession::wait) /
//!   [`info_read`](MultiSession::info_read): a caller-owned polling loop.
//! - [`socket_action`](MultiSession::socket_action) plus socket/timer sinks:
//!   the event-driven path the reactor builds on, with
//!   [`submit`](MultiSession::submit) resolving per-transfer futures.
//!
//! A session is single-driver: whoever owns it (directly, or through the
//! reactor's lock) serializes all calls. Two sessions share nothing.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::base::multierror::MultiError;
use crate::base::transfererror::TransferError;
use crate::base::transferstate::TransferOutcome;
use crate::engine::{EngineEvent, Events, Interest, Socket, TransferEngine, TIMEOUT_SOCKET};
use crate::multi::queue::{CompletionMessage, CompletionQueue};
use crate::multi::sockets::SocketRegistry;
use crate::multi::timer::TimerState;
use crate::multi::waiter::{WakeHandle, Waiter};
use crate::transfer::{Transfer, TransferConfig, TransferId};

/// Notification sink for socket watch changes (reactor mode).
pub type SocketSink = Box<dyn FnMut(Socket, Interest) + Send>;

/// Notification sink for timer changes (reactor mode). `None` cancels.
pub type TimerSink = Box<dyn FnMut(Option<Duration>) + Send>;

struct PendingStart {
    id: TransferId,
    config: TransferConfig,
}

/// Multi-transfer orchestrator over one [`TransferEngine`].
pub struct MultiSession {
    engine: Box<dyn TransferEngine>,
    handles: HashMap<TransferId, Transfer>,
    pending: Vec<PendingStart>,
    remaining: usize,
    sockets: SocketRegistry,
    timer: TimerState,
    queue: CompletionQueue,
    slots: HashMap<TransferId, oneshot::Sender<TransferOutcome>>,
    socket_sink: Option<SocketSink>,
    timer_sink: Option<TimerSink>,
    waiter: Waiter,
    closed: bool,
}

impl MultiSession {
    pub fn new<E: TransferEngine + 'static>(engine: E) -> Result<Self, MultiError> {
        Ok(Self {
            engine: Box::new(engine),
            handles: HashMap::new(),
            pending: Vec::new(),
            remaining: 0,
            sockets: SocketRegistry::new(),
            timer: TimerState::new(),
            queue: CompletionQueue::new(),
            slots: HashMap::new(),
            socket_sink: None,
            timer_sink: None,
            waiter: Waiter::new()?,
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<(), MultiError> {
        if self.closed {
            Err(MultiError::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Number of transfers currently in `Running` state.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Number of attached handles, regardless of state.
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// A handle that unblocks a pending `wait`/`poll` from another thread.
    pub fn wake_handle(&self) -> WakeHandle {
        self.waiter.wake_handle()
    }

    /// Attach a configured handle. The engine picks it up on the next
    /// driving call; an immediate timer is armed so that call comes promptly.
    pub fn add_handle(&mut self, transfer: &Transfer) -> Result<(), MultiError> {
        self.ensure_open()?;
        let config = transfer.begin_attach()?;
        let id = transfer.id();
        self.handles.insert(id, transfer.clone());
        self.pending.push(PendingStart { id, config });
        self.set_timer(Some(Duration::ZERO));
        tracing::debug!(id = %id, "transfer attached");
        Ok(())
    }

    /// Detach a handle, returning ownership to the caller.
    ///
    /// Removing a `Running` transfer aborts it: the engine cancels, the
    /// running count drops, and no completion message for it will ever be
    /// delivered. Any queued message is discarded.
    pub fn remove_handle(&mut self, transfer: &Transfer) -> Result<(), MultiError> {
        self.ensure_open()?;
        let id = transfer.id();
        let handle = self
            .handles
            .remove(&id)
            .ok_or(MultiError::HandleNotAttached)?;
        self.pending.retain(|p| p.id != id);
        if handle.is_running() {
            self.engine.cancel(id);
            self.remaining -= 1;
            self.apply_engine_events();
        }
        self.queue.purge(id);
        self.slots.remove(&id);
        handle.mark_removed();
        self.waiter.wake_handle().wake();
        tracing::debug!(id = %id, "transfer removed");
        Ok(())
    }

    /// Advance every running transfer as far as possible without blocking.
    /// Returns the number still running.
    pub fn perform(&mut self) -> Result<usize, MultiError> {
        self.ensure_open()?;
        // An already-due timer is serviced by this call. Timers armed during
        // the drive below stay pending and keep clamping `wait`/`poll`.
        if self.timer.is_due() {
            self.timer.clear();
        }
        self.start_pending();
        let driven = self.engine.drive();
        self.apply_engine_events();
        driven?;
        Ok(self.remaining)
    }

    /// Report socket readiness (or, with [`TIMEOUT_SOCKET`] and empty
    /// events, timer expiry) and advance the transfers affected.
    ///
    /// A descriptor the engine never announced is a no-op returning the
    /// unchanged running count.
    pub fn socket_action(&mut self, socket: Socket, events: Events) -> Result<usize, MultiError> {
        self.ensure_open()?;
        if socket == TIMEOUT_SOCKET {
            self.timer.clear();
        } else if !self.sockets.contains(socket) {
            return Ok(self.remaining);
        }
        self.start_pending();
        let driven = self.engine.drive_socket(socket, events);
        self.apply_engine_events();
        driven?;
        Ok(self.remaining)
    }

    /// Suspend until a watched socket is ready, the engine timer is due, a
    /// wakeup arrives, or `timeout` elapses. Returns immediately when no
    /// sockets are watched.
    pub fn wait(&mut self, timeout: Duration) -> Result<(), MultiError> {
        self.ensure_open()?;
        if self.sockets.is_empty() {
            return Ok(());
        }
        let sockets: Vec<(Socket, Interest)> = self.sockets.iter().collect();
        self.bounded_wait(&sockets, timeout)
    }

    /// Like [`wait`](Self::wait), but sleeps out the (timer-clamped) timeout
    /// when no sockets are watched instead of returning immediately.
    pub fn poll(&mut self, timeout: Duration) -> Result<(), MultiError> {
        self.ensure_open()?;
        let sockets: Vec<(Socket, Interest)> = self.sockets.iter().collect();
        self.bounded_wait(&sockets, timeout)
    }

    fn bounded_wait(
        &mut self,
        sockets: &[(Socket, Interest)],
        timeout: Duration,
    ) -> Result<(), MultiError> {
        let mut bound = timeout;
        if let Some(until_due) = self.timer.remaining() {
            bound = bound.min(until_due);
        }
        self.waiter.wait(sockets, bound)?;
        Ok(())
    }

    /// Drain one completion message, oldest first. `None` once empty, and
    /// `None` forever after `close`. Messages claimed by
    /// [`submit`](Self::submit) resolve their future instead of surfacing
    /// here.
    pub fn info_read(&mut self) -> Option<CompletionMessage> {
        if self.closed {
            return None;
        }
        loop {
            let message = self.queue.pop()?;
            if let Some(slot) = self.slots.remove(&message.id) {
                let _ = slot.send(message.outcome);
                continue;
            }
            return Some(message);
        }
    }

    /// Register the sink told about every socket watch change.
    pub fn set_socket_sink(
        &mut self,
        sink: impl FnMut(Socket, Interest) + Send + 'static,
    ) -> Result<(), MultiError> {
        self.ensure_open()?;
        self.socket_sink = Some(Box::new(sink));
        Ok(())
    }

    /// Register the sink told about every timer change.
    pub fn set_timer_sink(
        &mut self,
        sink: impl FnMut(Option<Duration>) + Send + 'static,
    ) -> Result<(), MultiError> {
        self.ensure_open()?;
        self.timer_sink = Some(Box::new(sink));
        Ok(())
    }

    /// Replay the current watch registry and timer into freshly installed
    /// sinks, for watches announced before the sinks existed.
    pub(crate) fn resync_watches(&mut self) {
        let entries: Vec<(Socket, Interest)> = self.sockets.iter().collect();
        if let Some(sink) = &mut self.socket_sink {
            for (socket, interest) in entries {
                sink(socket, interest);
            }
        }
        if let Some(left) = self.timer.remaining() {
            if let Some(sink) = &mut self.timer_sink {
                sink(Some(left));
            }
        }
    }

    /// Attach (if needed) and reserve this transfer's completion for the
    /// returned future. The future resolves exactly once, after the
    /// completion message is drained; a removed transfer resolves to
    /// [`MultiError::Cancelled`].
    pub fn submit(&mut self, transfer: &Transfer) -> Result<CompletionFuture, MultiError> {
        self.ensure_open()?;
        let id = transfer.id();
        if self.slots.contains_key(&id) {
            return Err(MultiError::AlreadySubmitted);
        }
        if self.handles.contains_key(&id) {
            // Already finished here: resolve immediately, claiming any
            // still-queued message so it cannot be delivered twice.
            if let Some(outcome) = transfer.read_result() {
                self.queue.take(id);
                let (tx, rx) = oneshot::channel();
                let _ = tx.send(outcome);
                return Ok(CompletionFuture { id, rx });
            }
        } else {
            self.add_handle(transfer)?;
        }
        let (tx, rx) = oneshot::channel();
        self.slots.insert(id, tx);
        Ok(CompletionFuture { id, rx })
    }

    /// Run one transfer to completion on the calling thread.
    ///
    /// The degenerate single-handle case: attach, drive until this
    /// transfer's message drains, detach, return the outcome. A transfer
    /// failure is the returned outcome, not an error.
    pub fn execute(&mut self, transfer: &Transfer) -> Result<TransferOutcome, MultiError> {
        self.ensure_open()?;
        self.add_handle(transfer)?;
        let id = transfer.id();
        let outcome = loop {
            self.perform()?;
            if let Some(message) = self.queue.take(id) {
                break message.outcome;
            }
            if self.remaining == 0 && self.pending.is_empty() {
                return Err(MultiError::LostTransfer);
            }
            self.poll(Duration::from_millis(100))?;
        };
        self.remove_handle(transfer)?;
        Ok(outcome)
    }

    /// Abort all transfers, release all handles, unwatch all sockets, and
    /// cancel the timer. Every later operation fails `SessionClosed`.
    /// Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        tracing::debug!(
            handles = self.handles.len(),
            watched = self.sockets.len(),
            "session closing"
        );
        for (id, handle) in self.handles.drain() {
            if handle.is_running() {
                self.engine.cancel(id);
            }
            handle.mark_removed();
        }
        // The sinks get one final notification per watched resource; the
        // engine's own cancel events are superseded by that.
        while self.engine.poll_event().is_some() {}
        self.pending.clear();
        self.remaining = 0;
        self.slots.clear();
        if !self.queue.is_empty() {
            tracing::debug!(discarded = self.queue.len(), "undrained completions discarded");
        }
        self.queue.clear();
        for socket in self.sockets.drain() {
            if let Some(sink) = &mut self.socket_sink {
                sink(socket, Interest::None);
            }
        }
        // Unconditional: a driving call may have consumed the timer without
        // notifying the sink.
        self.timer.clear();
        if let Some(sink) = &mut self.timer_sink {
            sink(None);
        }
        self.closed = true;
        self.waiter.wake_handle().wake();
    }

    /// Start transfers attached since the last driving call.
    fn start_pending(&mut self) {
        for PendingStart { id, config } in std::mem::take(&mut self.pending) {
            let handle = match self.handles.get(&id) {
                Some(handle) => handle.clone(),
                None => continue,
            };
            match self.engine.start(id, &config, handle.sink()) {
                Ok(()) => {
                    handle.mark_running();
                    self.remaining += 1;
                    tracing::debug!(id = %id, url = %config.url(), "transfer started");
                }
                Err(error) => {
                    // A transfer the engine refuses to start fails like any
                    // other transfer; it must not poison the session.
                    let outcome = TransferOutcome::Failure(TransferError::FailedInit);
                    handle.mark_completed(outcome);
                    self.queue.push(CompletionMessage { id, outcome });
                    tracing::warn!(id = %id, error = %error, "engine refused transfer");
                }
            }
        }
    }

    /// Drain the engine's event queue into registry, timer, and completion
    /// state, notifying sinks along the way.
    fn apply_engine_events(&mut self) {
        while let Some(event) = self.engine.poll_event() {
            match event {
                EngineEvent::Socket { socket, interest } => {
                    self.sockets.apply(socket, interest);
                    if let Some(sink) = &mut self.socket_sink {
                        sink(socket, interest);
                    }
                }
                EngineEvent::Timer { timeout } => {
                    self.set_timer(timeout);
                }
                EngineEvent::Done { id, outcome } => {
                    let handle = match self.handles.get(&id) {
                        Some(handle) => handle,
                        // Completion for a handle we no longer know;
                        // removal already suppressed it.
                        None => continue,
                    };
                    if !handle.is_running() {
                        continue;
                    }
                    handle.mark_completed(outcome);
                    self.remaining -= 1;
                    self.queue.push(CompletionMessage { id, outcome });
                    tracing::debug!(
                        id = %id,
                        success = outcome.is_success(),
                        remaining = self.remaining,
                        "transfer finished"
                    );
                }
            }
        }
    }

    fn set_timer(&mut self, timeout: Option<Duration>) {
        self.timer.apply(timeout);
        if let Some(sink) = &mut self.timer_sink {
            sink(timeout);
        }
    }
}

impl Drop for MultiSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolves to a submitted transfer's outcome once its completion message
/// is drained.
#[derive(Debug)]
pub struct CompletionFuture {
    id: TransferId,
    rx: oneshot::Receiver<TransferOutcome>,
}

impl CompletionFuture {
    pub fn id(&self) -> TransferId {
        self.id
    }
}

impl Future for CompletionFuture {
    type Output = Result<TransferOutcome, MultiError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|result| result.map_err(|_| MultiError::Cancelled))
    }
}
