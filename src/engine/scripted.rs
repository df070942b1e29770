//! Deterministic engine for tests, demos, and benchmarks.
//!
//! A [`ScriptedEngine`] plays back per-URL scripts instead of touching the
//! network. Scripts pace themselves the way a real engine does: each
//! `WantSocket`/`WantTimer` step parks the transfer until the matching
//! readiness or timer expiry is driven back in, so every orchestration path
//! (perform loops, wait clamping, socket-action routing, completion
//! dispatch) is exercised for real.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::base::multierror::EngineError;
use crate::base::transfererror::TransferError;
use crate::base::transferstate::TransferOutcome;
use crate::engine::drive::{
    EngineEvent, Events, Interest, Socket, TransferEngine, TIMEOUT_SOCKET,
};
use crate::transfer::{ResponseSink, TransferConfig, TransferId};

/// One step of a scripted transfer.
#[derive(Debug, Clone)]
enum ScriptStep {
    /// Announce interest on a descriptor and park until it is driven ready.
    WantSocket { socket: Socket, interest: Interest },
    /// Ask for a timer and park until expiry is driven in.
    WantTimer(Duration),
    /// Deliver one response header line.
    Header(String),
    /// Deliver a chunk of response body.
    Body(Bytes),
    /// Record the response status code.
    Status(i64),
    /// Make the next driving call fail with an engine error.
    Fault(String),
}

/// Playback script for one URL.
#[derive(Debug, Clone)]
pub struct Script {
    steps: Vec<ScriptStep>,
    outcome: TransferOutcome,
}

impl Script {
    /// A script that completes successfully after its steps run out.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            outcome: TransferOutcome::Success,
        }
    }

    /// A script that ends in the given transfer error.
    pub fn failing(error: TransferError) -> Self {
        Self {
            steps: Vec::new(),
            outcome: TransferOutcome::Failure(error),
        }
    }

    pub fn want_socket(mut self, socket: Socket, interest: Interest) -> Self {
        self.steps.push(ScriptStep::WantSocket { socket, interest });
        self
    }

    pub fn want_timer(mut self, timeout: Duration) -> Self {
        self.steps.push(ScriptStep::WantTimer(timeout));
        self
    }

    pub fn header(mut self, line: &str) -> Self {
        self.steps.push(ScriptStep::Header(line.to_string()));
        self
    }

    pub fn body(mut self, chunk: impl Into<Bytes>) -> Self {
        self.steps.push(ScriptStep::Body(chunk.into()));
        self
    }

    pub fn status(mut self, code: i64) -> Self {
        self.steps.push(ScriptStep::Status(code));
        self
    }

    pub fn fault(mut self, message: &str) -> Self {
        self.steps.push(ScriptStep::Fault(message.to_string()));
        self
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared script table, insertable while an engine is running.
///
/// Tests hold a clone and stage scripts without going through the session
/// that owns the engine.
#[derive(Clone, Default)]
pub struct ScriptBook {
    scripts: Arc<DashMap<String, Script>>,
}

impl ScriptBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the script played back for transfers to `url`.
    pub fn stage(&self, url: &str, script: Script) {
        let key = match Url::parse(url) {
            Ok(parsed) => parsed.to_string(),
            Err(_) => url.to_string(),
        };
        self.scripts.insert(key, script);
    }

    fn lookup(&self, url: &Url) -> Option<Script> {
        self.scripts.get(url.as_str()).map(|entry| entry.value().clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Socket(Socket),
    Timer,
}

struct RunState {
    script: Script,
    cursor: usize,
    blocked: Option<Block>,
    sink: ResponseSink,
    sockets: Vec<Socket>,
}

/// Script playback engine.
pub struct ScriptedEngine {
    book: ScriptBook,
    // BTreeMap so driving order follows id allocation order.
    running: BTreeMap<TransferId, RunState>,
    queue: VecDeque<EngineEvent>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::with_book(ScriptBook::new())
    }

    pub fn with_book(book: ScriptBook) -> Self {
        Self {
            book,
            running: BTreeMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// A handle for staging scripts after the engine moved into a session.
    pub fn book(&self) -> ScriptBook {
        self.book.clone()
    }

    /// Run one transfer forward until it parks or finishes.
    fn advance(&mut self, id: TransferId) -> Result<(), EngineError> {
        let mut run = match self.running.remove(&id) {
            Some(run) => run,
            None => return Ok(()),
        };
        run.blocked = None;
        let mut result = Ok(());
        loop {
            if run.cursor >= run.script.steps.len() {
                for socket in run.sockets.drain(..) {
                    self.queue.push_back(EngineEvent::Socket {
                        socket,
                        interest: Interest::None,
                    });
                }
                self.queue.push_back(EngineEvent::Done {
                    id,
                    outcome: run.script.outcome,
                });
                if self.running.is_empty() {
                    self.queue.push_back(EngineEvent::Timer { timeout: None });
                }
                return result;
            }
            let step = run.script.steps[run.cursor].clone();
            run.cursor += 1;
            match step {
                ScriptStep::Header(line) => run.sink.push_header_line(&line),
                ScriptStep::Body(chunk) => run.sink.push_body(&chunk),
                ScriptStep::Status(code) => run.sink.set_response_code(code),
                ScriptStep::WantSocket { socket, interest } => {
                    if interest.is_none() {
                        run.sockets.retain(|s| *s != socket);
                    } else if !run.sockets.contains(&socket) {
                        run.sockets.push(socket);
                    }
                    self.queue.push_back(EngineEvent::Socket { socket, interest });
                    run.blocked = Some(Block::Socket(socket));
                    break;
                }
                ScriptStep::WantTimer(timeout) => {
                    self.queue.push_back(EngineEvent::Timer {
                        timeout: Some(timeout),
                    });
                    run.blocked = Some(Block::Timer);
                    break;
                }
                ScriptStep::Fault(message) => {
                    result = Err(EngineError::Internal(message));
                    break;
                }
            }
        }
        self.running.insert(id, run);
        result
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferEngine for ScriptedEngine {
    fn start(
        &mut self,
        id: TransferId,
        config: &TransferConfig,
        sink: ResponseSink,
    ) -> Result<(), EngineError> {
        if self.running.contains_key(&id) {
            return Err(EngineError::BadHandle);
        }
        // No script staged behaves like a host that does not resolve.
        let script = self
            .book
            .lookup(config.url())
            .unwrap_or_else(|| Script::failing(TransferError::CouldntResolveHost));
        self.running.insert(
            id,
            RunState {
                script,
                cursor: 0,
                // Parked until the add-handle timer kick drives it.
                blocked: Some(Block::Timer),
                sink,
                sockets: Vec::new(),
            },
        );
        Ok(())
    }

    fn cancel(&mut self, id: TransferId) {
        if let Some(run) = self.running.remove(&id) {
            for socket in run.sockets {
                self.queue.push_back(EngineEvent::Socket {
                    socket,
                    interest: Interest::None,
                });
            }
            if self.running.is_empty() {
                self.queue.push_back(EngineEvent::Timer { timeout: None });
            }
        }
    }

    fn drive(&mut self) -> Result<(), EngineError> {
        let ids: Vec<TransferId> = self.running.keys().copied().collect();
        for id in ids {
            self.advance(id)?;
        }
        Ok(())
    }

    fn drive_socket(&mut self, socket: Socket, _events: Events) -> Result<(), EngineError> {
        let wanted = |blocked: &Option<Block>| {
            if socket == TIMEOUT_SOCKET {
                matches!(blocked, Some(Block::Timer))
            } else {
                matches!(blocked, Some(Block::Socket(s)) if *s == socket)
            }
        };
        let ids: Vec<TransferId> = self
            .running
            .iter()
            .filter(|(_, run)| wanted(&run.blocked))
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.advance(id)?;
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Option<EngineEvent> {
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::Transfer;

    fn drain(engine: &mut ScriptedEngine) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some(event) = engine.poll_event() {
            events.push(event);
        }
        events
    }

    fn start(engine: &mut ScriptedEngine, url: &str) -> Transfer {
        let transfer = Transfer::with_config(TransferConfig::new(url).unwrap());
        let config = transfer.begin_attach().unwrap();
        engine
            .start(transfer.id(), &config, transfer.sink())
            .unwrap();
        transfer
    }

    #[test]
    fn test_unknown_url_fails_like_resolution() {
        let mut engine = ScriptedEngine::new();
        let transfer = start(&mut engine, "https://nowhere.invalid/");

        engine.drive_socket(TIMEOUT_SOCKET, Events::new()).unwrap();
        let events = drain(&mut engine);
        assert!(events.contains(&EngineEvent::Done {
            id: transfer.id(),
            outcome: TransferOutcome::Failure(TransferError::CouldntResolveHost),
        }));
    }

    #[test]
    fn test_script_paces_across_driving_calls() {
        let mut engine = ScriptedEngine::new();
        engine.book().stage(
            "https://a.test/",
            Script::new()
                .want_timer(Duration::from_millis(10))
                .status(200)
                .header("HTTP/1.1 200 OK")
                .body("payload"),
        );
        let transfer = start(&mut engine, "https://a.test/");

        // Kick: runs up to the timer request.
        engine.drive_socket(TIMEOUT_SOCKET, Events::new()).unwrap();
        assert_eq!(
            drain(&mut engine),
            vec![EngineEvent::Timer {
                timeout: Some(Duration::from_millis(10))
            }]
        );
        assert_eq!(transfer.response_code().unwrap(), 0);

        // Timer expiry: delivers the response and finishes.
        engine.drive_socket(TIMEOUT_SOCKET, Events::new()).unwrap();
        let events = drain(&mut engine);
        assert_eq!(
            events,
            vec![
                EngineEvent::Done {
                    id: transfer.id(),
                    outcome: TransferOutcome::Success
                },
                EngineEvent::Timer { timeout: None },
            ]
        );
        assert_eq!(transfer.response_code().unwrap(), 200);
        assert_eq!(transfer.body_bytes().unwrap(), Bytes::from_static(b"payload"));
    }

    #[test]
    fn test_socket_parked_until_matching_descriptor() {
        let mut engine = ScriptedEngine::new();
        engine.book().stage(
            "https://b.test/",
            Script::new()
                .want_socket(5, Interest::Read)
                .body("data"),
        );
        let transfer = start(&mut engine, "https://b.test/");

        engine.drive_socket(TIMEOUT_SOCKET, Events::new()).unwrap();
        assert_eq!(
            drain(&mut engine),
            vec![EngineEvent::Socket {
                socket: 5,
                interest: Interest::Read
            }]
        );

        // Wrong descriptor: parked transfer stays parked.
        engine.drive_socket(7, Events::new().input()).unwrap();
        assert!(drain(&mut engine).is_empty());

        engine.drive_socket(5, Events::new().input()).unwrap();
        let events = drain(&mut engine);
        assert_eq!(
            events,
            vec![
                EngineEvent::Socket {
                    socket: 5,
                    interest: Interest::None
                },
                EngineEvent::Done {
                    id: transfer.id(),
                    outcome: TransferOutcome::Success
                },
                EngineEvent::Timer { timeout: None },
            ]
        );
    }

    #[test]
    fn test_cancel_unwatches_sockets() {
        let mut engine = ScriptedEngine::new();
        engine.book().stage(
            "https://c.test/",
            Script::new().want_socket(9, Interest::Both).body("never"),
        );
        let transfer = start(&mut engine, "https://c.test/");
        engine.drive_socket(TIMEOUT_SOCKET, Events::new()).unwrap();
        drain(&mut engine);

        engine.cancel(transfer.id());
        let events = drain(&mut engine);
        assert_eq!(
            events,
            vec![
                EngineEvent::Socket {
                    socket: 9,
                    interest: Interest::None
                },
                EngineEvent::Timer { timeout: None },
            ]
        );

        // No Done may ever follow a cancel.
        engine.drive().unwrap();
        assert!(drain(&mut engine).is_empty());
    }

    #[test]
    fn test_fault_fails_the_driving_call_only() {
        let mut engine = ScriptedEngine::new();
        engine.book().stage(
            "https://d.test/",
            Script::new().fault("simulated breakage").body("after"),
        );
        let transfer = start(&mut engine, "https://d.test/");

        let err = engine.drive().unwrap_err();
        assert_eq!(err, EngineError::Internal("simulated breakage".to_string()));

        // The transfer survives and finishes on the next call.
        engine.drive().unwrap();
        let events = drain(&mut engine);
        assert!(events.contains(&EngineEvent::Done {
            id: transfer.id(),
            outcome: TransferOutcome::Success
        }));
        assert_eq!(transfer.body_bytes().unwrap(), Bytes::from_static(b"after"));
    }

    #[test]
    fn test_duplicate_start_rejected() {
        let mut engine = ScriptedEngine::new();
        engine.book().stage("https://e.test/", Script::new());
        let transfer = start(&mut engine, "https://e.test/");
        let config = TransferConfig::new("https://e.test/").unwrap();
        let err = engine
            .start(transfer.id(), &config, transfer.sink())
            .unwrap_err();
        assert_eq!(err, EngineError::BadHandle);
    }
}
