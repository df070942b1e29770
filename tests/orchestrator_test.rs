//! Multi-session orchestration coverage.
//!
//! Exercises the blocking and polling completion modes over the scripted
//! engine. Nothing here touches the network; the socket-readiness tests use
//! local socket pairs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use mimicnet::base::multierror::{EngineError, MultiError};
use mimicnet::base::transfererror::TransferError;
use mimicnet::base::transferstate::{TransferOutcome, TransferState};
use mimicnet::engine::{Events, Interest, Script, ScriptedEngine, TIMEOUT_SOCKET};
use mimicnet::multi::MultiSession;
use mimicnet::transfer::{Transfer, TransferConfig};

fn scripted_session(scripts: &[(&str, Script)]) -> MultiSession {
    let engine = ScriptedEngine::new();
    let book = engine.book();
    for (url, script) in scripts {
        book.stage(url, script.clone());
    }
    MultiSession::new(engine).unwrap()
}

fn transfer(url: &str) -> Transfer {
    Transfer::with_config(TransferConfig::new(url).unwrap())
}

/// Drive the session until nothing is running, collecting every drained
/// message. Bounded so a regression fails instead of hanging.
fn run_to_idle(session: &mut MultiSession) -> Vec<(u64, TransferOutcome)> {
    let mut drained = Vec::new();
    for _ in 0..100 {
        let remaining = session.perform().unwrap();
        while let Some(message) = session.info_read() {
            drained.push((message.id.as_u64(), message.outcome));
        }
        if remaining == 0 {
            return drained;
        }
        session.wait(Duration::from_millis(50)).unwrap();
    }
    panic!("session never went idle; drained so far: {:?}", drained);
}

#[test]
fn test_perform_drain_delivers_each_handle_once() {
    let mut session = scripted_session(&[
        ("https://a.test/", Script::new().status(200).body("alpha")),
        (
            "https://b.test/",
            Script::new()
                .want_timer(Duration::from_millis(10))
                .status(200)
                .header("HTTP/1.1 200 OK")
                .body("bravo"),
        ),
        (
            "https://c.test/",
            Script::new()
                .want_timer(Duration::from_millis(5))
                .want_timer(Duration::from_millis(5))
                .status(204),
        ),
    ]);

    // 1. Attach all three
    let transfers = [
        transfer("https://a.test/"),
        transfer("https://b.test/"),
        transfer("https://c.test/"),
    ];
    for t in &transfers {
        session.add_handle(t).unwrap();
    }

    // 2. Drive to completion
    let drained = run_to_idle(&mut session);

    // 3. Exactly one message per handle, no duplicates
    assert_eq!(drained.len(), 3);
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for (id, outcome) in &drained {
        assert!(outcome.is_success());
        *counts.entry(*id).or_default() += 1;
    }
    for t in &transfers {
        assert_eq!(counts.get(&t.id().as_u64()), Some(&1));
        assert_eq!(t.read_result(), Some(TransferOutcome::Success));
    }
    assert_eq!(session.remaining(), 0);

    // 4. Response data landed on the right handles
    assert_eq!(&transfers[0].body_bytes().unwrap()[..], b"alpha");
    assert_eq!(&transfers[1].body_bytes().unwrap()[..], b"bravo");
    assert_eq!(transfers[2].response_code().unwrap(), 204);
}

#[test]
fn test_info_read_empty_returns_none_repeatedly() {
    let mut session = scripted_session(&[("https://a.test/", Script::new().status(200))]);
    let t = transfer("https://a.test/");
    session.add_handle(&t).unwrap();
    session.perform().unwrap();

    assert!(session.info_read().is_some());
    assert!(session.info_read().is_none());
    assert!(session.info_read().is_none());
    assert!(session.info_read().is_none());
}

#[test]
fn test_two_handles_wait_then_drain_scenario() {
    let script = Script::new()
        .want_timer(Duration::from_millis(10))
        .status(200)
        .body("done");
    let mut session = scripted_session(&[
        ("https://a.test/", script.clone()),
        ("https://b.test/", script),
    ]);
    let a = transfer("https://a.test/");
    let b = transfer("https://b.test/");
    session.add_handle(&a).unwrap();
    session.add_handle(&b).unwrap();

    // First perform starts both
    let remaining = session.perform().unwrap();
    assert_eq!(remaining, 2);

    session.wait(Duration::from_millis(1000)).unwrap();
    let after_wait = session.perform().unwrap();
    assert!(after_wait <= 2);

    // Drain everything, finishing the drive if needed
    let mut drained: Vec<u64> = Vec::new();
    while let Some(message) = session.info_read() {
        drained.push(message.id.as_u64());
    }
    for _ in 0..50 {
        if session.remaining() == 0 {
            break;
        }
        session.wait(Duration::from_millis(50)).unwrap();
        session.perform().unwrap();
        while let Some(message) = session.info_read() {
            drained.push(message.id.as_u64());
        }
    }

    drained.sort_unstable();
    let mut expected = vec![a.id().as_u64(), b.id().as_u64()];
    expected.sort_unstable();
    assert_eq!(drained, expected);
}

#[test]
fn test_remove_running_handle_suppresses_completion() {
    let mut session = scripted_session(&[(
        "https://slow.test/",
        Script::new().want_timer(Duration::from_secs(60)).body("never"),
    )]);
    let t = transfer("https://slow.test/");
    session.add_handle(&t).unwrap();

    // Parked on the long timer, still running
    assert_eq!(session.perform().unwrap(), 1);
    assert!(t.is_running());

    session.remove_handle(&t).unwrap();
    assert_eq!(session.remaining(), 0);
    assert_eq!(t.state(), TransferState::Removed);

    // No completion message may ever reference the removed handle
    for _ in 0..3 {
        session.perform().unwrap();
        assert!(session.info_read().is_none());
    }
}

#[test]
fn test_remove_running_decrements_only_target() {
    let mut session = scripted_session(&[
        (
            "https://slow.test/",
            Script::new().want_timer(Duration::from_secs(60)).body("never"),
        ),
        (
            "https://quick.test/",
            Script::new().want_timer(Duration::from_millis(5)).status(200),
        ),
    ]);
    let slow = transfer("https://slow.test/");
    let quick = transfer("https://quick.test/");
    session.add_handle(&slow).unwrap();
    session.add_handle(&quick).unwrap();
    assert_eq!(session.perform().unwrap(), 2);

    session.remove_handle(&slow).unwrap();
    assert_eq!(session.remaining(), 1);

    let drained = run_to_idle(&mut session);
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].0, quick.id().as_u64());
    assert_eq!(quick.read_result(), Some(TransferOutcome::Success));
}

#[test]
fn test_socket_action_unknown_socket_is_noop() {
    let mut session = scripted_session(&[(
        "https://a.test/",
        Script::new().want_socket(33, Interest::Read).status(200),
    )]);
    let t = transfer("https://a.test/");
    session.add_handle(&t).unwrap();
    assert_eq!(session.perform().unwrap(), 1);

    // A descriptor the engine never announced: nothing changes
    let remaining = session
        .socket_action(999, Events::new().input())
        .unwrap();
    assert_eq!(remaining, 1);
    assert!(session.info_read().is_none());

    // The announced descriptor drives the transfer home
    let remaining = session.socket_action(33, Events::new().input()).unwrap();
    assert_eq!(remaining, 0);
    let message = session.info_read().unwrap();
    assert_eq!(message.id, t.id());
}

#[test]
fn test_socket_action_timeout_sentinel_advances_timer_waits() {
    let mut session = scripted_session(&[(
        "https://a.test/",
        Script::new().want_timer(Duration::from_millis(5)).status(200),
    )]);
    let t = transfer("https://a.test/");
    session.add_handle(&t).unwrap();
    assert_eq!(session.perform().unwrap(), 1);

    let remaining = session
        .socket_action(TIMEOUT_SOCKET, Events::new())
        .unwrap();
    assert_eq!(remaining, 0);
    assert_eq!(session.info_read().unwrap().id, t.id());
    assert_eq!(t.response_code().unwrap(), 200);
}

#[test]
fn test_execute_runs_single_transfer_to_completion() {
    let mut session = scripted_session(&[(
        "https://one.test/",
        Script::new()
            .want_timer(Duration::from_millis(5))
            .status(200)
            .header("HTTP/1.1 200 OK")
            .header("Content-Type: text/plain")
            .body("payload"),
    )]);
    let t = transfer("https://one.test/");

    let outcome = session.execute(&t).unwrap();
    assert_eq!(outcome, TransferOutcome::Success);
    assert_eq!(t.state(), TransferState::Removed);
    assert_eq!(t.response_code().unwrap(), 200);
    assert_eq!(&t.body_bytes().unwrap()[..], b"payload");
    assert!(t.total_time().unwrap().is_some());

    // The session stays usable for further transfers
    let again = transfer("https://one.test/");
    assert_eq!(session.execute(&again).unwrap(), TransferOutcome::Success);
}

#[test]
fn test_execute_surfaces_failure_as_outcome() {
    let mut session = scripted_session(&[(
        "https://broken.test/",
        Script::failing(TransferError::CouldntConnect),
    )]);

    let t = transfer("https://broken.test/");
    let outcome = session.execute(&t).unwrap();
    assert_eq!(
        outcome,
        TransferOutcome::Failure(TransferError::CouldntConnect)
    );

    // A URL without a script behaves like a host that does not resolve
    let unknown = transfer("https://nowhere.invalid/");
    assert_eq!(
        session.execute(&unknown).unwrap(),
        TransferOutcome::Failure(TransferError::CouldntResolveHost)
    );
}

#[test]
fn test_transfer_failure_spares_siblings() {
    let mut session = scripted_session(&[
        (
            "https://bad.test/",
            Script::failing(TransferError::OperationTimedOut),
        ),
        ("https://good.test/", Script::new().status(200).body("fine")),
    ]);
    let bad = transfer("https://bad.test/");
    let good = transfer("https://good.test/");
    session.add_handle(&bad).unwrap();
    session.add_handle(&good).unwrap();

    let drained = run_to_idle(&mut session);
    assert_eq!(drained.len(), 2);

    let outcomes: HashMap<u64, TransferOutcome> = drained.into_iter().collect();
    assert_eq!(
        outcomes[&bad.id().as_u64()],
        TransferOutcome::Failure(TransferError::OperationTimedOut)
    );
    assert_eq!(outcomes[&good.id().as_u64()], TransferOutcome::Success);
}

#[test]
fn test_engine_fault_fails_the_call_but_keeps_messages() {
    // The first transfer completes in the same driving call in which the
    // second one faults; its message must stay drainable.
    let mut session = scripted_session(&[
        ("https://ok.test/", Script::new().status(200)),
        (
            "https://fault.test/",
            Script::new().fault("injected fault").status(200),
        ),
    ]);
    let ok = transfer("https://ok.test/");
    let faulty = transfer("https://fault.test/");
    session.add_handle(&ok).unwrap();
    session.add_handle(&faulty).unwrap();

    let error = session.perform().unwrap_err();
    assert!(matches!(
        error,
        MultiError::Engine(EngineError::Internal(_))
    ));

    // The completed sibling's message survived the engine error
    let message = session.info_read().unwrap();
    assert_eq!(message.id, ok.id());
    assert!(message.outcome.is_success());

    // The faulty transfer recovers on the next driving call
    let drained = run_to_idle(&mut session);
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].0, faulty.id().as_u64());
}

#[test]
fn test_independent_sessions_do_not_interfere() {
    let mut first = scripted_session(&[(
        "https://a.test/",
        Script::new().want_timer(Duration::from_millis(5)).status(200),
    )]);
    let mut second = scripted_session(&[(
        "https://b.test/",
        Script::new().want_timer(Duration::from_millis(5)).status(201),
    )]);
    let a = transfer("https://a.test/");
    let b = transfer("https://b.test/");

    // Interleave the two drive loops
    first.add_handle(&a).unwrap();
    second.add_handle(&b).unwrap();
    assert_eq!(first.perform().unwrap(), 1);
    assert_eq!(second.perform().unwrap(), 1);

    let first_drained = run_to_idle(&mut first);
    let second_drained = run_to_idle(&mut second);

    assert_eq!(first_drained.len(), 1);
    assert_eq!(first_drained[0].0, a.id().as_u64());
    assert_eq!(second_drained.len(), 1);
    assert_eq!(second_drained[0].0, b.id().as_u64());
    assert_eq!(a.response_code().unwrap(), 200);
    assert_eq!(b.response_code().unwrap(), 201);
}

#[test]
fn test_wait_returns_immediately_without_sockets_but_poll_sleeps() {
    let mut session = scripted_session(&[]);

    let start = Instant::now();
    session.wait(Duration::from_millis(500)).unwrap();
    assert!(start.elapsed() < Duration::from_millis(100));

    let start = Instant::now();
    session.poll(Duration::from_millis(100)).unwrap();
    assert!(start.elapsed() >= Duration::from_millis(80));
}

#[cfg(unix)]
#[test]
fn test_wait_wakes_on_socket_readiness() {
    use std::io::Write;
    use std::os::fd::AsRawFd;

    let (mut writer, reader) = std::os::unix::net::UnixStream::pair().unwrap();
    writer.write_all(b"x").unwrap();

    let fd = reader.as_raw_fd();
    let mut session = scripted_session(&[(
        "https://sock.test/",
        Script::new()
            .want_socket(fd, Interest::Read)
            .status(200)
            .body("socket-paced"),
    )]);
    let t = transfer("https://sock.test/");
    session.add_handle(&t).unwrap();
    assert_eq!(session.perform().unwrap(), 1);

    // The readable descriptor ends the wait well before the timeout
    let start = Instant::now();
    session.wait(Duration::from_secs(5)).unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));

    let drained = run_to_idle(&mut session);
    assert_eq!(drained.len(), 1);
    assert_eq!(&t.body_bytes().unwrap()[..], b"socket-paced");
}

#[cfg(unix)]
#[test]
fn test_wakeup_unblocks_pending_wait() {
    use std::os::fd::AsRawFd;

    // A socket pair with no data: the wait would run its full timeout
    let (_quiet, reader) = std::os::unix::net::UnixStream::pair().unwrap();
    let fd = reader.as_raw_fd();
    let mut session = scripted_session(&[(
        "https://quiet.test/",
        Script::new().want_socket(fd, Interest::Read).status(200),
    )]);
    let t = transfer("https://quiet.test/");
    session.add_handle(&t).unwrap();
    assert_eq!(session.perform().unwrap(), 1);

    let wake = session.wake_handle();
    let waker = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        wake.wake();
    });

    let start = Instant::now();
    session.wait(Duration::from_secs(10)).unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));
    waker.join().unwrap();
}

#[test]
fn test_close_aborts_and_rejects_later_operations() {
    let mut session = scripted_session(&[
        ("https://done.test/", Script::new().status(200)),
        (
            "https://running.test/",
            Script::new().want_timer(Duration::from_secs(60)).body("never"),
        ),
    ]);
    let done = transfer("https://done.test/");
    let running = transfer("https://running.test/");
    session.add_handle(&done).unwrap();
    session.add_handle(&running).unwrap();

    // One finished (message queued, undrained), one still running
    session.perform().unwrap();
    assert_eq!(session.remaining(), 1);

    session.close();
    assert_eq!(done.state(), TransferState::Removed);
    assert_eq!(running.state(), TransferState::Removed);

    // Undrained messages are gone; driving calls fail
    assert!(session.info_read().is_none());
    assert_eq!(session.perform().unwrap_err(), MultiError::SessionClosed);
    assert_eq!(
        session.add_handle(&transfer("https://done.test/")).unwrap_err(),
        MultiError::SessionClosed
    );
    assert_eq!(
        session
            .socket_action(TIMEOUT_SOCKET, Events::new())
            .unwrap_err(),
        MultiError::SessionClosed
    );

    // Accumulated response data stays readable on the released handle
    assert_eq!(done.response_code().unwrap(), 200);
}
