//! Reactor-driven transfers example.
//!
//! Spawns the reactor over a scripted session, then dispatches one transfer
//! through the callback API and one through a submitted future.

use std::time::Duration;

use mimicnet::base::transfererror::TransferError;
use mimicnet::engine::{Script, ScriptedEngine};
use mimicnet::multi::MultiSession;
use mimicnet::reactor::ReactorDriver;
use mimicnet::transfer::{Transfer, TransferConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Stage deterministic responses; a native engine would hit the network
    let engine = ScriptedEngine::new();
    let book = engine.book();
    book.stage(
        "https://httpbin.org/get",
        Script::new()
            .want_timer(Duration::from_millis(25))
            .status(200)
            .header("HTTP/1.1 200 OK")
            .header("Content-Type: application/json")
            .body("{\"origin\": \"203.0.113.7\"}"),
    );
    book.stage(
        "https://httpbin.org/status/502",
        Script::failing(TransferError::HttpReturnedError),
    );

    let session = MultiSession::new(engine)?;
    let reactor = ReactorDriver::spawn(session)?;

    // Callback style: exactly one of the two closures fires
    let mut config = TransferConfig::new("https://httpbin.org/get")?;
    config.impersonate("chrome136", true)?;
    let first = Transfer::with_config(config);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let success_tx = tx.clone();
    let failure_tx = tx;
    let probe = first.clone();
    reactor
        .send(
            &first,
            move |_outcome| {
                let code = probe.response_code().unwrap_or(0);
                let _ = success_tx.send(format!("callback success, status {}", code));
            },
            move |error| {
                let _ = failure_tx.send(format!("callback failure: {}", error));
            },
        )
        .await?;
    if let Some(line) = rx.recv().await {
        println!("{}", line);
    }

    // Future style: await the completion directly
    let second = Transfer::with_config(TransferConfig::new("https://httpbin.org/status/502")?);
    let completion = reactor.submit(&second).await?;
    match completion.await {
        Ok(outcome) => println!("future resolved: {:?}", outcome),
        Err(error) => println!("future cancelled: {}", error),
    }

    reactor.close().await;
    reactor.join().await;
    Ok(())
}
