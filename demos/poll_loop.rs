//! Multi-transfer polling loop example.
//!
//! Mirrors the classic multi-handle pattern: attach several transfers, then
//! loop perform/info_read/wait until everything has finished. Runs against
//! the scripted engine so it works offline.

use std::time::Duration;

use mimicnet::engine::{Script, ScriptedEngine};
use mimicnet::multi::MultiSession;
use mimicnet::transfer::{Transfer, TransferConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Stage deterministic responses; a native engine would hit the network
    let engine = ScriptedEngine::new();
    let book = engine.book();
    book.stage(
        "https://httpbin.org/get",
        Script::new()
            .want_timer(Duration::from_millis(20))
            .status(200)
            .header("HTTP/1.1 200 OK")
            .header("Content-Type: application/json")
            .body("{\"url\": \"https://httpbin.org/get\"}"),
    );
    book.stage(
        "https://httpbin.org/uuid",
        Script::new()
            .want_timer(Duration::from_millis(35))
            .status(200)
            .header("HTTP/1.1 200 OK")
            .body("{\"uuid\": \"9b1deb4d-3b7d-4bad-9bdd-2b0d7b3dcb6d\"}"),
    );

    let mut session = MultiSession::new(engine)?;

    // Configure two browser-shaped transfers
    let mut transfers = Vec::new();
    for url in ["https://httpbin.org/get", "https://httpbin.org/uuid"] {
        let mut config = TransferConfig::new(url)?;
        config.impersonate("chrome136", true)?;
        config.set_verify_tls(false);
        config.set_timeout(Some(Duration::from_secs(30)));
        let transfer = Transfer::with_config(config);
        session.add_handle(&transfer)?;
        transfers.push(transfer);
    }

    println!("Driving {} transfers...", transfers.len());

    // The classic drive loop: perform, drain completions, wait for activity
    loop {
        let remaining = session.perform()?;
        while let Some(message) = session.info_read() {
            println!("transfer {} finished: {:?}", message.id, message.outcome);
        }
        if remaining == 0 {
            break;
        }
        session.wait(Duration::from_millis(200))?;
    }

    for transfer in &transfers {
        println!();
        println!("status: {}", transfer.response_code()?);
        println!(
            "body:   {}",
            String::from_utf8_lossy(&transfer.body_bytes()?)
        );
        session.remove_handle(transfer)?;
    }
    session.close();

    Ok(())
}
