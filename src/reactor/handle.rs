//! Caller-side front end of the reactor.
//!
//! A [`ReactorHandle`] is a cheap clone over the driver's command channel.
//! Any number of tasks can add, remove, or submit transfers concurrently;
//! the driver serializes them against its session.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::base::multierror::MultiError;
use crate::base::transfererror::TransferError;
use crate::base::transferstate::TransferOutcome;
use crate::multi::CompletionFuture;
use crate::reactor::driver::Command;
use crate::transfer::Transfer;

/// Cloneable front end over a running [`ReactorDriver`](crate::reactor::ReactorDriver).
#[derive(Clone)]
pub struct ReactorHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ReactorHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>, task: JoinHandle<()>) -> Self {
        Self {
            commands,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Attach a configured transfer; the reactor starts it on its next tick.
    pub async fn add(&self, transfer: &Transfer) -> Result<(), MultiError> {
        let transfer = transfer.clone();
        self.round_trip(|ack| Command::Add { transfer, ack }).await?
    }

    /// Detach a transfer, aborting it if still running. A pending
    /// [`submit`](Self::submit) future resolves to [`MultiError::Cancelled`];
    /// a pending [`send`](Self::send) fires neither callback.
    pub async fn remove(&self, transfer: &Transfer) -> Result<(), MultiError> {
        let transfer = transfer.clone();
        self.round_trip(|ack| Command::Remove { transfer, ack })
            .await?
    }

    /// Attach (if needed) and reserve the transfer's completion, returning a
    /// future that resolves to the outcome exactly once.
    pub async fn submit(&self, transfer: &Transfer) -> Result<CompletionFuture, MultiError> {
        let transfer = transfer.clone();
        self.round_trip(|ack| Command::Submit { transfer, ack })
            .await?
    }

    /// Submit the transfer and dispatch its completion to a callback pair.
    ///
    /// Exactly one of the two callbacks fires, exactly once, and only after
    /// the transfer has finished. A transfer removed before finishing fires
    /// neither.
    pub async fn send<S, E>(
        &self,
        transfer: &Transfer,
        on_success: S,
        on_error: E,
    ) -> Result<(), MultiError>
    where
        S: FnOnce(TransferOutcome) + Send + 'static,
        E: FnOnce(TransferError) + Send + 'static,
    {
        let completion = self.submit(transfer).await?;
        tokio::spawn(async move {
            match completion.await {
                Ok(TransferOutcome::Success) => on_success(TransferOutcome::Success),
                Ok(TransferOutcome::Failure(error)) => on_error(error),
                // Removed before finishing: neither callback fires.
                Err(_) => {}
            }
        });
        Ok(())
    }

    /// Close the session and stop the driver. Safe to call twice; the second
    /// call is a no-op.
    pub async fn close(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Close { ack }).is_ok() {
            let _ = done.await;
        }
    }

    /// Wait for the driver task to finish. Returns immediately if another
    /// clone already joined it.
    pub async fn join(&self) {
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }

    async fn round_trip<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, MultiError> {
        let (ack, response) = oneshot::channel();
        self.commands
            .send(command(ack))
            .map_err(|_| MultiError::SessionClosed)?;
        response.await.map_err(|_| MultiError::SessionClosed)
    }
}
