//! Caller-driven cancellation
//!
//! A `CancelHandle` flips a watch channel; every `CancelSignal` cloned from it
//! observes the flip. Backends race their HTTP call against the signal.

use std::future::Future;

use tokio::sync::watch;

use crate::LlmError;

/// Create a connected handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Owner side; call [`CancelHandle::cancel`] to abort in-flight requests
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // Receivers may all be gone already
        let _ = self.tx.send(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observer side, carried on each request
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle is dropped first.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless the signal fires first
    pub async fn guard<T, F>(&self, fut: F) -> Result<T, LlmError>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        if self.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(LlmError::Cancelled),
            result = fut => result,
        }
    }
}

/// Await `fut`, honouring an optional signal
pub async fn run_cancellable<T, F>(signal: Option<&CancelSignal>, fut: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match signal {
        Some(signal) => signal.guard(fut).await,
        None => fut.await,
    }
}
