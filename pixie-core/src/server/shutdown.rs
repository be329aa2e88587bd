//! Termination signal shared between a running `serve` call, its worker task
//! and any number of shutdown callers.
use anyhow::Result;
use tokio::sync::mpsc;

use std::sync::{Arc, Mutex, PoisonError};

/// Writers that may race on one termination signal: the serving task and a
/// shutdown caller. Only the first value is ever read.
pub(crate) const TERMINATION_WRITERS: usize = 2;

pub(crate) type TerminationTx = mpsc::Sender<Result<()>>;
pub(crate) type TerminationRx = mpsc::Receiver<Result<()>>;

/// Create the termination signal for one `serve` call
pub(crate) fn termination() -> (TerminationTx, TerminationRx) {
    mpsc::channel(TERMINATION_WRITERS)
}

/// Cooperative, non-blocking shutdown for a [`Server`].
///
/// Cheap to clone and safe to use from any task or thread. Calling
/// [`ShutdownHandle::shutdown`] while no `serve` call is active does nothing.
///
/// [`Server`]: crate::server::Server
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    slot: Arc<Mutex<Option<TerminationTx>>>,
}

impl ShutdownHandle {
    /// Ask the active `serve` call to return `Ok(())`. Never blocks; if there
    /// is no active call, or it is already terminating, this is a no-op.
    pub fn shutdown(&self) {
        if let Some(tx) = self.lock().as_ref() {
            // full or closed means someone else already ended this serve call
            let _ = tx.try_send(Ok(()));
        }
    }

    /// is a `serve` call currently listening for termination?
    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    pub(crate) fn arm(&self, tx: TerminationTx) {
        self.lock().replace(tx);
    }

    pub(crate) fn disarm(&self) {
        self.lock().take();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<TerminationTx>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unarmed_shutdown_is_noop() {
        let handle = ShutdownHandle::default();
        handle.shutdown();
        handle.shutdown();
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn first_writer_wins() {
        let handle = ShutdownHandle::default();
        let (tx, mut rx) = termination();
        handle.arm(tx.clone());
        let _ = tx.try_send(Err(anyhow::anyhow!("socket closed")));
        handle.shutdown();
        handle.shutdown();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.unwrap_err().to_string(), "socket closed");
    }

    #[tokio::test]
    async fn disarm_drops_sender() {
        let handle = ShutdownHandle::default();
        let (tx, mut rx) = termination();
        handle.arm(tx);
        handle.disarm();
        handle.shutdown();
        assert!(rx.recv().await.is_none());
    }
}
