//! Cooperative shutdown signal shared by every suspension point

use crate::errors::{ControllerError, Result};
use std::time::Duration;
use tokio::sync::watch;

/// Create a linked trigger/listener pair
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Fires the shutdown signal
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signal every listener; idempotent
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Another listener attached to this trigger
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

/// Listener side, cheap to clone into tasks
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Listener that never fires
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // closed channel: wait() pends forever
        drop(tx);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is signalled. Pends forever if the trigger is
    /// dropped without firing.
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration` unless shutdown arrives first
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if self.is_triggered() {
            return Err(ControllerError::Cancelled);
        }
        let mut listener = self.clone();
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = listener.wait() => Err(ControllerError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let (_trigger, shutdown) = channel();
        assert!(shutdown.sleep(Duration::from_secs(60)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_cancelled() {
        let (trigger, shutdown) = channel();
        let handle = tokio::spawn(async move { shutdown.sleep(Duration::from_secs(3600)).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.trigger();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ControllerError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_triggered() {
        let (trigger, shutdown) = channel();
        trigger.trigger();
        assert!(shutdown.is_triggered());
        assert!(shutdown.sleep(Duration::from_millis(1)).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_does_not_fire() {
        let shutdown = Shutdown::never();
        assert!(!shutdown.is_triggered());
        assert!(shutdown.sleep(Duration::from_secs(5)).await.is_ok());
    }
}
