use std::future::pending;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Cooperative cancellation signal accepted by every pipeline stage.
///
/// Fires when its [`CancelHandle`] is triggered or when its deadline passes,
/// whichever comes first. Cloning shares the same signal.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Trigger side of a [`Cancellation`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Cancellation {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx },
            Self {
                signal: Some(rx),
                deadline: None,
            },
        )
    }

    /// A signal that fires once `timeout` has elapsed from now.
    pub fn after(timeout: Duration) -> Self {
        Self::never().with_timeout(timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        let triggered = self.signal.as_ref().map_or(false, |rx| *rx.borrow());
        let expired = self.deadline.map_or(false, |at| Instant::now() >= at);
        triggered || expired
    }

    /// Resolves once the signal fires. Pending forever for [`Cancellation::never`].
    pub async fn cancelled(&self) {
        let deadline = async {
            match self.deadline {
                Some(at) => sleep_until(at).await,
                None => pending().await,
            }
        };
        let triggered = async {
            let mut rx = match &self.signal {
                Some(rx) => rx.clone(),
                None => return pending().await,
            };
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Handle dropped without cancelling.
                    return pending().await;
                }
            }
        };
        tokio::select! {
            _ = deadline => {}
            _ = triggered => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn handle_fires_waiters() {
        let (handle, cancel) = Cancellation::new();
        let waiter = tokio::spawn({
            let cancel = cancel.clone();
            async move { cancel.cancelled().await }
        });
        assert!(!cancel.is_cancelled());
        handle.cancel();
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn deadline_fires() {
        let cancel = Cancellation::after(Duration::from_millis(20));
        timeout(Duration::from_secs(1), cancel.cancelled())
            .await
            .expect("deadline should fire");
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn never_stays_pending() {
        let cancel = Cancellation::never();
        assert!(timeout(Duration::from_millis(30), cancel.cancelled())
            .await
            .is_err());

        let (handle, cancel) = Cancellation::new();
        drop(handle);
        assert!(timeout(Duration::from_millis(30), cancel.cancelled())
            .await
            .is_err());
    }
}
