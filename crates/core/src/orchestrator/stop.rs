//! Cooperative stop signalling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Requests a running harvest to stop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// Observes stop requests.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Clear a stop request once the run it ended has returned.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stopped| *stopped).await.is_err() {
            // Sender gone: nobody can ask us to stop any more
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration`. Returns `false` if a stop cut the sleep short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.stopped() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_wakes_sleepers() {
        let (handle, signal) = stop_channel();
        assert!(!signal.is_stopped());

        let sleeper = tokio::spawn({
            let signal = signal.clone();
            async move { signal.sleep(Duration::from_secs(60)).await }
        });
        tokio::task::yield_now().await;
        handle.stop();

        let completed = tokio::time::timeout(Duration::from_secs(5), sleeper)
            .await
            .unwrap()
            .unwrap();
        assert!(!completed);
        assert!(signal.is_stopped());
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_sleep_completes_without_stop() {
        let (_handle, signal) = stop_channel();
        assert!(signal.sleep(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_reset_and_subscribe() {
        let (handle, _signal) = stop_channel();
        handle.stop();
        handle.reset();
        let fresh = handle.signal();
        assert!(!fresh.is_stopped());
    }
}
