use std::time::Duration;
use tokio::task::JoinHandle;

/// A one-shot timer that is aborted, not just ignored, when cancelled.
#[derive(Debug, Default)]
pub(crate) struct Watchdog {
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Run `fire` after `after`, replacing any timer already armed.
    pub fn arm<F>(&mut self, after: Duration, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            fire();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}
