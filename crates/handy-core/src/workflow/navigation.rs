//! Delayed, cancellable navigations.
//!
//! A workflow never navigates by itself. It hands out a
//! [`ScheduledNavigation`] and the host decides how to honor it: await it
//! inline, or spawn it onto a [`Navigator`]. Cancelling the owning workflow
//! (unmount) turns any pending navigation into a no-op.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where to go and how long to wait first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub target: String,
    pub delay: Duration,
}

impl Navigation {
    pub fn new(target: impl Into<String>, delay: Duration) -> Self {
        Self {
            target: target.into(),
            delay,
        }
    }

    pub fn immediate(target: impl Into<String>) -> Self {
        Self::new(target, Duration::ZERO)
    }
}

/// Receives navigations that actually fire.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

/// A navigation bound to a cancellation token.
#[derive(Debug, Clone)]
pub struct ScheduledNavigation {
    navigation: Navigation,
    token: CancellationToken,
}

impl ScheduledNavigation {
    pub fn new(navigation: Navigation, token: CancellationToken) -> Self {
        Self { navigation, token }
    }

    pub fn target(&self) -> &str {
        &self.navigation.target
    }

    pub fn delay(&self) -> Duration {
        self.navigation.delay
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits out the delay. Returns the target, or `None` if cancelled
    /// before (or at) the deadline.
    pub async fn wait(&self) -> Option<String> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            () = tokio::time::sleep(self.navigation.delay) => {
                (!self.token.is_cancelled()).then(|| self.navigation.target.clone())
            }
        }
    }

    /// Like [`wait`](Self::wait) but skips the delay.
    pub fn fire_now(&self) -> Option<String> {
        (!self.token.is_cancelled()).then(|| self.navigation.target.clone())
    }

    /// Runs the navigation in the background. The handle resolves to
    /// whether the navigator was called.
    pub fn spawn(self, navigator: Arc<dyn Navigator>) -> JoinHandle<bool> {
        tokio::spawn(async move {
            match self.wait().await {
                Some(target) => {
                    tracing::debug!(to = %target, "navigating");
                    navigator.navigate(&target);
                    true
                }
                None => {
                    tracing::debug!(to = %self.navigation.target, "navigation cancelled");
                    false
                }
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::Navigator;

    /// Records every target it is asked to visit.
    #[derive(Debug, Default)]
    pub struct RecordingNavigator {
        pub visited: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        pub fn visited(&self) -> Vec<String> {
            self.visited.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, target: &str) {
            self.visited.lock().unwrap().push(target.to_string());
        }
    }
}
