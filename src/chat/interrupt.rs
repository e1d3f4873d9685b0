use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A cancellation signal shared between the Ctrl+C handler and a chat turn.
///
/// Triggering is sticky until [`Interrupt::reset`], so a signal that lands
/// between two polls is not lost.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Interrupt {
    /// Creates an untriggered interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal.  Safe to call from any thread, including signal handlers.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Returns true if the signal is raised.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Lower the signal.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Resolve once the signal is raised.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_returns_when_already_triggered() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        tokio::time::timeout(Duration::from_secs(1), interrupt.wait())
            .await
            .expect("wait should not block");
    }

    #[tokio::test]
    async fn wait_wakes_on_trigger_from_another_thread() {
        let interrupt = Interrupt::new();
        let remote = interrupt.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.trigger();
        });
        tokio::time::timeout(Duration::from_secs(5), interrupt.wait())
            .await
            .expect("trigger should wake the waiter");
        assert!(interrupt.is_triggered());
    }

    #[test]
    fn wait_pends_until_triggered() {
        let interrupt = Interrupt::new();
        let mut wait = tokio_test::task::spawn(interrupt.wait());
        tokio_test::assert_pending!(wait.poll());
        interrupt.trigger();
        assert!(wait.is_woken());
        tokio_test::assert_ready!(wait.poll());
    }

    #[test]
    fn reset_clears() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        interrupt.reset();
        assert!(!interrupt.is_triggered());
    }
}
