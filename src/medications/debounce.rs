use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Autocomplete wait after the last keystroke.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Latest-wins debouncer for lookups driven by typing.
///
/// Each `submit` supersedes every earlier one. A submission only runs if
/// nothing newer arrives within the window, and its output is dropped if
/// something newer arrived while it was running.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    generation: Arc<AtomicU64>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// `None` when superseded.
    pub async fn submit<F, Fut, T>(&self, work: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.window).await;
        if !self.is_current(ticket) {
            return None;
        }
        let output = work().await;
        self.is_current(ticket).then_some(output)
    }

    /// Drop any pending submission.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }
}
