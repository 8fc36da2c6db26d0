//! Debounce bookkeeping for `input`-kind triggers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Per-script debounce state: a generation counter shared with in-flight
/// runs and the cancellation handle of the newest window.
///
/// The generation starts at zero and only moves when the query actually
/// changes, so nothing is pending before the user types.
#[derive(Debug, Default)]
pub(super) struct DebounceState {
    generation: Arc<AtomicU64>,
    cancel: Option<CancellationToken>,
}

impl DebounceState {
    /// Open a new window: cancel the previous run (pending or already
    /// executing) and hand back the fresh token plus its generation.
    pub(super) fn restart(&mut self, shutdown: &CancellationToken) -> (CancellationToken, u64) {
        if let Some(previous) = self.cancel.take() {
            previous.cancel();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = shutdown.child_token();
        self.cancel = Some(token.clone());
        (token, generation)
    }

    /// Handle shared with apply closures; a result whose generation no
    /// longer matches is discarded instead of applied.
    pub(super) fn generation_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_bumps_generation() {
        let shutdown = CancellationToken::new();
        let mut state = DebounceState::default();

        let (_, first) = state.restart(&shutdown);
        let (_, second) = state.restart(&shutdown);

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(state.generation_handle().load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_restart_cancels_previous_window() {
        let shutdown = CancellationToken::new();
        let mut state = DebounceState::default();

        let (first_token, _) = state.restart(&shutdown);
        assert!(!first_token.is_cancelled());

        let (second_token, _) = state.restart(&shutdown);
        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
    }

    #[test]
    fn test_shutdown_cancels_open_window() {
        let shutdown = CancellationToken::new();
        let mut state = DebounceState::default();

        let (token, _) = state.restart(&shutdown);
        shutdown.cancel();
        assert!(token.is_cancelled());
    }
}
