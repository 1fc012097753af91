//! Load-completion tracking.
//!
//! A render session is Loading until every style fetch it started has
//! settled, then Loaded for the rest of its life. The transition happens on
//! the decrement that brings the outstanding-style count to zero while the
//! document root has been marked as loading, and it happens exactly once:
//! styles requested after the signal has fired are still fetched and cached
//! but never re-arm it.

use std::sync::Mutex;
use tokio::sync::watch;

struct TrackerState {
    pending_styles: usize,
    root_started: bool,
    fired: bool,
}

/// Counts outstanding style fetches and latches the session's "fully
/// loaded" signal.
pub struct LoadTracker {
    state: Mutex<TrackerState>,
    loaded_tx: watch::Sender<bool>,
}

impl LoadTracker {
    pub fn new() -> Self {
        let (loaded_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(TrackerState {
                pending_styles: 0,
                root_started: false,
                fired: false,
            }),
            loaded_tx,
        }
    }

    /// Records that the document root has begun loading.
    ///
    /// This never fires the signal by itself; only a style settling can.
    /// Checking here would fire before the first style request of the very
    /// render that marked the root.
    pub fn mark_root_started(&self) {
        self.state.lock().unwrap().root_started = true;
    }

    /// Records a newly started style fetch.
    pub fn style_started(&self) {
        self.state.lock().unwrap().pending_styles += 1;
    }

    /// Records a settled style fetch, success or failure.
    ///
    /// Returns `true` when this settlement fired the signal, i.e. it brought
    /// the count to zero with the root marked and the signal not yet fired.
    pub fn style_settled(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.pending_styles > 0, "style settled without a matching start");
        state.pending_styles = state.pending_styles.saturating_sub(1);

        if state.pending_styles == 0 && state.root_started && !state.fired {
            state.fired = true;
            drop(state);
            self.loaded_tx.send_replace(true);
            return true;
        }
        false
    }

    pub fn pending_styles(&self) -> usize {
        self.state.lock().unwrap().pending_styles
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().unwrap().fired
    }

    /// A watch receiver that flips to `true` when the signal fires.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.loaded_tx.subscribe()
    }
}

impl Default for LoadTracker {
    fn default() -> Self {
        Self::new()
    }
}
