//! Schedule-once callbacks with a cancellation token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::warn;

pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Armed timer. Dropping the token cancels the task as well.
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    wake: Option<Sender<()>>,
}

impl CancelToken {
    pub fn new(cancelled: Arc<AtomicBool>, wake: Option<Sender<()>>) -> Self {
        Self { cancelled, wake }
    }

    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(wake) = self.wake.take() {
            // timer thread may already have fired and exited
            let _ = wake.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for CancelToken {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub trait OneShotTimer {
    /// Run `task` once after `delay` unless the returned token is cancelled first.
    fn schedule_once(&mut self, delay: Duration, task: TimerTask) -> CancelToken;
}

/// One sleeper thread per armed timer; cancellation wakes it early.
#[derive(Debug, Default)]
pub struct ThreadTimer;

impl OneShotTimer for ThreadTimer {
    fn schedule_once(&mut self, delay: Duration, task: TimerTask) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = bounded::<()>(1);
        let flag = Arc::clone(&cancelled);

        let spawned = thread::Builder::new()
            .name("loop-window-timer".into())
            .spawn(move || {
                // any message or a dropped sender means cancel
                if let Err(RecvTimeoutError::Timeout) = wake_rx.recv_timeout(delay) {
                    if !flag.load(Ordering::SeqCst) {
                        task();
                    }
                }
            });
        if let Err(err) = spawned {
            warn!("could not spawn window timer thread: {err}");
        }

        CancelToken::new(cancelled, Some(wake_tx))
    }
}
