//! Deterministic stand-ins for the loader, output and timer.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::timer::{CancelToken, OneShotTimer, TimerTask};
use super::{AssetLoader, AudioOutput, ClipHandle, PlaybackHandle};

#[derive(Default)]
struct LoaderState {
    next: u64,
    auto: bool,
    never: HashSet<PathBuf>,
    paths: HashMap<ClipHandle, PathBuf>,
    loaded: HashSet<ClipHandle>,
    unloaded: Vec<ClipHandle>,
    polls: usize,
}

/// Loader whose clip data is just the path string.
#[derive(Clone, Default)]
pub struct MockLoader {
    state: Arc<Mutex<LoaderState>>,
}

impl MockLoader {
    /// Every clip reports Loaded on its first poll.
    pub fn instant() -> Self {
        let loader = Self::default();
        loader.state.lock().unwrap().auto = true;
        loader
    }

    /// Like `instant`, but `path` never finishes.
    pub fn instant_except(path: &str) -> Self {
        let loader = Self::instant();
        loader.state.lock().unwrap().never.insert(PathBuf::from(path));
        loader
    }

    /// Nothing loads until the test says so.
    pub fn manual() -> Self {
        Self::default()
    }

    pub fn complete_all(&self) {
        let mut state = self.state.lock().unwrap();
        let handles: Vec<ClipHandle> = state.paths.keys().copied().collect();
        state.loaded.extend(handles);
    }

    pub fn complete_matching(&self, prefix: &str) {
        let mut state = self.state.lock().unwrap();
        let handles: Vec<ClipHandle> = state
            .paths
            .iter()
            .filter(|(_, p)| p.to_string_lossy().starts_with(prefix))
            .map(|(h, _)| *h)
            .collect();
        state.loaded.extend(handles);
    }

    pub fn polls(&self) -> usize {
        self.state.lock().unwrap().polls
    }

    pub fn unloaded(&self) -> Vec<ClipHandle> {
        self.state.lock().unwrap().unloaded.clone()
    }
}

impl AssetLoader for MockLoader {
    type Data = String;

    fn load(&mut self, path: &Path) -> ClipHandle {
        let mut state = self.state.lock().unwrap();
        state.next += 1;
        let handle = ClipHandle(state.next);
        state.paths.insert(handle, path.to_path_buf());
        handle
    }

    fn is_loaded(&mut self, handle: ClipHandle) -> bool {
        let mut state = self.state.lock().unwrap();
        state.polls += 1;
        let stuck = state.paths.get(&handle).map_or(true, |p| state.never.contains(p));
        if state.auto && !stuck {
            state.loaded.insert(handle);
        }
        state.loaded.contains(&handle)
    }

    fn get(&self, handle: ClipHandle) -> Option<String> {
        let state = self.state.lock().unwrap();
        if !state.loaded.contains(&handle) {
            return None;
        }
        state.paths.get(&handle).map(|p| p.to_string_lossy().into_owned())
    }

    fn unload(&mut self, handle: ClipHandle) {
        let mut state = self.state.lock().unwrap();
        state.loaded.remove(&handle);
        state.unloaded.push(handle);
    }
}

#[derive(Default)]
struct OutputState {
    next: u64,
    plays: Vec<String>,
    live: HashMap<PlaybackHandle, String>,
    stopped: Vec<PlaybackHandle>,
}

/// Output that records every call instead of making sound.
#[derive(Clone, Default)]
pub struct RecordingOutput {
    state: Arc<Mutex<OutputState>>,
}

impl RecordingOutput {
    pub fn plays(&self) -> Vec<String> {
        self.state.lock().unwrap().plays.clone()
    }

    pub fn play_count(&self) -> usize {
        self.state.lock().unwrap().plays.len()
    }

    /// Playbacks started and not yet released.
    pub fn live_count(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn stopped(&self) -> Vec<PlaybackHandle> {
        self.state.lock().unwrap().stopped.clone()
    }
}

impl AudioOutput for RecordingOutput {
    type Data = String;

    fn play(&mut self, clip: &String) -> PlaybackHandle {
        let mut state = self.state.lock().unwrap();
        state.next += 1;
        let handle = PlaybackHandle(state.next);
        state.plays.push(clip.clone());
        state.live.insert(handle, clip.clone());
        handle
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        self.state.lock().unwrap().stopped.push(handle);
    }

    fn release(&mut self, handle: PlaybackHandle) {
        self.state.lock().unwrap().live.remove(&handle);
    }
}

struct Pending {
    due: f64,
    cancelled: Arc<AtomicBool>,
    task: TimerTask,
}

#[derive(Default)]
struct TimerState {
    now: f64,
    pending: Vec<Pending>,
    fired: usize,
}

/// Timer driven by simulated time; tasks run inside `advance`.
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<TimerState>>,
}

impl ManualTimer {
    pub fn advance(&self, dt: f64) {
        let due: Vec<Pending> = {
            let mut state = self.state.lock().unwrap();
            state.now += dt;
            let now = state.now;
            let (due, rest): (Vec<Pending>, Vec<Pending>) =
                state.pending.drain(..).partition(|p| p.due <= now);
            state.pending = rest;
            due
        };
        for pending in due {
            if !pending.cancelled.load(Ordering::SeqCst) {
                (pending.task)();
                self.state.lock().unwrap().fired += 1;
            }
        }
    }

    pub fn fired(&self) -> usize {
        self.state.lock().unwrap().fired
    }
}

impl OneShotTimer for ManualTimer {
    fn schedule_once(&mut self, delay: Duration, task: TimerTask) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock().unwrap();
        let due = state.now + delay.as_secs_f64();
        state.pending.push(Pending {
            due,
            cancelled: Arc::clone(&cancelled),
            task,
        });
        CancelToken::new(cancelled, None)
    }
}
