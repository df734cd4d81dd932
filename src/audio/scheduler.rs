//! Window-based loop scheduler.
//!
//! Every loop is exactly one window long and never repeats by itself, so at each
//! window boundary the scheduler re-triggers the constant layers plus whatever
//! optional loops are active. Inside a window it moves through
//!
//! ```text
//! AwaitingLoad ─(all optional clips loaded)─> ActivePlaying
//! ActivePlaying ─(prep_fraction·D)─> Prepped ─(schedule_fraction·D)─> Scheduled
//! Scheduled ─(timer fires at D)─> commit ─> ActivePlaying
//! ```
//!
//! The window-end timer runs on its own thread. It never touches scheduler
//! state: it posts the window number on a channel and the next `tick` performs
//! the commit, so ticks and commits are serialized on the frame thread. A stale
//! or duplicate message is ignored because each commit bumps the window number.

use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, trace, warn};

use super::pool::{ClipId, ClipRole, LoopPool};
use super::timer::{CancelToken, OneShotTimer};
use super::{AssetLoader, AudioOutput};
use crate::config::{SchedulerConfig, SizingBasis};
use crate::mood::IntensityTracker;

/// How long past the window end the tick waits for the timer before committing itself.
pub const TIMER_OVERDUE_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    AwaitingLoad,
    ActivePlaying,
    Prepped,
    Scheduled,
}

/// Start of the current window on the session clock, plus the shared loop length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowClock {
    start: f64,
    duration: f64,
}

impl WindowClock {
    pub fn new(duration: f64) -> Self {
        Self { start: 0.0, duration }
    }

    pub fn restart(&mut self, now: f64) {
        self.start = now;
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.start).max(0.0)
    }

    pub fn remaining(&self, now: f64) -> f64 {
        (self.duration - self.elapsed(now)).max(0.0)
    }
}

pub struct LoopScheduler<L, O>
where
    L: AssetLoader,
    O: AudioOutput<Data = L::Data>,
{
    config: SchedulerConfig,
    pool: LoopPool,
    loader: L,
    output: O,
    timer: Box<dyn OneShotTimer>,
    phase: SchedulerPhase,
    clock: WindowClock,
    now: f64,
    running: bool,
    disposed: bool,
    /// Started, but the constant layers are not loaded yet.
    awaiting_open: bool,
    last_poll: Option<f64>,
    window: u64,
    armed: Option<CancelToken>,
    commit_tx: Sender<u64>,
    commit_rx: Receiver<u64>,
    /// Optional clips added to `active` since the last commit.
    fresh: Vec<ClipId>,
    last_pick: Option<ClipId>,
    commits: u64,
}

impl<L, O> LoopScheduler<L, O>
where
    L: AssetLoader,
    O: AudioOutput<Data = L::Data>,
{
    pub fn new(
        config: &SchedulerConfig,
        pool: LoopPool,
        loader: L,
        output: O,
        timer: Box<dyn OneShotTimer>,
    ) -> Self {
        let (commit_tx, commit_rx) = unbounded();
        Self {
            config: config.clone(),
            pool,
            loader,
            output,
            timer,
            phase: SchedulerPhase::AwaitingLoad,
            clock: WindowClock::new(config.loop_duration_secs),
            now: 0.0,
            running: false,
            disposed: false,
            awaiting_open: false,
            last_poll: None,
            window: 0,
            armed: None,
            commit_tx,
            commit_rx,
            fresh: Vec::new(),
            last_pick: None,
            commits: 0,
        }
    }

    /// Register a clip and ask the loader for it right away.
    pub fn register(&mut self, path: &Path, role: ClipRole) -> ClipId {
        let id = self.pool.register_clip(path, role);
        let handle = self.loader.load(path);
        self.pool.mark_loading(id, handle, self.now);
        trace!("loading {}", path.display());
        id
    }

    /// Register the constant layers and the optional loop catalog.
    pub fn register_catalog<P: AsRef<Path>>(&mut self, constant: &[P], optional: &[P]) {
        for path in constant {
            self.register(path.as_ref(), ClipRole::Constant);
        }
        for path in optional {
            self.register(path.as_ref(), ClipRole::Optional);
        }
        if optional.is_empty() {
            warn!("no optional music loops registered; only constant loops will play");
        } else {
            info!("{} music loops loading", optional.len());
        }
    }

    /// Play the constant layers and open the first window. If they are still
    /// loading, the window opens on the tick that finds them ready.
    pub fn start(&mut self) {
        if self.disposed || self.running {
            return;
        }
        self.running = true;
        self.window += 1;
        self.poll_loading();
        if self.pool.constants_settled() {
            self.open_window();
        } else {
            self.awaiting_open = true;
        }
        info!("music started");
    }

    fn open_window(&mut self) {
        self.awaiting_open = false;
        self.replay_constants();
        if self.phase != SchedulerPhase::AwaitingLoad {
            // resumed after stop(): bring back what was audible, not the queued additions
            self.replay_audible();
        }
        self.clock.restart(self.now);
    }

    /// Scene change: silence everything but keep clips and the queued plan.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.cancel_timer();
        self.halt_playback();
        self.running = false;
        if self.phase == SchedulerPhase::Scheduled {
            self.phase = SchedulerPhase::Prepped;
        }
        info!("music stopped");
    }

    /// Once per frame.
    pub fn tick(&mut self, dt: f64, mood: &IntensityTracker) {
        if !self.running {
            return;
        }
        self.now += dt.max(0.0);

        let fired: Vec<u64> = self.commit_rx.try_iter().collect();
        for window in fired {
            if window == self.window && self.phase == SchedulerPhase::Scheduled {
                self.commit();
            } else {
                trace!("ignoring stale window timer #{window}");
            }
        }

        self.poll_loading();

        if self.awaiting_open {
            if !self.pool.constants_settled() {
                return;
            }
            self.open_window();
        }

        if self.phase == SchedulerPhase::AwaitingLoad {
            if !self.pool.all_optional_loaded() {
                if self.clock.elapsed(self.now) >= self.clock.duration() {
                    self.commit_constants_only();
                }
                return;
            }
            info!("{} music loops loaded", self.pool.optional_count());
            self.phase = SchedulerPhase::ActivePlaying;
        }

        self.advance(mood);
    }

    fn advance(&mut self, mood: &IntensityTracker) {
        let elapsed = self.clock.elapsed(self.now);
        let duration = self.clock.duration();

        if self.phase == SchedulerPhase::ActivePlaying
            && elapsed >= duration * self.config.prep_fraction
        {
            self.enter_prepped(mood);
        }
        if self.phase == SchedulerPhase::Prepped
            && elapsed >= duration * self.config.schedule_fraction
        {
            self.enter_scheduled();
        }
        if self.phase == SchedulerPhase::Scheduled && elapsed >= duration + TIMER_OVERDUE_SECS {
            warn!("window timer overdue by {:.2}s; committing from tick", elapsed - duration);
            self.commit();
        }
    }

    /// Decide next window's loop set. Only acts when entered from `ActivePlaying`;
    /// returns whether anything ran.
    pub fn enter_prepped(&mut self, mood: &IntensityTracker) -> bool {
        if self.phase != SchedulerPhase::ActivePlaying {
            return false;
        }

        // one swap per window for variety, even when the count is unchanged
        if !self.pool.active().is_empty() && !self.pool.unused().is_empty() {
            if let Some(id) = self.pool.pick_random_active(&self.fresh) {
                self.pool.queue_removal(id);
                self.add_random_unused();
            }
        }

        let desired = self.desired_loops(mood);
        let current = self.pool.active().len();
        debug!("prepping next round of loops: current {current}, desired {desired}");

        if desired < current {
            for _ in 0..current - desired {
                let victim = self
                    .pool
                    .pick_random_active(&self.fresh)
                    .or_else(|| self.pool.pick_random_active(&[]));
                match victim {
                    Some(id) => {
                        self.pool.queue_removal(id);
                    }
                    None => break,
                }
            }
        } else if desired > current {
            let wanted = (desired - current).min(self.pool.unused().len());
            for _ in 0..wanted {
                if !self.add_random_unused() {
                    break;
                }
            }
        }

        self.phase = SchedulerPhase::Prepped;
        true
    }

    /// `scoreOutOf(basis) + 1`; a zero basis skips the score and yields 1.
    fn desired_loops(&self, mood: &IntensityTracker) -> usize {
        let basis = match self.config.sizing {
            SizingBasis::Active => self.pool.active().len(),
            SizingBasis::Pool => {
                self.pool.active().len() + self.pool.unused().len() + self.pool.pending_removal().len()
            }
        };
        if basis == 0 {
            return 1;
        }
        match mood.score_out_of(basis as i64) {
            Ok(level) => level.max(0) as usize + 1,
            Err(err) => {
                warn!("intensity scoring failed: {err}");
                1
            }
        }
    }

    fn add_random_unused(&mut self) -> bool {
        match self.pool.pick_random_unused(self.last_pick) {
            Some(id) if self.pool.queue_addition(id) => {
                self.fresh.push(id);
                self.last_pick = Some(id);
                true
            }
            _ => false,
        }
    }

    /// Arm the window-end timer. Only acts from `Prepped`.
    pub fn enter_scheduled(&mut self) -> bool {
        if self.phase != SchedulerPhase::Prepped {
            return false;
        }
        let delay = self.clock.remaining(self.now);
        let window = self.window;
        let tx = self.commit_tx.clone();
        debug!("scheduling next music loop in {delay:.2}s");
        let token = self.timer.schedule_once(
            Duration::from_secs_f64(delay),
            Box::new(move || {
                // scheduler dropped: nothing to commit
                let _ = tx.send(window);
            }),
        );
        self.armed = Some(token);
        self.phase = SchedulerPhase::Scheduled;
        true
    }

    /// Window boundary: replay constants, settle removals, re-trigger the active set.
    fn commit(&mut self) {
        self.cancel_timer();
        debug!("looping the loops (window #{})", self.window);

        self.replay_constants();
        for id in self.pool.commit_removals() {
            self.release_playback(id);
        }
        self.replay_active();

        self.fresh.clear();
        self.clock.restart(self.now);
        self.window += 1;
        self.commits += 1;
        self.phase = SchedulerPhase::ActivePlaying;
    }

    fn commit_constants_only(&mut self) {
        trace!("window boundary while loading; replaying constant loops");
        self.replay_constants();
        self.clock.restart(self.now);
        self.window += 1;
    }

    fn poll_loading(&mut self) {
        let awaiting = self.pool.awaiting();
        if awaiting.is_empty() {
            return;
        }
        if let Some(last) = self.last_poll {
            if self.now - last < self.config.load_grace_secs {
                return;
            }
        }
        self.last_poll = Some(self.now);

        for (id, handle) in awaiting {
            if self.loader.is_loaded(handle) {
                self.pool.on_load_complete(id);
                if let Some(clip) = self.pool.clip(id) {
                    debug!("sound @{} loaded", clip.path.display());
                }
                continue;
            }
            let Some(clip) = self.pool.clip(id) else {
                continue;
            };
            let waited = clip.requested_at.map(|t| self.now - t).unwrap_or(0.0);
            if waited >= self.config.load_timeout_secs {
                warn!(
                    "{} still not loaded after {waited:.1}s; leaving it out of the music pool",
                    clip.name()
                );
                self.pool.exclude(id);
            } else {
                trace!("loading {}", clip.name());
            }
        }
    }

    fn replay_constants(&mut self) {
        let constant = self.pool.constant().to_vec();
        for id in constant {
            self.trigger(id);
        }
    }

    fn replay_active(&mut self) {
        let active = self.pool.active().to_vec();
        for id in active {
            self.trigger(id);
        }
    }

    /// Clips that were sounding in the current window: committed actives and
    /// those queued for removal. Additions wait for the commit.
    fn replay_audible(&mut self) {
        let mut audible: Vec<ClipId> = self
            .pool
            .active()
            .iter()
            .copied()
            .filter(|id| !self.fresh.contains(id))
            .collect();
        audible.extend_from_slice(self.pool.pending_removal());
        for id in audible {
            self.trigger(id);
        }
    }

    /// (Re)start one clip. Clips whose data is not available are skipped quietly.
    fn trigger(&mut self, id: ClipId) {
        let Some(clip) = self.pool.clip(id) else {
            return;
        };
        if clip.disposed {
            return;
        }
        let Some(data) = clip.handle.and_then(|h| self.loader.get(h)) else {
            trace!("{} not ready; skipping this window", clip.name());
            return;
        };
        self.release_playback(id);
        let playback = self.output.play(&data);
        if let Some(clip) = self.pool.clip_mut(id) {
            clip.playback = Some(playback);
        }
    }

    fn release_playback(&mut self, id: ClipId) {
        if let Some(playback) = self.pool.clip_mut(id).and_then(|c| c.playback.take()) {
            self.output.release(playback);
        }
    }

    fn halt_playback(&mut self) {
        let ids: Vec<ClipId> = self.pool.clips().map(|c| c.id).collect();
        for id in ids {
            if let Some(playback) = self.pool.clip_mut(id).and_then(|c| c.playback.take()) {
                self.output.stop(playback);
                self.output.release(playback);
            }
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(mut token) = self.armed.take() {
            token.cancel();
        }
    }

    /// Session teardown. Timer first, then playbacks, then every clip's asset
    /// exactly once. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.cancel_timer();
        self.halt_playback();

        let ids: Vec<ClipId> = self.pool.clips().map(|c| c.id).collect();
        let mut released = 0;
        for id in ids {
            let Some(clip) = self.pool.clip_mut(id) else {
                continue;
            };
            if clip.disposed {
                continue;
            }
            clip.disposed = true;
            if let Some(handle) = clip.handle {
                self.loader.unload(handle);
                released += 1;
            }
        }
        self.running = false;
        self.disposed = true;
        info!("music disposed ({released} clips released)");
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn clock(&self) -> &WindowClock {
        &self.clock
    }

    /// Seconds into the current window.
    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed(self.now)
    }

    pub fn pool(&self) -> &LoopPool {
        &self.pool
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_timer_armed(&self) -> bool {
        self.armed.is_some()
    }
}
