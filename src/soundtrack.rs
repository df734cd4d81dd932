//! The mood tracker and loop scheduler wired together for one session.

use std::path::PathBuf;

use log::info;

use crate::audio::{
    scan_loop_dir, AssetLoader, AudioOutput, LoopPool, LoopScheduler, OneShotTimer, SchedulerPhase,
};
use crate::config::Config;
use crate::events::{EventBus, EventKind};
use crate::mood::IntensityTracker;

pub struct Soundtrack<L, O>
where
    L: AssetLoader,
    O: AudioOutput<Data = L::Data>,
{
    mood: IntensityTracker,
    scheduler: LoopScheduler<L, O>,
}

impl<L, O> Soundtrack<L, O>
where
    L: AssetLoader,
    O: AudioOutput<Data = L::Data>,
{
    /// Scan `config.loop_dir` for optional loops and register everything.
    pub fn new(config: &Config, loader: L, output: O, timer: Box<dyn OneShotTimer>) -> Self {
        info!("music loops loading from {}", config.loop_dir.display());
        let optional = scan_loop_dir(&config.loop_dir);
        Self::with_catalog(config, &optional, loader, output, timer)
    }

    /// Like [`new`](Self::new) with an explicit optional loop list.
    pub fn with_catalog(
        config: &Config,
        optional: &[PathBuf],
        loader: L,
        output: O,
        timer: Box<dyn OneShotTimer>,
    ) -> Self {
        let mut scheduler =
            LoopScheduler::new(&config.scheduler, LoopPool::new(config.seed), loader, output, timer);
        scheduler.register_catalog(&config.constant_loops, optional);
        Self {
            mood: IntensityTracker::new(&config.mood),
            scheduler,
        }
    }

    pub fn subscribe_to(&mut self, bus: &mut dyn EventBus) {
        self.mood.subscribe_to(bus);
    }

    pub fn on_event(&mut self, kind: EventKind) {
        self.mood.on_event(kind);
    }

    /// Once per frame: decay the mood, then drive the loop window.
    pub fn tick(&mut self, dt: f64) {
        self.mood.tick(dt);
        self.scheduler.tick(dt, &self.mood);
    }

    pub fn start(&mut self) {
        self.scheduler.start();
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn dispose(&mut self) {
        self.scheduler.dispose();
    }

    pub fn intensity(&self) -> u32 {
        self.mood.score()
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.scheduler.phase()
    }

    pub fn scheduler(&self) -> &LoopScheduler<L, O> {
        &self.scheduler
    }
}
