//! Keeps track of the game's current "feel" so the soundtrack can follow it.
//!
//! Intensity is boosted by gameplay events and bleeds away every frame.

use crossbeam_channel::{unbounded, Receiver};
use log::trace;

use crate::config::MoodConfig;
use crate::error::{MusicError, Result};
use crate::events::{EventBus, EventIntensityTable, EventKind};

/// Bounded, decaying action score in `0..=max_intensity`.
pub struct IntensityTracker {
    score: u32,
    max_intensity: u32,
    min_decay: u32,
    decay_divisor: u32,
    table: EventIntensityTable,
    inbox: Option<Receiver<EventKind>>,
}

impl IntensityTracker {
    pub fn new(config: &MoodConfig) -> Self {
        Self {
            score: 0,
            max_intensity: config.max_intensity.max(1),
            min_decay: config.min_decay.max(1),
            decay_divisor: config.decay_divisor.max(1),
            table: config.events.clone(),
            inbox: None,
        }
    }

    /// Register the tracker's single handler on `bus`. Events are queued and
    /// applied, in emission order, at the start of the next [`tick`](Self::tick).
    pub fn subscribe_to(&mut self, bus: &mut dyn EventBus) {
        let (tx, rx) = unbounded();
        bus.subscribe(Box::new(move |kind| {
            // receiver gone means the tracker was dropped; nothing left to feed
            let _ = tx.send(kind);
        }));
        self.inbox = Some(rx);
    }

    pub fn on_event(&mut self, kind: EventKind) {
        if let Some(delta) = self.table.delta(kind) {
            self.score = self.score.saturating_add(delta).min(self.max_intensity);
            trace!("{} +{delta} -> intensity {}", kind.name(), self.score);
        }
    }

    /// Once per frame: fold queued events in, then decay. Decay is one step per
    /// call regardless of `_dt`, so the fall-off rate follows the frame rate.
    pub fn tick(&mut self, _dt: f64) {
        self.drain_inbox();
        if self.score < 1 {
            self.score = 0;
        } else {
            self.score = self.score.saturating_sub(self.decay_step());
        }
    }

    /// Amount the next decay tick will remove.
    pub fn decay_step(&self) -> u32 {
        self.min_decay.max(self.score / self.decay_divisor)
    }

    /// Score scaled to `0..=subdivisions`, rounded to nearest.
    pub fn score_out_of(&self, subdivisions: i64) -> Result<i64> {
        if subdivisions <= 0 {
            return Err(MusicError::InvalidArgument(format!(
                "subdivisions must be positive, got {subdivisions}"
            )));
        }
        let scaled = (self.score as f64 / self.max_intensity as f64 * subdivisions as f64).round();
        Ok((scaled as i64).clamp(0, subdivisions))
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn max_intensity(&self) -> u32 {
        self.max_intensity
    }

    fn drain_inbox(&mut self) {
        let Some(inbox) = self.inbox.take() else {
            return;
        };
        for kind in inbox.try_iter() {
            self.on_event(kind);
        }
        self.inbox = Some(inbox);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LocalEventBus;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const FRAME: f64 = 1.0 / 60.0;

    fn config(max: u32, min_decay: u32, divisor: u32) -> MoodConfig {
        MoodConfig {
            max_intensity: max,
            min_decay,
            decay_divisor: divisor,
            events: EventIntensityTable::empty()
                .with(EventKind::PlayerShoot, 5)
                .with(EventKind::PlayerHit, 300)
                .with(EventKind::EnemyKillSpecial, 900),
        }
    }

    #[test]
    fn three_shots_then_one_decay_tick() {
        let cfg = config(1000, 1, 10);
        let mut mood = IntensityTracker::new(&cfg);
        for _ in 0..3 {
            mood.on_event(EventKind::PlayerShoot);
        }
        assert_eq!(mood.score(), 15);

        mood.tick(FRAME);
        let expected = 15 - cfg.min_decay.max(15 / cfg.decay_divisor);
        assert_eq!(mood.score(), expected);
        assert_eq!(mood.score(), 14);
    }

    #[test]
    fn missing_table_entry_is_noop() {
        let mut mood = IntensityTracker::new(&config(1000, 1, 10));
        mood.on_event(EventKind::ProjectileCollision);
        assert_eq!(mood.score(), 0);
    }

    #[test]
    fn clamps_at_max() {
        let mut mood = IntensityTracker::new(&config(1000, 1, 10));
        mood.on_event(EventKind::EnemyKillSpecial);
        mood.on_event(EventKind::EnemyKillSpecial);
        assert_eq!(mood.score(), 1000);
    }

    #[test]
    fn score_stays_in_bounds_under_random_input() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut mood = IntensityTracker::new(&config(1000, 2, 50));
        for _ in 0..10_000 {
            if rng.gen_bool(0.4) {
                let kind = EventKind::ALL[rng.gen_range(0..EventKind::ALL.len())];
                mood.on_event(kind);
            } else {
                mood.tick(FRAME);
            }
            assert!(mood.score() <= mood.max_intensity());
        }
    }

    #[test]
    fn decay_is_monotonic_and_reaches_zero() {
        let mut mood = IntensityTracker::new(&config(1000, 1, 20));
        mood.on_event(EventKind::EnemyKillSpecial);
        mood.on_event(EventKind::EnemyKillSpecial);
        // with min_decay >= 1 the bound is at most max_intensity ticks
        let bound = mood.max_intensity();
        let mut ticks = 0;
        let mut last = mood.score();
        while mood.score() > 0 {
            mood.tick(FRAME);
            assert!(mood.score() < last);
            last = mood.score();
            ticks += 1;
            assert!(ticks <= bound, "decay did not terminate");
        }
        mood.tick(FRAME);
        assert_eq!(mood.score(), 0);
    }

    #[test]
    fn score_out_of_bounds_and_rounding() {
        let mut mood = IntensityTracker::new(&config(1000, 1, 10));
        assert_eq!(mood.score_out_of(4).unwrap(), 0);

        mood.on_event(EventKind::PlayerHit); // 300
        assert_eq!(mood.score_out_of(10).unwrap(), 3);
        assert_eq!(mood.score_out_of(4).unwrap(), 1); // 1.2 rounds down

        for n in 1..50 {
            let s = mood.score_out_of(n).unwrap();
            assert!((0..=n).contains(&s));
        }
    }

    #[test]
    fn max_score_maps_to_subdivisions() {
        let mut mood = IntensityTracker::new(&config(1000, 1, 10));
        mood.on_event(EventKind::EnemyKillSpecial);
        mood.on_event(EventKind::EnemyKillSpecial);
        for active in 1..12 {
            assert_eq!(mood.score_out_of(active).unwrap(), active);
        }
    }

    #[test]
    fn non_positive_subdivisions_rejected() {
        let mood = IntensityTracker::new(&config(1000, 1, 10));
        assert!(matches!(mood.score_out_of(0), Err(MusicError::InvalidArgument(_))));
        assert!(matches!(mood.score_out_of(-3), Err(MusicError::InvalidArgument(_))));
    }

    #[test]
    fn bus_events_apply_on_tick_in_order() {
        let mut bus = LocalEventBus::new();
        let mut mood = IntensityTracker::new(&config(1000, 1, 1000));
        mood.subscribe_to(&mut bus);
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(EventKind::PlayerShoot);
        bus.emit(EventKind::PlayerShoot);
        assert_eq!(mood.score(), 0);

        mood.tick(FRAME);
        // 10 from the queue, minus one min_decay step
        assert_eq!(mood.score(), 9);
    }
}
