//! Configuration loader for the adaptive soundtrack.
//!
//! * Looks for `pixelon_music.toml` in the cwd unless overridden by `--config`.
//! * Provides defaults so the file is optional.
//!
//! Extend this struct whenever you add new tunables.

use std::fs;
use std::path::PathBuf;

use log::warn;
use serde::Deserialize;

use crate::error::{MusicError, Result};
use crate::events::EventIntensityTable;

pub const DEFAULT_CONFIG_PATH: &str = "pixelon_music.toml";

/// What the intensity score is scored against when sizing the next window.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SizingBasis {
    /// `scoreOutOf(|active|)`: the set grows by at most one loop per window.
    #[default]
    Active,
    /// `scoreOutOf(|pool|)`: jump straight to the share of the whole pool.
    Pool,
}

impl SizingBasis {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pool" | "total" => SizingBasis::Pool,
            _ => SizingBasis::Active,
        }
    }
}

/// Intensity tracker tunables.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MoodConfig {
    /// Upper clamp of the score.
    pub max_intensity: u32,
    /// Smallest amount removed per decay tick; must be >= 1.
    pub min_decay: u32,
    /// Proportional decay: `score / decay_divisor` per tick when larger than `min_decay`.
    pub decay_divisor: u32,
    /// Event name → score delta.
    pub events: EventIntensityTable,
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            max_intensity: 1000,
            min_decay: 1,
            decay_divisor: 200,
            events: EventIntensityTable::default(),
        }
    }
}

/// Loop window timing.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Every loop file must be exactly this long.
    pub loop_duration_secs: f64,
    pub prep_fraction: f64,
    pub schedule_fraction: f64,
    /// Minimum time between load polls while clips are still loading.
    pub load_grace_secs: f64,
    /// Clips that have not loaded after this long are dropped from the pool.
    pub load_timeout_secs: f64,
    pub sizing: SizingBasis,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            loop_duration_secs: 30.0,
            prep_fraction: 0.5,
            schedule_fraction: 0.83,
            load_grace_secs: 2.0,
            load_timeout_secs: 20.0,
            sizing: SizingBasis::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Frame-rate of the headless runner.
    pub fps: u32,
    /// Seed for loop selection (optional).
    pub seed: Option<u64>,
    /// Master audio volume (0.0 to 1.0)
    pub volume: f32,
    /// Directory scanned for optional loops at startup.
    pub loop_dir: PathBuf,
    /// Always-on layers.
    pub constant_loops: Vec<PathBuf>,
    pub mood: MoodConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fps: 60,
            seed: None,
            volume: 0.7,
            loop_dir: PathBuf::from("sounds/music/arcade_30s_loops"),
            constant_loops: vec![
                PathBuf::from("sounds/music/always_on/pad.ogg"),
                PathBuf::from("sounds/music/always_on/keys.ogg"),
            ],
            mood: MoodConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file; fall back to defaults on any error.
    pub fn load(path: Option<&str>) -> Self {
        let p = path.unwrap_or(DEFAULT_CONFIG_PATH);
        match fs::read_to_string(p) {
            Ok(text) => Self::from_toml_str(&text).unwrap_or_else(|err| {
                warn!("config {p}: {err}; using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Strict parse used by `load`; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(MusicError::InvalidConfig(msg.to_string()));
        let mood = &self.mood;
        let sched = &self.scheduler;

        if mood.max_intensity == 0 {
            return invalid("mood.max_intensity must be positive");
        }
        if mood.min_decay == 0 {
            return invalid("mood.min_decay must be at least 1 so the score always reaches 0");
        }
        if mood.decay_divisor == 0 {
            return invalid("mood.decay_divisor must be positive");
        }
        if !(sched.loop_duration_secs.is_finite() && sched.loop_duration_secs > 0.0) {
            return invalid("scheduler.loop_duration_secs must be a positive number");
        }
        if !(0.0 < sched.prep_fraction
            && sched.prep_fraction < sched.schedule_fraction
            && sched.schedule_fraction < 1.0)
        {
            return invalid("scheduler fractions must satisfy 0 < prep < schedule < 1");
        }
        if !(sched.load_grace_secs >= 0.0 && sched.load_timeout_secs >= 0.0) {
            return invalid("scheduler load grace/timeout must be non-negative");
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return invalid("volume must be within 0.0..=1.0");
        }
        Ok(())
    }
}
