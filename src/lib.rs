//! pixelon-music: intensity-driven ambient loop layering.
//!
//! Gameplay events raise a decaying intensity score; a window-based scheduler
//! uses that score to decide how many pre-rendered loops play in the next
//! window, swapping one loop per window for variety.
//!
//! * [`mood::IntensityTracker`]: bounded, decaying score.
//! * [`audio::LoopPool`]: clip catalog split into unused / active / pending-removal.
//! * [`audio::LoopScheduler`]: the per-window state machine.
//! * [`plugin::IntensityMusicPlugin`]: Bevy glue.
//!
//! # Example
//! ```
//! use pixelon_music::{EventKind, IntensityTracker, MoodConfig};
//! let mut mood = IntensityTracker::new(&MoodConfig::default());
//! mood.on_event(EventKind::PlayerHit);
//! assert!(mood.score_out_of(4).unwrap() <= 4);
//! ```

pub mod error;
pub mod config;
pub mod events;
pub mod mood;
pub mod audio;
pub mod soundtrack;
pub mod plugin;

// Main exports
pub use error::{MusicError, Result};
pub use config::{Config, MoodConfig, SchedulerConfig, SizingBasis};
pub use events::{EventBus, EventIntensityTable, EventKind, LocalEventBus};
pub use mood::IntensityTracker;
pub use soundtrack::Soundtrack;
