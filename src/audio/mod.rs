// Loop scheduling and the audio collaborators it drives
pub mod pool;
pub mod timer;
pub mod scheduler;
pub mod loader;
pub mod rodio_output;

#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;

use log::{debug, warn};

pub use pool::{Clip, ClipId, ClipRole, LoadState, LoopPool};
pub use timer::{CancelToken, OneShotTimer, ThreadTimer};
pub use scheduler::{LoopScheduler, SchedulerPhase, WindowClock};
pub use loader::{scan_loop_dir, ClipData, FileLoader};
pub use rodio_output::RodioOutput;

/// Opaque id handed out by an [`AssetLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipHandle(pub u64);

/// Opaque id for one running playback of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackHandle(pub u64);

/// Non-blocking asset source. `is_loaded` is polled every tick and may pump
/// pending work.
pub trait AssetLoader {
    type Data;

    fn load(&mut self, path: &Path) -> ClipHandle;
    fn is_loaded(&mut self, handle: ClipHandle) -> bool;
    fn get(&self, handle: ClipHandle) -> Option<Self::Data>;
    /// Release the decoded asset. Called at most once per handle.
    fn unload(&mut self, handle: ClipHandle);
}

/// Fire-and-forget playback. Clips do not repeat on their own.
pub trait AudioOutput {
    type Data;

    fn play(&mut self, clip: &Self::Data) -> PlaybackHandle;
    fn stop(&mut self, handle: PlaybackHandle);
    fn release(&mut self, handle: PlaybackHandle);
}

/// Output used when no audio device is available: logs instead of playing.
#[derive(Debug, Default)]
pub struct SilentOutput {
    next: u64,
}

impl AudioOutput for SilentOutput {
    type Data = ClipData;

    fn play(&mut self, clip: &ClipData) -> PlaybackHandle {
        self.next += 1;
        debug!("(silent) play {}", clip.path().display());
        PlaybackHandle(self.next)
    }

    fn stop(&mut self, _handle: PlaybackHandle) {}

    fn release(&mut self, _handle: PlaybackHandle) {}
}

/// Real device when one can be opened, otherwise silence.
pub enum AnyOutput {
    Rodio(RodioOutput),
    Silent(SilentOutput),
}

impl AnyOutput {
    pub fn open(volume: f32, silent: bool) -> Self {
        if silent {
            return AnyOutput::Silent(SilentOutput::default());
        }
        match RodioOutput::try_default(volume) {
            Ok(output) => AnyOutput::Rodio(output),
            Err(err) => {
                warn!("{err}; music will be silent");
                AnyOutput::Silent(SilentOutput::default())
            }
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, AnyOutput::Silent(_))
    }
}

impl AudioOutput for AnyOutput {
    type Data = ClipData;

    fn play(&mut self, clip: &ClipData) -> PlaybackHandle {
        match self {
            AnyOutput::Rodio(output) => output.play(clip),
            AnyOutput::Silent(output) => output.play(clip),
        }
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        match self {
            AnyOutput::Rodio(output) => output.stop(handle),
            AnyOutput::Silent(output) => output.stop(handle),
        }
    }

    fn release(&mut self, handle: PlaybackHandle) {
        match self {
            AnyOutput::Rodio(output) => output.release(handle),
            AnyOutput::Silent(output) => output.release(handle),
        }
    }
}
