use std::collections::HashMap;

use log::{info, warn};
use rodio::{OutputStream, OutputStreamHandle, Sink};

use super::{AudioOutput, ClipData, PlaybackHandle};
use crate::error::{MusicError, Result};

/// rodio-backed output with one `Sink` per running playback.
///
/// Holds the `OutputStream`, which is not `Send`; keep it on the thread that
/// ticks the scheduler (a Bevy non-send resource).
pub struct RodioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sinks: HashMap<PlaybackHandle, Sink>,
    next: u64,
    volume: f32,
}

impl RodioOutput {
    pub fn try_default(volume: f32) -> Result<Self> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| MusicError::AudioDevice(e.to_string()))?;
        info!("audio output stream opened (volume {:.0}%)", volume * 100.0);
        Ok(Self {
            _stream: stream,
            handle,
            sinks: HashMap::new(),
            next: 0,
            volume: volume.clamp(0.0, 1.0),
        })
    }
}

impl AudioOutput for RodioOutput {
    type Data = ClipData;

    /// Failures are logged and the returned handle simply has nothing behind it.
    fn play(&mut self, clip: &ClipData) -> PlaybackHandle {
        self.next += 1;
        let playback = PlaybackHandle(self.next);

        let sink = match Sink::try_new(&self.handle) {
            Ok(sink) => sink,
            Err(err) => {
                warn!("failed to create audio sink for {}: {err}", clip.path().display());
                return playback;
            }
        };
        match clip.decoder() {
            Ok(source) => {
                sink.set_volume(self.volume);
                sink.append(source);
                self.sinks.insert(playback, sink);
            }
            Err(err) => warn!("failed to decode {}: {err}", clip.path().display()),
        }
        playback
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        if let Some(sink) = self.sinks.get(&handle) {
            sink.stop();
        }
    }

    fn release(&mut self, handle: PlaybackHandle) {
        // dropping a Sink that still has audio would stop it, so detach instead
        if let Some(sink) = self.sinks.remove(&handle) {
            sink.detach();
        }
    }
}
