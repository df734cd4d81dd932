//! Bevy integration.
//!
//! Gameplay code sends [`GameplayEvent`]s; the plugin feeds them to the mood
//! tracker and ticks the loop scheduler every `Update`. The soundtrack owns the
//! rodio output stream, which is not `Send`, so it lives as a non-send resource.

use bevy::app::AppExit;
use bevy::prelude::*;

use crate::audio::{AnyOutput, FileLoader, ThreadTimer};
use crate::config::Config;
use crate::events::EventKind;
use crate::soundtrack::Soundtrack;

pub type GameSoundtrack = Soundtrack<FileLoader, AnyOutput>;

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameplayEvent(pub EventKind);

#[derive(Resource, Debug, Clone)]
pub struct MusicSettings {
    pub config: Config,
    /// Skip opening an audio device (headless runs, CI).
    pub silent: bool,
}

pub struct IntensityMusicPlugin {
    pub config: Config,
    pub silent: bool,
}

impl IntensityMusicPlugin {
    pub fn new(config: Config, silent: bool) -> Self {
        Self { config, silent }
    }
}

impl Plugin for IntensityMusicPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<GameplayEvent>()
            .insert_resource(MusicSettings {
                config: self.config.clone(),
                silent: self.silent,
            })
            .add_systems(Startup, setup_soundtrack)
            .add_systems(Update, drive_soundtrack)
            .add_systems(Last, dispose_on_exit);
    }
}

/// Build and start the soundtrack. Call once at app launch.
fn setup_soundtrack(world: &mut World) {
    let settings = world.resource::<MusicSettings>().clone();
    let output = AnyOutput::open(settings.config.volume, settings.silent);
    let mut soundtrack: GameSoundtrack = Soundtrack::new(
        &settings.config,
        FileLoader::new(),
        output,
        Box::new(ThreadTimer),
    );
    soundtrack.start();
    world.insert_non_send_resource(soundtrack);
}

fn drive_soundtrack(
    time: Res<Time>,
    mut events: EventReader<GameplayEvent>,
    soundtrack: Option<NonSendMut<GameSoundtrack>>,
) {
    let Some(mut soundtrack) = soundtrack else {
        return;
    };
    for event in events.read() {
        soundtrack.on_event(event.0);
    }
    soundtrack.tick(time.delta_secs_f64());
}

fn dispose_on_exit(
    mut exits: EventReader<AppExit>,
    soundtrack: Option<NonSendMut<GameSoundtrack>>,
) {
    if exits.read().next().is_none() {
        return;
    }
    if let Some(mut soundtrack) = soundtrack {
        soundtrack.dispose();
    }
}
