use std::path::PathBuf;
use std::time::Duration;

use bevy::app::{AppExit, ScheduleRunnerPlugin};
use bevy::prelude::*;
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pixelon_music::plugin::{GameplayEvent, IntensityMusicPlugin};
use pixelon_music::{Config, EventKind, SizingBasis};

/// Headless attract-mode run: synthetic combat drives the adaptive soundtrack.
#[derive(Parser, Debug)]
#[command(name = "pixelon-music", version)]
struct Cli {
    /// TOML config file (defaults to ./pixelon_music.toml when present)
    #[arg(long)]
    config: Option<String>,
    /// Override the optional loop directory
    #[arg(long)]
    loop_dir: Option<PathBuf>,
    /// How long to run before exiting
    #[arg(long, default_value_t = 120.0)]
    seconds: f64,
    /// Do not open an audio device
    #[arg(long)]
    silent: bool,
    /// Loop count basis: "active" (grow one loop per window) or "pool"
    #[arg(long)]
    sizing: Option<String>,
    /// Seed for loop selection and the synthetic events
    #[arg(long)]
    seed: Option<u64>,
}

/// Synthetic gameplay state for the demo.
#[derive(Resource)]
struct AttractMode {
    rng: StdRng,
    elapsed: f64,
    run_for: f64,
    last_report: f64,
}

/// Emit events at a rate that swells and fades over a two-minute cycle.
fn emit_demo_events(
    time: Res<Time>,
    mut demo: ResMut<AttractMode>,
    mut events: EventWriter<GameplayEvent>,
) {
    demo.elapsed += time.delta_secs_f64();
    let phase = (demo.elapsed / 120.0 * std::f64::consts::TAU).sin();
    let heat = (phase * 0.5 + 0.5).clamp(0.0, 1.0);

    if demo.rng.gen_bool(0.05 + 0.4 * heat) {
        events.send(GameplayEvent(EventKind::PlayerShoot));
    }
    if demo.rng.gen_bool(0.01 + 0.05 * heat) {
        events.send(GameplayEvent(EventKind::ProjectileCollision));
    }
    if demo.rng.gen_bool(0.02 * heat) {
        events.send(GameplayEvent(EventKind::EnemyKillStd));
    }
    if demo.rng.gen_bool(0.002 * heat) {
        events.send(GameplayEvent(EventKind::EnemyKillSpecial));
    }
    if demo.rng.gen_bool(0.004 * heat) {
        events.send(GameplayEvent(EventKind::PlayerHit));
    }
}

fn report_and_exit(
    mut demo: ResMut<AttractMode>,
    soundtrack: Option<NonSend<pixelon_music::plugin::GameSoundtrack>>,
    mut exit: EventWriter<AppExit>,
) {
    if demo.elapsed - demo.last_report >= 5.0 {
        demo.last_report = demo.elapsed;
        if let Some(soundtrack) = soundtrack {
            let pool = soundtrack.scheduler().pool();
            info!(
                "t={:>6.1}s intensity={:>4} phase={:?} active={} unused={}",
                demo.elapsed,
                soundtrack.intensity(),
                soundtrack.phase(),
                pool.active().len(),
                pool.unused().len(),
            );
        }
    }
    if demo.elapsed >= demo.run_for {
        exit.send(AppExit::Success);
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    // Load configuration from file
    let mut config = Config::load(cli.config.as_deref());
    if let Some(dir) = cli.loop_dir {
        config.loop_dir = dir;
    }
    if let Some(sizing) = cli.sizing.as_deref() {
        config.scheduler.sizing = SizingBasis::from_string(sizing);
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let frame = Duration::from_secs_f64(1.0 / config.fps.max(1) as f64);
    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame)))
        .add_plugins(IntensityMusicPlugin::new(config, cli.silent))
        .insert_resource(AttractMode {
            rng,
            elapsed: 0.0,
            run_for: cli.seconds,
            last_report: 0.0,
        })
        .add_systems(Update, (emit_demo_events, report_and_exit.after(emit_demo_events)))
        .run();
}
