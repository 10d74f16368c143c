//! Opens a window and increments a single GPU-resident slime value every frame
//! with a compute shader.

mod compute;
mod config;
mod error;
mod slime;

use bevy::prelude::*;

use compute::SlimeComputePlugin;
use config::{CONFIG_PATH, SimulationConfig};
use error::ConfigError;
use slime::{Slime, SlimeAssetPlugin, SlimeHandle};

/// Exits non-zero when the config is invalid or a system requests an error exit
fn main() -> Result<AppExit, ConfigError> {
    let config = SimulationConfig::load(CONFIG_PATH)?;

    let exit = App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(config.window()),
            ..default()
        }))
        .add_plugins((SlimeAssetPlugin, SlimeComputePlugin))
        .insert_resource(config.clear_color())
        .insert_resource(config)
        .add_systems(Startup, setup)
        .add_systems(Update, close_on_esc)
        .run();

    if let AppExit::Error(code) = exit {
        error!("Slime simulation exited with code {code}");
    }
    Ok(exit)
}

fn setup(
    mut commands: Commands,
    config: Res<SimulationConfig>,
    asset_server: Res<AssetServer>,
    mut slimes: ResMut<Assets<Slime>>,
) {
    commands.spawn(Camera2d);

    let slime = match &config.initial_slime {
        Some(path) => {
            info!("Loading initial slime from {path}");
            asset_server.load(path.clone())
        }
        None => slimes.add(Slime::default()),
    };
    commands.insert_resource(SlimeHandle(slime));
}

/// Despawns the focused window on Escape, which exits the app once no windows remain
fn close_on_esc(
    mut commands: Commands,
    windows: Query<(Entity, &Window)>,
    keyboard_input: Res<ButtonInput<KeyCode>>,
) {
    if !keyboard_input.just_pressed(KeyCode::Escape) {
        return;
    }

    for (entity, window) in &windows {
        if window.focused {
            commands.entity(entity).despawn();
        }
    }
}
