use bevy::prelude::*;
use bevy::window::{PresentMode, WindowResolution};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::ConfigError;

/// Location of the optional config file, relative to the working directory
pub const CONFIG_PATH: &str = "assets/simulation.ron";

/// Window and startup settings for the simulation
#[derive(Resource, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
    pub vsync: bool,
    /// Background colour as sRGB components in 0..1, written `(r, g, b)` in RON
    pub clear_color: [f32; 3],
    /// Asset path of a `.slime` file; `None` starts from a zeroed slime
    pub initial_slime: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            title: "Slime Simulation".to_string(),
            width: 1280.0,
            height: 720.0,
            vsync: true,
            clear_color: [0.0, 0.0, 0.0],
            initial_slime: None,
        }
    }
}

impl SimulationConfig {
    /// Read the config from `path`, falling back to defaults when the file is absent
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::from_ron(&contents),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn from_ron(contents: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(contents)?)
    }

    pub fn present_mode(&self) -> PresentMode {
        if self.vsync {
            PresentMode::AutoVsync
        } else {
            PresentMode::AutoNoVsync
        }
    }

    /// Primary window built from these settings
    pub fn window(&self) -> Window {
        Window {
            title: self.title.clone(),
            resolution: WindowResolution::new(self.width, self.height),
            present_mode: self.present_mode(),
            ..default()
        }
    }

    pub fn clear_color(&self) -> ClearColor {
        let [r, g, b] = self.clear_color;
        ClearColor(Color::srgb(r, g, b))
    }
}
