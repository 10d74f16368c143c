//! Error types shared by the configuration layer and the slime asset loader.

use thiserror::Error;

/// Failure while reading `simulation.ron`
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Could not read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON for [`crate::config::SimulationConfig`]
    #[error("Could not parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Failure while loading a `.slime` asset
#[derive(Error, Debug)]
pub enum SlimeLoaderError {
    #[error("Could not load slime: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse slime RON: {0}")]
    Ron(#[from] ron::error::SpannedError),
}
