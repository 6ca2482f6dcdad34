use tally_config::ConfigError;
use tally_core::CoreError;
use thiserror::Error;

/// Error type surfaced by the [`Tracker`](crate::Tracker) facade.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
