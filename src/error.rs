//! Crate-level error for the job entry points.

use thiserror::Error;

use crate::config::ConfigError;
use crate::forecast::ForecastError;
use crate::store::StoreError;
use crate::transport::TransportError;
use crate::weather::WeatherError;

/// Result alias used by [`crate::jobs`].
pub type Result<T> = std::result::Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Weather(#[from] WeatherError),
    #[error(transparent)]
    Forecast(#[from] ForecastError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot encode reading: {0}")]
    Json(#[from] serde_json::Error),
    /// Too little history for a meaningful result; nothing was written.
    #[error("{job}: not enough data ({found} readings, need {required})")]
    NotEnoughData {
        job: &'static str,
        found: usize,
        required: usize,
    },
}

impl JobError {
    /// Returns `true` for the "not enough data" outcome, which the binary
    /// reports without failing.
    pub fn is_not_enough_data(&self) -> bool {
        matches!(
            self,
            JobError::NotEnoughData { .. } | JobError::Forecast(ForecastError::NotEnoughData { .. })
        )
    }
}
