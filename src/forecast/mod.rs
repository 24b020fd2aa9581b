//! Next-day solar forecast from a regression on hour of day and weekday.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::efficiency::round2;
use crate::config::ForecastConfig;
use crate::telemetry::Reading;

pub mod regression;

use regression::{LinearRegression, mean_absolute_error, train_test_split};

#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("not enough data to forecast: {found} readings, need {required}")]
    NotEnoughData { found: usize, required: usize },
}

/// Held-out accuracy of the deployed model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    /// Mean absolute error on the test split (kW).
    pub mean_absolute_error_kw: f64,
    /// Readings the model was built from.
    pub data_points_used: usize,
}

/// Forecast record, overwritten on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub prediction_timestamp: NaiveDateTime,
    /// Sum of the hourly predictions, each held for one hour (kWh).
    pub predicted_total_kwh: f64,
    /// Predicted solar output keyed `"00:00"` to `"23:00"` (kW).
    pub hourly_forecast_kw: BTreeMap<String, f64>,
    pub model_evaluation: ModelEvaluation,
}

impl fmt::Display for Forecast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Solar Forecast ---")?;
        for (hour, kw) in &self.hourly_forecast_kw {
            writeln!(f, "{hour}  {kw:>6.2} kW")?;
        }
        writeln!(f, "Expected total:   {:.2} kWh", self.predicted_total_kwh)?;
        write!(
            f,
            "Model MAE:        {:.4} kW over {} readings",
            self.model_evaluation.mean_absolute_error_kw, self.model_evaluation.data_points_used
        )
    }
}

/// Features: integer hour of day (0–23) and weekday (Monday = 0).
fn features(at: &NaiveDateTime) -> [f64; 2] {
    [
        f64::from(at.hour()),
        f64::from(at.weekday().num_days_from_monday()),
    ]
}

/// Least-squares solar forecaster.
#[derive(Debug, Clone)]
pub struct Forecaster {
    min_readings: usize,
    test_fraction: f64,
    seed: u64,
}

impl Forecaster {
    pub fn new(cfg: &ForecastConfig) -> Self {
        Self {
            min_readings: cfg.min_readings,
            test_fraction: cfg.test_fraction,
            seed: cfg.seed,
        }
    }

    /// Forecasts tomorrow's hourly solar output.
    ///
    /// Fits on a seeded train split to measure MAE on the held-out split,
    /// then refits on every reading for the forecast itself. Negative
    /// predictions are clipped to zero.
    ///
    /// # Arguments
    ///
    /// * `readings` - Training history
    /// * `now` - Forecast time; the forecast covers the following day
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::NotEnoughData` below the configured minimum.
    pub fn forecast(
        &self,
        readings: &[Reading],
        now: NaiveDateTime,
    ) -> Result<Forecast, ForecastError> {
        if readings.len() < self.min_readings {
            return Err(ForecastError::NotEnoughData {
                found: readings.len(),
                required: self.min_readings,
            });
        }

        let x: Vec<[f64; 2]> = readings.iter().map(|r| features(&r.timestamp)).collect();
        let y: Vec<f64> = readings.iter().map(|r| r.generation.solar_kw).collect();

        // Evaluation
        let (train, test) = train_test_split(x.len(), self.test_fraction, self.seed);
        let pick_x = |idx: &[usize]| idx.iter().map(|&i| x[i]).collect::<Vec<_>>();
        let pick_y = |idx: &[usize]| idx.iter().map(|&i| y[i]).collect::<Vec<_>>();
        let evaluated = LinearRegression::fit(&pick_x(&train), &pick_y(&train));
        let test_predictions: Vec<f64> = pick_x(&test).iter().map(|f| evaluated.predict(f)).collect();
        let mae = mean_absolute_error(&test_predictions, &pick_y(&test));

        // Deployment
        let model = LinearRegression::fit(&x, &y);
        let weekday = (now + Duration::days(1)).weekday().num_days_from_monday();
        let hourly: Vec<f64> = (0..24_u32)
            .map(|h| model.predict(&[f64::from(h), f64::from(weekday)]).max(0.0))
            .collect();
        let total: f64 = hourly.iter().sum();

        Ok(Forecast {
            prediction_timestamp: now,
            predicted_total_kwh: round2(total),
            hourly_forecast_kw: hourly
                .iter()
                .enumerate()
                .map(|(h, kw)| (format!("{h:02}:00"), round2(*kw)))
                .collect(),
            model_evaluation: ModelEvaluation {
                mean_absolute_error_kw: (mae * 10_000.0).round() / 10_000.0,
                data_points_used: readings.len(),
            },
        })
    }
}
