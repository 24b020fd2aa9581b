//! Environmental inputs for the generator: wind speed and cloud cover.
//!
//! Weather is fetched once when the simulator starts and held constant for
//! the whole run. Any failure falls back to randomized values.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Weather conditions driving the physical model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weather {
    /// Wind speed at hub height (m/s).
    pub wind_speed_ms: f64,
    /// Cloud cover (percent, 0–100).
    pub cloud_cover_percent: f64,
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no weather API key configured")]
    MissingKey,
}

/// Anything that can report current weather.
pub trait WeatherSource {
    /// Fetches current conditions.
    ///
    /// # Errors
    ///
    /// Returns a `WeatherError` if the conditions cannot be obtained.
    fn current(&self) -> Result<Weather, WeatherError>;
}

/// OpenWeatherMap current-weather client.
pub struct OpenWeatherMap {
    api_key: Option<String>,
    latitude: f64,
    longitude: f64,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct OwmResponse {
    wind: OwmWind,
    clouds: OwmClouds,
}

#[derive(Deserialize)]
struct OwmWind {
    speed: f64,
}

#[derive(Deserialize)]
struct OwmClouds {
    all: f64,
}

impl OpenWeatherMap {
    /// Creates a client for the given site.
    ///
    /// # Errors
    ///
    /// Returns a `WeatherError` if the HTTP client cannot be built.
    pub fn new(
        api_key: Option<String>,
        latitude: f64,
        longitude: f64,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_key,
            latitude,
            longitude,
            client,
        })
    }
}

impl WeatherSource for OpenWeatherMap {
    fn current(&self) -> Result<Weather, WeatherError> {
        let key = self.api_key.as_deref().ok_or(WeatherError::MissingKey)?;
        let body: OwmResponse = self
            .client
            .get(OPENWEATHER_URL)
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lon", self.longitude.to_string()),
                ("appid", key.to_string()),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        Ok(Weather {
            wind_speed_ms: body.wind.speed.max(0.0),
            cloud_cover_percent: body.clouds.all.clamp(0.0, 100.0),
        })
    }
}

/// Randomized conditions used when no real weather is available.
///
/// Wind is drawn from `[3, 12)` m/s and cloud cover from `[10, 70]` percent.
pub fn fallback_weather(rng: &mut impl Rng) -> Weather {
    Weather {
        wind_speed_ms: rng.random_range(3.0..12.0),
        cloud_cover_percent: f64::from(rng.random_range(10_u32..=70)),
    }
}

/// Fetches weather from `source`, falling back to random values on failure.
pub fn weather_or_fallback(source: &dyn WeatherSource, rng: &mut impl Rng) -> Weather {
    match source.current() {
        Ok(weather) => {
            info!(
                wind_speed_ms = weather.wind_speed_ms,
                cloud_cover_percent = weather.cloud_cover_percent,
                "fetched live weather"
            );
            weather
        }
        Err(err) => {
            let weather = fallback_weather(rng);
            warn!(
                %err,
                wind_speed_ms = weather.wind_speed_ms,
                cloud_cover_percent = weather.cloud_cover_percent,
                "using fallback weather"
            );
            weather
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct Fixed(Weather);

    impl WeatherSource for Fixed {
        fn current(&self) -> Result<Weather, WeatherError> {
            Ok(self.0)
        }
    }

    struct Offline;

    impl WeatherSource for Offline {
        fn current(&self) -> Result<Weather, WeatherError> {
            Err(WeatherError::MissingKey)
        }
    }

    #[test]
    fn fallback_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let w = fallback_weather(&mut rng);
            assert!((3.0..12.0).contains(&w.wind_speed_ms));
            assert!((10.0..=70.0).contains(&w.cloud_cover_percent));
        }
    }

    #[test]
    fn live_weather_is_used_when_available() {
        let live = Weather {
            wind_speed_ms: 6.5,
            cloud_cover_percent: 40.0,
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(weather_or_fallback(&Fixed(live), &mut rng), live);
    }

    #[test]
    fn failure_falls_back() {
        let mut rng = StdRng::seed_from_u64(3);
        let w = weather_or_fallback(&Offline, &mut rng);
        assert!((3.0..12.0).contains(&w.wind_speed_ms));
    }

    #[test]
    fn missing_key_is_an_error_without_network() {
        let owm = OpenWeatherMap::new(None, 0.0, 0.0, Duration::from_secs(1)).unwrap();
        assert!(matches!(owm.current(), Err(WeatherError::MissingKey)));
    }
}
