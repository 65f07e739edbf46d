//! Weather lookup client
//!
//! Resolves a place name to coordinates through the Open-Meteo geocoding
//! endpoint, then fetches current conditions in imperial units. A place
//! the geocoder cannot resolve is the not-found case; the chat endpoint is
//! never involved in a failed lookup.

use crate::config::WeatherConfig;
use crate::error::WeatherError;
use serde::Deserialize;
use std::time::Duration;

/// Abstraction over the weather lookup, so the controller can be exercised
/// against a scripted service in tests
pub trait WeatherApi: Send + Sync {
    /// Fetch current conditions for a place name
    fn current(&self, location: &str) -> Result<WeatherReport, WeatherError>;
}

/// Current conditions for one resolved location
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    /// "City, Country" as resolved by the geocoder
    pub location: String,
    /// Temperature in °F, rounded
    pub temperature: i32,
    /// Apparent temperature in °F, rounded
    pub feels_like: i32,
    /// Relative humidity in percent
    pub humidity: i32,
    /// Human-readable conditions from the WMO weather code
    pub description: String,
    /// Wind speed in mph, rounded
    pub wind_speed: i32,
    /// Precipitation in inches
    pub precipitation: f64,
}

impl WeatherReport {
    /// The spoken-weather sentence submitted as the user turn
    pub fn summary(&self) -> String {
        format!(
            "The weather in {} is currently {} with a temperature of {}°F, \
             feels like {}°F. Humidity is at {}%, with wind speeds of {} mph.",
            self.location,
            self.description,
            self.temperature,
            self.feels_like,
            self.humidity,
            self.wind_speed
        )
    }
}

/// HTTP client for the Open-Meteo geocoding and forecast endpoints
pub struct WeatherClient {
    geocode_endpoint: String,
    forecast_endpoint: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeMatch>,
}

#[derive(Deserialize)]
struct GeocodeMatch {
    latitude: f64,
    longitude: f64,
    name: String,
    country: Option<String>,
}

#[derive(Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    precipitation: f64,
    weather_code: u16,
    wind_speed_10m: f64,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            geocode_endpoint: config.geocode_endpoint.clone(),
            forecast_endpoint: config.forecast_endpoint.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl WeatherApi for WeatherClient {
    fn current(&self, location: &str) -> Result<WeatherReport, WeatherError> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();

        tracing::debug!("Geocoding location: {:?}", location);
        let geocode: GeocodeResponse = agent
            .get(&self.geocode_endpoint)
            .query("name", location)
            .query("count", "1")
            .query("language", "en")
            .query("format", "json")
            .call()
            .map_err(|e| map_transport(e, "geocoding"))?
            .into_json()
            .map_err(|e| {
                WeatherError::InvalidResponse(format!("Failed to parse geocoding response: {}", e))
            })?;

        let Some(place) = geocode.results.into_iter().next() else {
            return Err(WeatherError::LocationNotFound(location.to_string()));
        };

        let resolved = match place.country {
            Some(ref country) => format!("{}, {}", place.name, country),
            None => place.name.clone(),
        };
        tracing::debug!(
            "Resolved {:?} to {} ({}, {})",
            location,
            resolved,
            place.latitude,
            place.longitude
        );

        let forecast: ForecastResponse = agent
            .get(&self.forecast_endpoint)
            .query("latitude", &place.latitude.to_string())
            .query("longitude", &place.longitude.to_string())
            .query(
                "current",
                "temperature_2m,relative_humidity_2m,apparent_temperature,\
                 precipitation,weather_code,wind_speed_10m",
            )
            .query("temperature_unit", "fahrenheit")
            .query("wind_speed_unit", "mph")
            .query("precipitation_unit", "inch")
            .query("timezone", "auto")
            .call()
            .map_err(|e| map_transport(e, "forecast"))?
            .into_json()
            .map_err(|e| {
                WeatherError::InvalidResponse(format!("Failed to parse forecast response: {}", e))
            })?;

        let current = forecast.current;
        Ok(WeatherReport {
            location: resolved,
            temperature: current.temperature_2m.round() as i32,
            feels_like: current.apparent_temperature.round() as i32,
            humidity: current.relative_humidity_2m.round() as i32,
            description: describe_weather_code(current.weather_code).to_string(),
            wind_speed: current.wind_speed_10m.round() as i32,
            precipitation: current.precipitation,
        })
    }
}

fn map_transport(e: ureq::Error, stage: &str) -> WeatherError {
    match e {
        ureq::Error::Status(status, resp) => WeatherError::Service {
            status,
            message: format!("{} request failed: {}", stage, resp.status_text()),
        },
        ureq::Error::Transport(t) => WeatherError::Network(t.to_string()),
    }
}

/// WMO weather interpretation codes used by Open-Meteo
fn describe_weather_code(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}
