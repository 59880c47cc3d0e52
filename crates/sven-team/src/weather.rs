// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Current weather and short forecast via the free Open-Meteo API (no API
//! key). Falls back to geocoding for any city not in the hardcoded table.
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sven_tools::backends::WeatherBackend;

const GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_FORECAST_DAYS: u32 = 7;

struct KnownCity {
    lat: f64,
    lon: f64,
    timezone: &'static str,
    name: &'static str,
}

fn known_cities() -> HashMap<&'static str, KnownCity> {
    HashMap::from([
        ("lviv", KnownCity { lat: 49.8397, lon: 24.0297, timezone: "Europe/Kyiv", name: "Lviv, Ukraine" }),
        ("kyiv", KnownCity { lat: 50.4501, lon: 30.5234, timezone: "Europe/Kyiv", name: "Kyiv, Ukraine" }),
        ("london", KnownCity { lat: 51.5074, lon: -0.1278, timezone: "Europe/London", name: "London, UK" }),
        ("new york", KnownCity { lat: 40.7128, lon: -74.0060, timezone: "America/New_York", name: "New York, USA" }),
        ("tokyo", KnownCity { lat: 35.6762, lon: 139.6503, timezone: "Asia/Tokyo", name: "Tokyo, Japan" }),
        ("berlin", KnownCity { lat: 52.5200, lon: 13.4050, timezone: "Europe/Berlin", name: "Berlin, Germany" }),
        ("paris", KnownCity { lat: 48.8566, lon: 2.3522, timezone: "Europe/Paris", name: "Paris, France" }),
        ("warsaw", KnownCity { lat: 52.2297, lon: 21.0122, timezone: "Europe/Warsaw", name: "Warsaw, Poland" }),
    ])
}

fn wmo_description(code: i64) -> String {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snowfall",
        73 => "Moderate snowfall",
        75 => "Heavy snowfall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        other => return format!("Unknown ({other})"),
    }
    .to_string()
}

struct Coordinates {
    lat: f64,
    lon: f64,
    timezone: String,
    name: String,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    results: Option<Vec<GeocodeResult>>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    latitude: f64,
    longitude: f64,
    timezone: Option<String>,
    name: Option<String>,
    country: Option<String>,
}

#[derive(Deserialize)]
struct ForecastResponse {
    current: Option<CurrentWeather>,
    daily: Option<DailyWeather>,
}

#[derive(Deserialize)]
struct CurrentWeather {
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    weather_code: Option<i64>,
}

#[derive(Deserialize)]
struct DailyWeather {
    time: Vec<String>,
    weather_code: Vec<i64>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
}

async fn geocode(client: &reqwest::Client, city: &str) -> Result<Coordinates, String> {
    let key = city.trim().to_lowercase();
    if let Some(known) = known_cities().get(key.as_str()) {
        return Ok(Coordinates {
            lat: known.lat,
            lon: known.lon,
            timezone: known.timezone.to_string(),
            name: known.name.to_string(),
        });
    }

    let response = client
        .get(GEOCODE_URL)
        .query(&[("name", city), ("count", "1"), ("language", "en")])
        .send()
        .await
        .map_err(|e| format!("geocoding failed: {e}"))?;
    let data: GeocodeResponse = response
        .error_for_status()
        .map_err(|e| format!("geocoding failed: {e}"))?
        .json()
        .await
        .map_err(|e| format!("geocoding response malformed: {e}"))?;

    let result = data
        .results
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| format!("city not found: {city}"))?;
    let name = format!(
        "{}, {}",
        result.name.unwrap_or_else(|| city.to_string()),
        result.country.unwrap_or_default()
    );
    Ok(Coordinates {
        lat: result.latitude,
        lon: result.longitude,
        timezone: result.timezone.unwrap_or_else(|| "UTC".to_string()),
        name: name.trim_end_matches(", ").to_string(),
    })
}

fn format_report(coords: &Coordinates, data: &ForecastResponse, forecast_days: u32) -> String {
    let mut out = format!("Weather for {} ({})\n", coords.name, coords.timezone);

    if let Some(cur) = &data.current {
        out.push_str(&format!(
            "Now: {} — {}°C (feels like {}°C), humidity {}%, wind {} km/h\n",
            wmo_description(cur.weather_code.unwrap_or(-1)),
            cur.temperature_2m.map(|t| t.round() as i64).unwrap_or_default(),
            cur.apparent_temperature.map(|t| t.round() as i64).unwrap_or_default(),
            cur.relative_humidity_2m.map(|h| h.round() as i64).unwrap_or_default(),
            cur.wind_speed_10m.map(|w| w.round() as i64).unwrap_or_default(),
        ));
    }

    if let Some(daily) = &data.daily {
        out.push_str(&format!("\n{}-day forecast:\n", forecast_days.min(daily.time.len() as u32)));
        for i in 0..daily.time.len() {
            let weather = daily.weather_code.get(i).copied().unwrap_or(-1);
            let max = daily.temperature_2m_max.get(i).copied();
            let min = daily.temperature_2m_min.get(i).copied();
            out.push_str(&format!(
                "  {}: {}, {}–{}°C\n",
                daily.time[i],
                wmo_description(weather),
                min.map(|t| t.round() as i64).unwrap_or_default(),
                max.map(|t| t.round() as i64).unwrap_or_default(),
            ));
        }
    }

    out.trim_end().to_string()
}

pub struct OpenMeteoWeather {
    client: reqwest::Client,
    forecast_days: u32,
}

impl OpenMeteoWeather {
    pub fn new(forecast_days: u32) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("sven-agent/0.1")
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { client, forecast_days: forecast_days.clamp(1, 16) })
    }
}

impl Default for OpenMeteoWeather {
    fn default() -> Self {
        Self::new(DEFAULT_FORECAST_DAYS).expect("default reqwest client builds")
    }
}

#[async_trait]
impl WeatherBackend for OpenMeteoWeather {
    async fn weather(&self, location: &str) -> Result<String, String> {
        let coords = geocode(&self.client, location).await?;

        let response = self
            .client
            .get(WEATHER_URL)
            .query(&[
                ("latitude", coords.lat.to_string()),
                ("longitude", coords.lon.to_string()),
                ("timezone", coords.timezone.clone()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m"
                        .to_string(),
                ),
                ("daily", "weather_code,temperature_2m_max,temperature_2m_min".to_string()),
                ("forecast_days", self.forecast_days.to_string()),
            ])
            .send()
            .await
            .map_err(|e| format!("weather API error: {e}"))?;
        let data: ForecastResponse = response
            .error_for_status()
            .map_err(|e| format!("weather API error: {e}"))?
            .json()
            .await
            .map_err(|e| format!("weather response malformed: {e}"))?;

        Ok(format_report(&coords, &data, self.forecast_days))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wmo_known_code_is_human_readable() {
        assert_eq!(wmo_description(0), "Clear sky");
        assert_eq!(wmo_description(95), "Thunderstorm");
    }

    #[test]
    fn wmo_unknown_code_falls_back() {
        assert_eq!(wmo_description(12345), "Unknown (12345)");
    }

    #[test]
    fn known_city_lookup_is_case_insensitive_via_lowercase_key() {
        let cities = known_cities();
        assert!(cities.contains_key("lviv"));
        assert!(cities.contains_key("new york"));
    }

    #[test]
    fn format_report_includes_city_and_current() {
        let coords = Coordinates {
            lat: 1.0,
            lon: 2.0,
            timezone: "UTC".into(),
            name: "Testville".into(),
        };
        let data = ForecastResponse {
            current: Some(CurrentWeather {
                temperature_2m: Some(20.0),
                apparent_temperature: Some(19.0),
                relative_humidity_2m: Some(55.0),
                wind_speed_10m: Some(10.0),
                weather_code: Some(0),
            }),
            daily: None,
        };
        let report = format_report(&coords, &data, 1);
        assert!(report.contains("Testville"));
        assert!(report.contains("Clear sky"));
    }
}
