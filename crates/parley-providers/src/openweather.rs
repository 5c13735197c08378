//! OpenWeatherMap current-weather lookup (metric units).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{ProviderError, WeatherLookup, check_status, trim_base_url};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const TIMEOUT: Duration = Duration::from_secs(10);

pub struct OpenWeatherClient {
    pub base_url: String,
    client: reqwest::Client,
}

impl OpenWeatherClient {
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            base_url: trim_base_url(base_url, DEFAULT_BASE_URL),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    /// Numeric on success, sometimes a string on failure.
    #[serde(default)]
    cod: serde_json::Value,
    #[serde(default)]
    weather: Vec<Condition>,
    main: Option<MainReadings>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

impl WeatherResponse {
    fn is_ok(&self) -> bool {
        match &self.cod {
            serde_json::Value::Number(n) => n.as_u64() == Some(200),
            serde_json::Value::String(s) => s == "200",
            _ => self.main.is_some(),
        }
    }

    fn summary(&self, city: &str) -> Option<String> {
        let main = self.main.as_ref()?;
        let description = self
            .weather
            .first()
            .map(|c| capitalize(&c.description))
            .unwrap_or_else(|| "Unknown conditions".into());
        Some(format!(
            "Current weather in {city}: {description}, Temperature: {:.1}°C (feels like {:.1}°C), Humidity: {}%",
            main.temp, main.feels_like, main.humidity
        ))
    }
}

fn capitalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl WeatherLookup for OpenWeatherClient {
    async fn current(&self, city: &str, api_key: &str) -> Result<String, ProviderError> {
        debug!(city, "Looking up weather");
        let response = self
            .client
            .get(format!("{}/data/2.5/weather", self.base_url))
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .timeout(TIMEOUT)
            .send()
            .await?;
        let body: WeatherResponse = check_status(response).await?.json().await?;

        if !body.is_ok() {
            return Err(ProviderError::NotFound(city.to_string()));
        }
        body.summary(city)
            .ok_or_else(|| ProviderError::Decode("weather response missing readings".into()))
    }
}
