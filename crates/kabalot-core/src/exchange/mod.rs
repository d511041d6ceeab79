//! Exchange rates to the local currency at the invoice date.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::error::NormalizationError;
use crate::models::config::{ExchangeConfig, ExchangeProvider};

pub type Result<T> = std::result::Result<T, NormalizationError>;

/// A source of exchange rates.
#[async_trait]
pub trait ExchangeRates: Send + Sync {
    /// Units of `local` per one unit of `currency` at `date` (latest when unknown).
    ///
    /// `Ok(None)` means the source has no rate for the pair.
    async fn rate(
        &self,
        currency: &str,
        local: &str,
        date: Option<NaiveDate>,
    ) -> Result<Option<Decimal>>;
}

/// Build the configured rate source.
pub fn from_config(config: &ExchangeConfig) -> Result<Arc<dyn ExchangeRates>> {
    Ok(match config.provider {
        ExchangeProvider::Fixed => Arc::new(FixedRates::new(config.rates.clone())),
        ExchangeProvider::Frankfurter => Arc::new(FrankfurterRates::new(&config.endpoint)?),
    })
}

/// Static rate table, independent of date.
#[derive(Debug, Clone, Default)]
pub struct FixedRates {
    rates: BTreeMap<String, Decimal>,
}

impl FixedRates {
    pub fn new(rates: BTreeMap<String, Decimal>) -> Self {
        let rates = rates
            .into_iter()
            .map(|(code, rate)| (code.to_ascii_uppercase(), rate))
            .collect();
        Self { rates }
    }

    pub fn with_rate(mut self, currency: &str, rate: Decimal) -> Self {
        self.rates.insert(currency.to_ascii_uppercase(), rate);
        self
    }
}

#[async_trait]
impl ExchangeRates for FixedRates {
    async fn rate(
        &self,
        currency: &str,
        local: &str,
        _date: Option<NaiveDate>,
    ) -> Result<Option<Decimal>> {
        if currency.eq_ignore_ascii_case(local) {
            return Ok(Some(Decimal::ONE));
        }
        Ok(self.rates.get(&currency.to_ascii_uppercase()).copied())
    }
}

#[derive(Debug, Deserialize)]
struct FrankfurterResponse {
    rates: BTreeMap<String, serde_json::Value>,
}

/// Historical rates from a Frankfurter-compatible API.
pub struct FrankfurterRates {
    client: Client,
    base_url: String,
}

impl FrankfurterRates {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NormalizationError::ExchangeRate(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ExchangeRates for FrankfurterRates {
    async fn rate(
        &self,
        currency: &str,
        local: &str,
        date: Option<NaiveDate>,
    ) -> Result<Option<Decimal>> {
        let day = date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "latest".to_string());
        let url = format!("{}/{}", self.base_url, day);
        debug!(%url, currency, local, "Looking up exchange rate");

        let response = self
            .client
            .get(&url)
            .query(&[("from", currency), ("to", local)])
            .send()
            .await
            .map_err(|e| NormalizationError::ExchangeRate(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(NormalizationError::ExchangeRate(format!(
                "rates API returned {}",
                response.status()
            )));
        }

        let body: FrankfurterResponse = response
            .json()
            .await
            .map_err(|e| NormalizationError::ExchangeRate(e.to_string()))?;

        Ok(body
            .rates
            .get(local)
            .and_then(|v| match v {
                serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
                serde_json::Value::String(s) => Decimal::from_str(s).ok(),
                _ => None,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fixed_rates() {
        let rates = FixedRates::default().with_rate("usd", Decimal::from_str("3.7").unwrap());
        assert_eq!(
            rates.rate("USD", "ILS", None).await.unwrap(),
            Some(Decimal::from_str("3.7").unwrap())
        );
        assert_eq!(rates.rate("EUR", "ILS", None).await.unwrap(), None);
        assert_eq!(rates.rate("ils", "ILS", None).await.unwrap(), Some(Decimal::ONE));
    }

    #[tokio::test]
    async fn test_frankfurter_rate_at_date() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/2024-03-05")
                    .query_param("from", "USD")
                    .query_param("to", "ILS");
                then.status(200).json_body(json!({
                    "amount": 1.0,
                    "base": "USD",
                    "date": "2024-03-05",
                    "rates": {"ILS": 3.6123}
                }));
            })
            .await;

        let rates = FrankfurterRates::new(&server.base_url()).unwrap();
        let rate = rates
            .rate("USD", "ILS", NaiveDate::from_ymd_opt(2024, 3, 5))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(rate, Some(Decimal::from_str("3.6123").unwrap()));
    }

    #[tokio::test]
    async fn test_frankfurter_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/latest");
                then.status(500);
            })
            .await;

        let rates = FrankfurterRates::new(&server.base_url()).unwrap();
        assert!(matches!(
            rates.rate("USD", "ILS", None).await,
            Err(NormalizationError::ExchangeRate(_))
        ));
    }
}
