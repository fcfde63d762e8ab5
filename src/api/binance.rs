use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::api::rate_limit::RateLimiter;
use crate::api::types::{ExchangeInfo, RawKline, SymbolInfo};
use crate::api::MarketDataProvider;
use crate::config::ExchangeConfig;
use crate::error::{Error, Result};
use crate::models::Pair;

const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct BinanceClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    max_retries: u32,
    rate_limiter: RateLimiter,
}

impl BinanceClient {
    pub fn new(config: &ExchangeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            rate_limiter: RateLimiter::new(
                config.max_requests_per_minute,
                RATE_LIMIT_WINDOW,
                Duration::from_millis(config.request_delay_ms),
            ),
        })
    }

    fn backoff(retry_count: u32) -> Duration {
        Duration::from_secs(2u64.pow(retry_count.min(6)))
    }

    async fn make_request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut retry_count = 0;

        loop {
            self.rate_limiter.acquire().await;

            let mut request = self.client.get(&url).query(params);
            if let Some(key) = &self.api_key {
                request = request.header(API_KEY_HEADER, key);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if retry_count < self.max_retries => {
                    retry_count += 1;
                    let wait = Self::backoff(retry_count);
                    warn!(
                        "Request to {} failed ({}), retry {}/{} in {}s",
                        endpoint,
                        e,
                        retry_count,
                        self.max_retries,
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status.is_success() {
                return response.json::<T>().await.map_err(|e| {
                    error!("Failed to parse {} response: {}", endpoint, e);
                    Error::ApiInvalidFormat(format!("Failed to parse response: {}", e))
                });
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS
                || status.as_u16() == 418
                || status.is_server_error();
            if retryable && retry_count < self.max_retries {
                retry_count += 1;
                let wait = Self::backoff(retry_count);
                warn!(
                    "{} returned {}, backing off for {} seconds...",
                    endpoint,
                    status,
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                418 | 429 => Error::RateLimitExceeded(format!("{} returned {}", endpoint, status)),
                400 => Error::ApiInvalidData(format!("{} rejected request: {}", endpoint, body)),
                _ => {
                    let error_msg = format!("API request failed with status: {} ({})", status, body);
                    error!("{}", error_msg);
                    Error::ApiError(error_msg)
                }
            });
        }
    }
}

#[async_trait]
impl MarketDataProvider for BinanceClient {
    async fn exchange_metadata(&self) -> Result<Vec<SymbolInfo>> {
        let info: ExchangeInfo = self.make_request("api/v3/exchangeInfo", &[]).await?;
        info!("Fetched exchange metadata: {} symbols", info.symbols.len());
        Ok(info.symbols)
    }

    async fn klines(
        &self,
        pair: &Pair,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RawKline>> {
        // The exchange treats endTime as inclusive.
        let params = [
            ("symbol", pair.symbol()),
            ("interval", interval.to_string()),
            ("startTime", start.timestamp_millis().to_string()),
            ("endTime", (end.timestamp_millis() - 1).to_string()),
            ("limit", limit.to_string()),
        ];
        let klines: Vec<RawKline> = self.make_request("api/v3/klines", &params).await?;
        debug!("{}: {} kline(s) for {} - {}", pair, klines.len(), start, end);
        Ok(klines)
    }
}
