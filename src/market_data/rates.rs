use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, warn};

/// The reference currency every price is normalized into.
pub const BASE_CURRENCY: &str = "USD";
pub const MAXIMUM_RECONNECTIONS: u32 = 3;
pub const PAUSE_BETWEEN_RECONNECTIONS: Duration = Duration::from_secs(3);

/// Outcome of a single rate lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateQuote {
    /// Converts 1 unit of the requested currency into the base currency.
    Rate(f64),
    /// The server answered but signalled an error; worth retrying.
    Unavailable,
}

/// One external lookup per call; retrying is the resolver's job.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rate(&self, currency: &str) -> anyhow::Result<RateQuote>;
}

/// Caching exchange-rate resolver.
///
/// The base currency is 1.0 by definition and never hits the source. Every
/// other currency is looked up at most once per run; a server-signalled error
/// is retried up to [`MAXIMUM_RECONNECTIONS`] times with a pause in between,
/// after which the currency resolves to 0.0 ("no valid rate"). Transport
/// failures resolve to 0.0 immediately.
pub struct RateResolver<S> {
    source: S,
    cache: HashMap<String, f64>,
}

impl<S: RateSource> RateResolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    pub async fn resolve(&mut self, currency: &str) -> f64 {
        if currency == BASE_CURRENCY {
            return 1.0;
        }
        if let Some(&rate) = self.cache.get(currency) {
            debug!(currency, rate, "exchange rate served from cache");
            return rate;
        }

        let rate = self.lookup(currency).await;
        self.cache.insert(currency.to_string(), rate);
        rate
    }

    async fn lookup(&self, currency: &str) -> f64 {
        let mut times_reconnected = 0u32;

        loop {
            match self.source.fetch_rate(currency).await {
                Ok(RateQuote::Rate(rate)) => {
                    debug!(currency, rate, "resolved exchange rate");
                    return rate;
                }
                Ok(RateQuote::Unavailable) => {
                    if times_reconnected >= MAXIMUM_RECONNECTIONS {
                        error!(currency, "could not obtain exchange rate, returning default value");
                        return 0.0;
                    }
                    times_reconnected += 1;
                    warn!(currency, times_reconnected, "server signalizes an error, repeating request");
                    tokio::time::sleep(PAUSE_BETWEEN_RECONNECTIONS).await;
                }
                Err(err) => {
                    error!(currency, error = %err, "exchange rate request failed");
                    return 0.0;
                }
            }
        }
    }
}

/// FX-conversion JSON API over `reqwest`.
pub struct HttpRateSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    #[serde(default)]
    success: bool,
    result: Option<f64>,
}

impl HttpRateSource {
    pub fn new() -> Self {
        Self::with_base_url("https://api.exchangerate.host/convert")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for HttpRateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rate(&self, currency: &str) -> anyhow::Result<RateQuote> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("from", currency), ("to", BASE_CURRENCY), ("amount", "1")])
            .send()
            .await?
            .error_for_status()?;

        let body: ConvertResponse = response.json().await?;
        match body.result {
            Some(rate) if body.success => Ok(RateQuote::Rate(rate)),
            _ => Ok(RateQuote::Unavailable),
        }
    }
}
