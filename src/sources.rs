//! sources.rs - Quote source definitions and the fallback price fetcher
//!
//! Each source is an endpoint URL plus a rule describing where the
//! price lives in the response body. Sources are tried strictly in
//! priority order; the first one that yields a usable number wins.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// How many decimal places a price keeps after normalization.
///
/// Prices are rounded before any comparison so equality checks are
/// exact rather than floating-point-fuzzy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Round to whole dollars (the default).
    Dollars,
    /// Round to cents.
    Cents,
}

impl Precision {
    fn decimal_places(&self) -> u32 {
        match self {
            Precision::Dollars => 0,
            Precision::Cents => 2,
        }
    }

    /// Round a raw price to this precision and pin its scale so the
    /// formatted output is stable ($42,000 vs $42,000.00).
    pub fn normalize(&self, price: Decimal) -> Decimal {
        let mut rounded = price.round_dp(self.decimal_places());
        rounded.rescale(self.decimal_places());
        rounded
    }
}

/// The shape the price value takes inside a source's JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// A JSON number, e.g. `{"usd": 42000.5}`.
    Number,
    /// A numeric string, e.g. `{"price": "42000.50"}`.
    Text,
}

/// Rule for pulling a price out of a parsed response body.
#[derive(Debug, Clone)]
pub struct ExtractRule {
    /// JSON pointer to the price field, e.g. `/data/amount`.
    pub pointer: String,
    pub shape: ValueShape,
}

impl ExtractRule {
    pub fn number(pointer: &str) -> Self {
        ExtractRule {
            pointer: pointer.to_string(),
            shape: ValueShape::Number,
        }
    }

    pub fn text(pointer: &str) -> Self {
        ExtractRule {
            pointer: pointer.to_string(),
            shape: ValueShape::Text,
        }
    }

    /// Apply the rule to a response body.
    pub fn apply(&self, body: &Value) -> anyhow::Result<Decimal> {
        let field = body
            .pointer(&self.pointer)
            .ok_or_else(|| anyhow::anyhow!("missing field at {}", self.pointer))?;

        let price = match self.shape {
            ValueShape::Number => {
                let n = field
                    .as_f64()
                    .ok_or_else(|| anyhow::anyhow!("field at {} is not a number", self.pointer))?;
                Decimal::from_str(&n.to_string())
                    .map_err(|e| anyhow::anyhow!("unparseable number at {}: {}", self.pointer, e))?
            }
            ValueShape::Text => {
                let s = field
                    .as_str()
                    .ok_or_else(|| anyhow::anyhow!("field at {} is not a string", self.pointer))?;
                Decimal::from_str(s)
                    .map_err(|e| anyhow::anyhow!("unparseable price at {}: {}", self.pointer, e))?
            }
        };

        if price <= Decimal::ZERO {
            return Err(anyhow::anyhow!("non-positive price: {}", price));
        }

        Ok(price)
    }
}

/// One entry in the fallback chain: a named endpoint plus its
/// extraction rule. Immutable, built once at startup.
#[derive(Debug, Clone)]
pub struct QuoteSource {
    pub name: String,
    pub endpoint: String,
    pub rule: ExtractRule,
}

impl QuoteSource {
    pub fn new(name: &str, endpoint: &str, rule: ExtractRule) -> Self {
        QuoteSource {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            rule,
        }
    }
}

/// Default fallback chain, most reliable first.
pub fn default_sources() -> Vec<QuoteSource> {
    vec![
        QuoteSource::new(
            "Coinbase",
            "https://api.coinbase.com/v2/prices/BTC-USD/spot",
            ExtractRule::text("/data/amount"),
        ),
        QuoteSource::new(
            "Blockchain.info",
            "https://blockchain.info/ticker",
            ExtractRule::number("/USD/last"),
        ),
        QuoteSource::new(
            "CoinGecko",
            "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd",
            ExtractRule::number("/bitcoin/usd"),
        ),
        QuoteSource::new(
            "Binance",
            "https://api.binance.com/api/v3/ticker/price?symbol=BTCUSDT",
            ExtractRule::text("/price"),
        ),
        QuoteSource::new(
            "CoinDesk",
            "https://api.coindesk.com/v1/bpi/currentprice/BTC.json",
            ExtractRule::number("/bpi/USD/rate_float"),
        ),
    ]
}

// ============================================================================
// Transport - the HTTP collaborator
// ============================================================================

/// Trait over the HTTP layer so the fetcher can be driven by a stub in
/// tests. One bounded-timeout GET, parsed as JSON.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> anyhow::Result<Value>;
}

/// Production transport backed by reqwest. The per-request timeout is
/// baked into the client at construction.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        HttpTransport { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> anyhow::Result<Value> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("status {}", response.status()));
        }

        Ok(response.json().await?)
    }
}

// ============================================================================
// PriceFetcher - ordered fallback over the source chain
// ============================================================================

/// Tries each quote source in priority order and returns the first
/// successfully extracted price, normalized to the configured
/// precision. Per-source failures are logged and swallowed.
pub struct PriceFetcher<T: Transport> {
    transport: T,
    sources: Vec<QuoteSource>,
    precision: Precision,
}

impl<T: Transport> PriceFetcher<T> {
    pub fn new(transport: T, sources: Vec<QuoteSource>, precision: Precision) -> Self {
        PriceFetcher {
            transport,
            sources,
            precision,
        }
    }

    /// Fetch the current spot price. `None` means every source failed
    /// this cycle - a valid negative result, not an error.
    pub async fn fetch(&self) -> Option<Decimal> {
        for source in &self.sources {
            debug!("Trying {} ({})", source.name, source.endpoint);

            match self.try_source(source).await {
                Ok(price) => {
                    let price = self.precision.normalize(price);
                    info!("Price from {}: {}", source.name, price);
                    return Some(price);
                }
                Err(e) => {
                    warn!("{} failed: {:#}", source.name, e);
                }
            }
        }

        error!("All {} quote sources failed", self.sources.len());
        None
    }

    async fn try_source(&self, source: &QuoteSource) -> anyhow::Result<Decimal> {
        let body = self.transport.get_json(&source.endpoint).await?;
        source.rule.apply(&body)
    }
}
