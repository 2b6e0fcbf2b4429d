//! config.rs - Environment-driven configuration
//!
//! Every option has a default except the bot token; a missing token is
//! a fatal startup error. Loading goes through an injected lookup so
//! tests never touch the real environment.

use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::sources::{default_sources, ExtractRule, Precision, QuoteSource};

const DEFAULT_CHANNEL: &str = "@BtcRadars";
const DEFAULT_INTERVAL_SECONDS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BOT_TOKEN is not set")]
    MissingToken,

    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

fn invalid(name: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
    }
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub channel: String,
    pub interval: Duration,
    pub align_to_clock: bool,
    pub precision: Precision,
    pub min_delta: Option<Decimal>,
    pub request_timeout: Duration,
    pub sources: Vec<QuoteSource>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| std::env::var(key).ok())
    }

    pub fn load(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = get("BOT_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let channel = get("CHANNEL_USERNAME").unwrap_or_else(|| DEFAULT_CHANNEL.to_string());

        let interval_secs = match get("INTERVAL_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| invalid("INTERVAL_SECONDS", &raw))?,
            None => DEFAULT_INTERVAL_SECONDS,
        };

        let align_to_clock = match get("ALIGN_TO_CLOCK") {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(invalid("ALIGN_TO_CLOCK", &raw)),
            },
            None => false,
        };

        let precision = match get("PRICE_PRECISION") {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "dollars" => Precision::Dollars,
                "cents" => Precision::Cents,
                _ => return Err(invalid("PRICE_PRECISION", &raw)),
            },
            None => Precision::Dollars,
        };

        let min_delta = match get("MIN_DELTA") {
            Some(raw) => {
                let delta = Decimal::from_str(&raw)
                    .ok()
                    .filter(|d| *d > Decimal::ZERO)
                    .ok_or_else(|| invalid("MIN_DELTA", &raw))?;
                Some(delta)
            }
            None => None,
        };

        let timeout_secs = match get("REQUEST_TIMEOUT_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| invalid("REQUEST_TIMEOUT_SECONDS", &raw))?,
            None => DEFAULT_REQUEST_TIMEOUT_SECONDS,
        };

        let sources = match get("QUOTE_SOURCES") {
            Some(raw) => parse_sources(&raw)?,
            None => default_sources(),
        };

        Ok(Config {
            bot_token,
            channel,
            interval: Duration::from_secs(interval_secs),
            align_to_clock,
            precision,
            min_delta,
            request_timeout: Duration::from_secs(timeout_secs),
            sources,
        })
    }
}

/// Parse a source-chain override: `name|url|pointer[|text]` entries
/// joined with `;`. The optional fourth field marks string-encoded
/// prices; the default is a JSON number.
fn parse_sources(raw: &str) -> Result<Vec<QuoteSource>, ConfigError> {
    let mut sources = Vec::new();

    for entry in raw.split(';').filter(|e| !e.trim().is_empty()) {
        let fields: Vec<&str> = entry.trim().split('|').collect();

        let (name, url, pointer, shape) = match fields.as_slice() {
            [name, url, pointer] => (*name, *url, *pointer, "number"),
            [name, url, pointer, shape] => (*name, *url, *pointer, *shape),
            _ => return Err(invalid("QUOTE_SOURCES", entry)),
        };

        if name.is_empty() || url.is_empty() || !pointer.starts_with('/') {
            return Err(invalid("QUOTE_SOURCES", entry));
        }

        let rule = match shape {
            "number" => ExtractRule::number(pointer),
            "text" => ExtractRule::text(pointer),
            _ => return Err(invalid("QUOTE_SOURCES", entry)),
        };

        sources.push(QuoteSource::new(name, url, rule));
    }

    if sources.is_empty() {
        return Err(invalid("QUOTE_SOURCES", raw));
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::ValueShape;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::load(|key| map.get(key).cloned())
    }

    #[test]
    fn missing_token_is_fatal() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingToken)));
        assert!(matches!(
            load(&[("BOT_TOKEN", "")]),
            Err(ConfigError::MissingToken)
        ));
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = load(&[("BOT_TOKEN", "123:abc")]).unwrap();

        assert_eq!(config.channel, "@BtcRadars");
        assert_eq!(config.interval, Duration::from_secs(30));
        assert!(!config.align_to_clock);
        assert_eq!(config.precision, Precision::Dollars);
        assert_eq!(config.min_delta, None);
        assert_eq!(config.request_timeout, Duration::from_secs(8));
        assert_eq!(config.sources.len(), 5);
        assert_eq!(config.sources[0].name, "Coinbase");
    }

    #[test]
    fn overrides_are_honored() {
        let config = load(&[
            ("BOT_TOKEN", "123:abc"),
            ("CHANNEL_USERNAME", "@PriceWatch"),
            ("INTERVAL_SECONDS", "60"),
            ("ALIGN_TO_CLOCK", "true"),
            ("PRICE_PRECISION", "cents"),
            ("MIN_DELTA", "0.01"),
            ("REQUEST_TIMEOUT_SECONDS", "10"),
        ])
        .unwrap();

        assert_eq!(config.channel, "@PriceWatch");
        assert_eq!(config.interval, Duration::from_secs(60));
        assert!(config.align_to_clock);
        assert_eq!(config.precision, Precision::Cents);
        assert_eq!(config.min_delta, Some(dec!(0.01)));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn bad_values_are_rejected() {
        let base = ("BOT_TOKEN", "123:abc");

        assert!(load(&[base, ("INTERVAL_SECONDS", "0")]).is_err());
        assert!(load(&[base, ("INTERVAL_SECONDS", "soon")]).is_err());
        assert!(load(&[base, ("ALIGN_TO_CLOCK", "maybe")]).is_err());
        assert!(load(&[base, ("PRICE_PRECISION", "satoshis")]).is_err());
        assert!(load(&[base, ("MIN_DELTA", "-1")]).is_err());
    }

    #[test]
    fn source_chain_override_parses() {
        let config = load(&[
            ("BOT_TOKEN", "123:abc"),
            (
                "QUOTE_SOURCES",
                "Kraken|https://api.kraken.com/spot|/result/last|text;\
                 Gecko|https://gecko.example/price|/bitcoin/usd",
            ),
        ])
        .unwrap();

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "Kraken");
        assert_eq!(config.sources[0].rule.shape, ValueShape::Text);
        assert_eq!(config.sources[1].rule.pointer, "/bitcoin/usd");
        assert_eq!(config.sources[1].rule.shape, ValueShape::Number);
    }

    #[test]
    fn malformed_source_chain_is_rejected() {
        let base = ("BOT_TOKEN", "123:abc");

        assert!(load(&[base, ("QUOTE_SOURCES", "just-a-name")]).is_err());
        assert!(load(&[base, ("QUOTE_SOURCES", "A|http://a|no-slash")]).is_err());
        assert!(load(&[base, ("QUOTE_SOURCES", "A|http://a|/p|hex")]).is_err());
        assert!(load(&[base, ("QUOTE_SOURCES", " ; ")]).is_err());
    }
}
