//! BTC Radar - change-gated Bitcoin price updates for a Telegram channel
//!
//! Polls an ordered fallback chain of public spot-price APIs and posts
//! a formatted update whenever the price moves relative to the last
//! update it successfully delivered.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Poll Loop                         │
//! │  (fixed interval or wall-clock aligned, forever)     │
//! └────────────────────────┬────────────────────────────┘
//!                          │ one cycle
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                  PriceFetcher                        │
//! │  Coinbase → Blockchain.info → CoinGecko → ...        │
//! │  (first extracted price wins, normalized)            │
//! └────────────────────────┬────────────────────────────┘
//!                          │ Option<price>
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                  PublisherGate                       │
//! │  publish iff changed; remember only on confirmed     │
//! │  delivery via the Messenger (Telegram Bot API)       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod poll;
pub mod publisher;
pub mod sources;
pub mod telegram;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use poll::{run_cycle, run_loop, PollTiming};
pub use publisher::{format_usd, Markup, Messenger, PublishOutcome, PublisherGate};
pub use sources::{
    default_sources, ExtractRule, HttpTransport, Precision, PriceFetcher, QuoteSource, Transport,
};
pub use telegram::TelegramBot;

/// Version of the bot
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the package
pub const NAME: &str = env!("CARGO_PKG_NAME");
