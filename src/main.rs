//! main.rs - Entry point for BTC Radar
//!
//! Loads configuration, builds the fetcher and the Telegram messenger,
//! then runs the poll loop until interrupted. A missing bot token
//! aborts before the loop with a non-zero exit; everything after that
//! is non-fatal and handled cycle by cycle.

use btc_radar::{
    poll, Config, HttpTransport, PollTiming, PriceFetcher, PublisherGate, TelegramBot, NAME,
    VERSION,
};
use log::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    info!("Starting {} v{}", NAME, VERSION);

    let config = Config::from_env()?;

    info!("Channel: {}", config.channel);
    info!(
        "Polling every {}s ({})",
        config.interval.as_secs(),
        if config.align_to_clock {
            "wall-clock aligned"
        } else {
            "fixed interval"
        }
    );
    info!(
        "Source chain: {}",
        config
            .sources
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let transport = HttpTransport::new(config.request_timeout);
    let fetcher = PriceFetcher::new(transport, config.sources.clone(), config.precision);
    let messenger = TelegramBot::new(&config.bot_token, config.request_timeout);
    let mut gate = PublisherGate::new(config.min_delta);

    let timing = PollTiming::from_config(config.interval, config.align_to_clock);

    // The interrupt listener is armed once, before the loop, so a
    // signal arriving while a cycle is in flight is still delivered
    // at the next select instead of being dropped with the old
    // listener.
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received - shutting down"),
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    };

    let cycles = poll::run_loop(
        &fetcher,
        &mut gate,
        &messenger,
        &config.channel,
        timing,
        shutdown,
    )
    .await;

    // Dropping the clients here closes their connection pools.
    info!("Shutdown complete after {} cycles", cycles);
    Ok(())
}
