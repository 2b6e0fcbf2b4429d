//! publisher.rs - Change detection and delivery of price updates
//!
//! The gate remembers the last price it successfully delivered and
//! only publishes when the freshly fetched price differs. State only
//! advances on confirmed delivery, so a failed send is retried
//! naturally by the next differing fetch.

use async_trait::async_trait;
use log::{error, info};
use rust_decimal::Decimal;

/// Markup mode for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    Plain,
    Html,
}

/// Trait over the messaging channel so the gate can be unit tested
/// against a recording mock.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, channel: &str, text: &str, markup: Markup) -> anyhow::Result<()>;
}

/// Format a price as a display string: `$` prefix, thousands
/// separators, any fractional part kept as-is.
pub fn format_usd(price: Decimal) -> String {
    let raw = price.to_string();
    let (sign, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{}${}.{}", sign, grouped, f),
        None => format!("{}${}", sign, grouped),
    }
}

/// What happened to one fetched price at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Delivered and remembered.
    Published,
    /// Same as the last published price; no send attempted.
    Unchanged,
    /// Send attempted and rejected; state not advanced.
    DeliveryFailed,
}

/// The publish gate. Owns the single piece of mutable state in the
/// process: the last successfully published price. Resets to unknown
/// on every process start.
pub struct PublisherGate {
    last_published: Option<Decimal>,
    min_delta: Option<Decimal>,
}

impl PublisherGate {
    pub fn new(min_delta: Option<Decimal>) -> Self {
        PublisherGate {
            last_published: None,
            min_delta,
        }
    }

    pub fn last_published(&self) -> Option<Decimal> {
        self.last_published
    }

    /// Publish iff nothing has been published this run, or the new
    /// price differs from the last published one. With a configured
    /// minimum delta the comparison becomes an absolute-delta
    /// threshold instead of exact inequality.
    pub fn should_publish(&self, price: Decimal) -> bool {
        match self.last_published {
            None => true,
            Some(last) => match self.min_delta {
                None => price != last,
                Some(delta) => (price - last).abs() >= delta,
            },
        }
    }

    /// Run one fetched price through the gate: decide, format, send,
    /// and advance state only on confirmed delivery.
    pub async fn process<M: Messenger + ?Sized>(
        &mut self,
        messenger: &M,
        channel: &str,
        price: Decimal,
    ) -> PublishOutcome {
        if !self.should_publish(price) {
            info!("Price unchanged at {} - skipping", format_usd(price));
            return PublishOutcome::Unchanged;
        }

        let text = format!("<b>{}</b>", format_usd(price));

        match messenger.send(channel, &text, Markup::Html).await {
            Ok(()) => {
                match self.last_published {
                    Some(last) => info!(
                        "Published {} -> {}",
                        format_usd(last),
                        format_usd(price)
                    ),
                    None => info!("Published first price {}", format_usd(price)),
                }
                self.last_published = Some(price);
                PublishOutcome::Published
            }
            Err(e) => {
                error!("Delivery to {} failed: {:#}", channel, e);
                PublishOutcome::DeliveryFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Recording messenger; `fail` makes every send report a delivery
    /// error without touching the recorded log.
    struct MockMessenger {
        fail: bool,
        sent: Mutex<Vec<(String, String, Markup)>>,
    }

    impl MockMessenger {
        fn new(fail: bool) -> Self {
            MockMessenger {
                fail,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<(String, String, Markup)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Messenger for MockMessenger {
        async fn send(&self, channel: &str, text: &str, markup: Markup) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow::anyhow!("delivery timed out"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((channel.to_string(), text.to_string(), markup));
            Ok(())
        }
    }

    #[test]
    fn formats_with_thousands_separators() {
        assert_eq!(format_usd(dec!(42000)), "$42,000");
        assert_eq!(format_usd(dec!(1234567)), "$1,234,567");
        assert_eq!(format_usd(dec!(999)), "$999");
        assert_eq!(format_usd(dec!(42150.25)), "$42,150.25");
    }

    #[test]
    fn negative_amounts_keep_the_sign_outside_the_grouping() {
        assert_eq!(format_usd(dec!(-1234.50)), "-$1,234.50");
        assert_eq!(format_usd(dec!(-999)), "-$999");
        assert_eq!(format_usd(dec!(-1000000)), "-$1,000,000");
    }

    #[tokio::test]
    async fn first_price_is_always_published() {
        let messenger = MockMessenger::new(false);
        let mut gate = PublisherGate::new(None);

        let outcome = gate.process(&messenger, "@BtcRadars", dec!(42000)).await;

        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(gate.last_published(), Some(dec!(42000)));

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "@BtcRadars");
        assert_eq!(sent[0].1, "<b>$42,000</b>");
        assert_eq!(sent[0].2, Markup::Html);
    }

    #[tokio::test]
    async fn unchanged_price_is_not_sent() {
        let messenger = MockMessenger::new(false);
        let mut gate = PublisherGate::new(None);

        gate.process(&messenger, "@c", dec!(42000)).await;
        let outcome = gate.process(&messenger, "@c", dec!(42000)).await;

        assert_eq!(outcome, PublishOutcome::Unchanged);
        assert_eq!(messenger.sent().len(), 1);
        assert_eq!(gate.last_published(), Some(dec!(42000)));
    }

    #[tokio::test]
    async fn changed_price_advances_state() {
        let messenger = MockMessenger::new(false);
        let mut gate = PublisherGate::new(None);

        gate.process(&messenger, "@c", dec!(42000)).await;
        let outcome = gate.process(&messenger, "@c", dec!(42150)).await;

        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(gate.last_published(), Some(dec!(42150)));
        assert_eq!(messenger.sent().len(), 2);
    }

    #[tokio::test]
    async fn failed_delivery_leaves_state_untouched_and_retries() {
        let failing = MockMessenger::new(true);
        let working = MockMessenger::new(false);
        let mut gate = PublisherGate::new(None);

        gate.process(&working, "@c", dec!(42000)).await;

        // Send rejected: remembered price stays at 42000.
        let outcome = gate.process(&failing, "@c", dec!(42150)).await;
        assert_eq!(outcome, PublishOutcome::DeliveryFailed);
        assert_eq!(gate.last_published(), Some(dec!(42000)));

        // Identical fetch next cycle still differs from 42000, so it
        // is attempted again and now goes through.
        let outcome = gate.process(&working, "@c", dec!(42150)).await;
        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(gate.last_published(), Some(dec!(42150)));
    }

    #[tokio::test]
    async fn min_delta_threshold_suppresses_small_moves() {
        let messenger = MockMessenger::new(false);
        let mut gate = PublisherGate::new(Some(dec!(50)));

        gate.process(&messenger, "@c", dec!(42000)).await;

        // 42030 is within the 50-dollar threshold.
        let outcome = gate.process(&messenger, "@c", dec!(42030)).await;
        assert_eq!(outcome, PublishOutcome::Unchanged);
        assert_eq!(gate.last_published(), Some(dec!(42000)));

        // 42050 meets the threshold exactly.
        let outcome = gate.process(&messenger, "@c", dec!(42050)).await;
        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(gate.last_published(), Some(dec!(42050)));
    }
}
