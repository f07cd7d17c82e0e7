use anyhow::Result;
use clap::Parser;
use log::info;

use phscope::config::{init_logging, RelayConfig};
use phscope::engine::interrupted;
use phscope::pubsub::MqttSubscription;
use phscope::recorder::SeriesLog;
use phscope::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let config = RelayConfig::parse();
    config.validate()?;

    let mut relay = Relay::new(SeriesLog::open(&config.csv_file)?);
    let (subscription, mut messages) = MqttSubscription::start(&config.broker.broker());
    info!("Waiting for samples on '{}'", subscription.channel());
    relay.run(&mut messages, interrupted()).await;
    subscription.close(messages).await;
    Ok(())
}
