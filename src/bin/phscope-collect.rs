use anyhow::{Context, Result};
use clap::Parser;
use log::error;

use phscope::config::{init_logging, CollectorConfig, SourceKind};
use phscope::drivers::{SimulatedSource, TinkerforgeSource, VoltageSource};
use phscope::engine::{interrupted, Collector};
use phscope::pubsub::MqttPublisher;
use phscope::recorder::SeriesLog;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let config = CollectorConfig::parse();
    config.validate()?;

    let source: Box<dyn VoltageSource> = match config.source {
        SourceKind::Tinkerforge => {
            let source =
                TinkerforgeSource::connect(&config.host, config.port, &config.uid, config.timeout())
                    .map_err(|e| {
                        error!("{e}");
                        e
                    })
                    .context("voltage source unavailable")?;
            Box::new(source)
        }
        SourceKind::Simulated => Box::new(SimulatedSource::default()),
    };
    let log = SeriesLog::open(config.log_path())?;

    let mut collector = Collector::new(source, log, config.calibration(), config.interval());
    if config.publish {
        let publisher = MqttPublisher::spawn(&config.broker.broker());
        collector = collector.with_publisher(Box::new(publisher));
    }
    collector.run(interrupted()).await?;
    Ok(())
}
