//! Sample ingestion: read, timestamp, calibrate, persist, publish, sleep.

use std::future::Future;
use std::time::Duration;

use chrono::Local;
use log::{error, info, warn};
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::calibration::Calibration;
use crate::drivers::{SourceError, VoltageSource};
use crate::pubsub::{SamplePayload, SamplePublisher};
use crate::recorder::{LogError, SeriesLog};
use crate::types::{format_timestamp, Sample};

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for interrupts: {e}");
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Log(#[from] LogError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub samples_written: u64,
    pub publish_failures: u64,
}

/// Ingestion loop around one voltage source and one Series Log.
pub struct Collector<S: VoltageSource> {
    source: S,
    log: SeriesLog,
    calibration: Calibration,
    publisher: Option<Box<dyn SamplePublisher>>,
    interval: Duration,
    stats: CollectStats,
}

impl<S: VoltageSource> Collector<S> {
    pub fn new(source: S, log: SeriesLog, calibration: Calibration, interval: Duration) -> Self {
        Self {
            source,
            log,
            calibration,
            publisher: None,
            interval,
            stats: CollectStats::default(),
        }
    }

    pub fn with_publisher(mut self, publisher: Box<dyn SamplePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn stats(&self) -> CollectStats {
        self.stats
    }

    /// One loop body. The row is on disk before publishing is attempted.
    pub fn sample_once(&mut self) -> Result<Sample, CollectError> {
        let millivolts = self.source.read_millivolts()?;
        let time = Local::now();
        let sample = Sample::new(time, millivolts, self.calibration.transform(millivolts));
        self.log.append(&sample)?;
        self.stats.samples_written += 1;

        match sample.ph {
            Some(ph) => info!(
                "[{}] Voltage: {:.3} V, pH: {:.2}",
                format_timestamp(&time),
                millivolts / 1000.0,
                ph
            ),
            None => info!(
                "[{}] Voltage: {:.3} V",
                format_timestamp(&time),
                millivolts / 1000.0
            ),
        }

        if let Some(publisher) = self.publisher.as_mut() {
            if let Err(e) = publisher.publish(&SamplePayload::from(&sample)) {
                self.stats.publish_failures += 1;
                warn!("Publish failed, sample kept in {}: {e}", self.log.path().display());
            }
        }
        Ok(sample)
    }

    /// Samples every interval until `shutdown` resolves or a read fails.
    ///
    /// The source is disconnected and the publisher closed on every exit path.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), CollectError>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Collecting from {} every {:?} into {}",
            self.source.describe(),
            self.interval,
            self.log.path().display()
        );
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Interrupt received, stopping collection.");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sample_once() {
                        break Err(e);
                    }
                }
            }
        };

        self.source.disconnect();
        if let Some(publisher) = self.publisher.as_mut() {
            publisher.close();
        }
        info!(
            "Collector stopped after {} samples ({} publish failures).",
            self.stats.samples_written, self.stats.publish_failures
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::ManualSource;
    use crate::pubsub::PublishError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct Recording(Rc<RefCell<Vec<SamplePayload>>>, Rc<RefCell<bool>>);

    impl SamplePublisher for Recording {
        fn publish(&mut self, payload: &SamplePayload) -> Result<(), PublishError> {
            self.0.borrow_mut().push(payload.clone());
            Ok(())
        }

        fn close(&mut self) {
            *self.1.borrow_mut() = true;
        }
    }

    struct Failing;

    impl SamplePublisher for Failing {
        fn publish(&mut self, _: &SamplePayload) -> Result<(), PublishError> {
            Err(PublishError::Transport("broker unreachable".into()))
        }
    }

    fn collector(
        dir: &tempfile::TempDir,
        readings: Vec<f64>,
        calibration: Calibration,
    ) -> Collector<ManualSource> {
        let log = SeriesLog::open(dir.path().join("sensor.csv")).unwrap();
        Collector::new(
            ManualSource::new(readings),
            log,
            calibration,
            Duration::from_secs(1),
        )
    }

    fn rows(dir: &tempfile::TempDir) -> Vec<String> {
        std::fs::read_to_string(dir.path().join("sensor.csv"))
            .unwrap()
            .lines()
            .skip(1)
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn sample_is_calibrated_persisted_and_published() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Recording::default();
        let mut collector = collector(
            &dir,
            vec![1536.0],
            Calibration::two_point(1024.0, 2048.0, 4.0, 8.0),
        )
        .with_publisher(Box::new(sink.clone()));

        let sample = collector.sample_once().unwrap();
        assert_eq!(sample.ph, Some(6.0));
        assert!(rows(&dir)[0].ends_with(",1536,6"));
        let published = sink.0.borrow();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].value_mv, 1536.0);
        assert_eq!(published[0].ph, Some(6.0));
    }

    #[test]
    fn partial_calibration_writes_empty_ph() {
        let dir = tempfile::tempdir().unwrap();
        let partial = Calibration::new(Some(1000.0), None, Some(4.0), Some(10.0));
        let mut collector = collector(&dir, vec![1500.0], partial);
        assert_eq!(collector.sample_once().unwrap().ph, None);
        assert!(rows(&dir)[0].ends_with(",1500,"));
    }

    #[test]
    fn publish_failure_does_not_stop_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = collector(&dir, vec![1.0, 2.0], Calibration::default())
            .with_publisher(Box::new(Failing));
        collector.sample_once().unwrap();
        collector.sample_once().unwrap();
        assert_eq!(rows(&dir).len(), 2);
        assert_eq!(
            collector.stats(),
            CollectStats {
                samples_written: 2,
                publish_failures: 2
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_samples_each_interval_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Recording::default();
        let mut collector = collector(&dir, vec![10.0; 10], Calibration::default())
            .with_publisher(Box::new(sink.clone()));

        // ticks at 0s, 1s and 2s; the interrupt lands at 2.5s
        collector
            .run(tokio::time::sleep(Duration::from_millis(2500)))
            .await
            .unwrap();
        assert_eq!(collector.stats().samples_written, 3);
        assert_eq!(rows(&dir).len(), 3);
        assert!(!collector.source().is_connected());
        assert!(*sink.1.borrow());
    }

    #[tokio::test]
    async fn immediate_interrupt_releases_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = collector(&dir, vec![10.0], Calibration::default());
        collector.run(std::future::ready(())).await.unwrap();
        assert_eq!(collector.stats().samples_written, 0);
        assert!(!collector.source().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn read_failure_is_fatal_but_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = collector(&dir, vec![10.0, 20.0], Calibration::default());
        let result = collector.run(std::future::pending()).await;
        assert!(matches!(
            result,
            Err(CollectError::Source(SourceError::Exhausted))
        ));
        assert_eq!(rows(&dir).len(), 2);
        assert!(!collector.source().is_connected());
    }
}
