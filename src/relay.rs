//! Sample relay: pub/sub messages appended to a local Series Log.

use std::future::Future;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::pubsub::SamplePayload;
use crate::recorder::{LogError, SeriesLog};
use crate::types::Sample;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error(transparent)]
    Log(#[from] LogError),
}

pub struct Relay {
    log: SeriesLog,
    received: u64,
    rejected: u64,
}

impl Relay {
    pub fn new(log: SeriesLog) -> Self {
        Self {
            log,
            received: 0,
            rejected: 0,
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Decodes one message body and appends it as received; pH is never recomputed.
    pub fn handle_message(&mut self, body: &[u8]) -> Result<Sample, RelayError> {
        let payload =
            SamplePayload::from_json(body).map_err(|e| RelayError::Malformed(e.to_string()))?;
        let time = payload.time.clone();
        let sample = payload
            .into_sample()
            .ok_or_else(|| RelayError::Malformed(format!("unparseable time '{time}'")))?;
        self.log.append(&sample)?;
        Ok(sample)
    }

    /// Handles a message, logging and dropping anything that cannot be stored.
    pub fn accept(&mut self, body: &[u8]) {
        match self.handle_message(body) {
            Ok(sample) => {
                self.received += 1;
                debug!("Received {} mV at {}", sample.value, sample.time);
            }
            Err(e) => {
                self.rejected += 1;
                warn!("Dropping message: {e}");
            }
        }
    }

    /// Consumes messages until `shutdown` resolves or the feed closes.
    pub async fn run<F>(&mut self, messages: &mut mpsc::Receiver<Vec<u8>>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("Relaying messages into {}", self.log.path().display());
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Interrupt received, stopping relay.");
                    break;
                }
                message = messages.recv() => match message {
                    Some(body) => self.accept(&body),
                    None => {
                        warn!("Message feed closed.");
                        break;
                    }
                },
            }
        }
        info!(
            "Relay stopped after {} messages ({} dropped).",
            self.received, self.rejected
        );
    }
}
