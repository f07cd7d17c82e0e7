use std::collections::VecDeque;
use std::f64::consts::PI;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::drivers::SourceError;

/// Something that yields one raw voltage reading per call.
pub trait VoltageSource {
    /// Blocking read of the current voltage in millivolts.
    fn read_millivolts(&mut self) -> Result<f64, SourceError>;

    /// Releases the underlying connection. Further reads fail.
    fn disconnect(&mut self) {}

    /// Human readable name for logs.
    fn describe(&self) -> String;
}

impl<S: VoltageSource + ?Sized> VoltageSource for Box<S> {
    fn read_millivolts(&mut self) -> Result<f64, SourceError> {
        (**self).read_millivolts()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<f64>,
    connected: bool,
}

impl ManualSource {
    pub fn new(readings: impl IntoIterator<Item = f64>) -> Self {
        Self {
            queue: readings.into_iter().collect(),
            connected: true,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl VoltageSource for ManualSource {
    fn read_millivolts(&mut self) -> Result<f64, SourceError> {
        if !self.connected {
            return Err(SourceError::Disconnected);
        }
        self.queue.pop_front().ok_or(SourceError::Exhausted)
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn describe(&self) -> String {
        "manual source".to_owned()
    }
}

/// Slow sine around a baseline plus uniform noise, for running without hardware.
pub struct SimulatedSource {
    baseline_mv: f64,
    amplitude_mv: f64,
    period_secs: f64,
    noise_mv: f64,
    rng: StdRng,
    started_at: Instant,
}

impl SimulatedSource {
    pub fn new(baseline_mv: f64, amplitude_mv: f64, period_secs: f64, noise_mv: f64) -> Self {
        Self {
            baseline_mv,
            amplitude_mv,
            period_secs: period_secs.max(1.0),
            noise_mv: noise_mv.abs(),
            rng: StdRng::from_entropy(),
            started_at: Instant::now(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        // Roughly a pH electrode amplifier idling near neutral.
        Self::new(1750.0, 120.0, 600.0, 4.0)
    }
}

impl VoltageSource for SimulatedSource {
    fn read_millivolts(&mut self) -> Result<f64, SourceError> {
        let t = self.started_at.elapsed().as_secs_f64();
        let wave = (2.0 * PI * t / self.period_secs).sin() * self.amplitude_mv;
        let noise = if self.noise_mv > 0.0 {
            self.rng.gen_range(-self.noise_mv..self.noise_mv)
        } else {
            0.0
        };
        Ok((self.baseline_mv + wave + noise).round())
    }

    fn describe(&self) -> String {
        format!("simulated source around {} mV", self.baseline_mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_source_plays_back_then_exhausts() {
        let mut source = ManualSource::new([1.0, 2.0]);
        assert_eq!(source.read_millivolts().unwrap(), 1.0);
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.read_millivolts().unwrap(), 2.0);
        assert!(matches!(source.read_millivolts(), Err(SourceError::Exhausted)));
    }

    #[test]
    fn disconnected_manual_source_refuses_reads() {
        let mut source = ManualSource::new([1.0]);
        source.disconnect();
        assert!(!source.is_connected());
        assert!(matches!(source.read_millivolts(), Err(SourceError::Disconnected)));
    }

    #[test]
    fn simulated_source_stays_near_baseline() {
        let mut source = SimulatedSource::new(1000.0, 50.0, 60.0, 5.0).with_seed(7);
        for _ in 0..100 {
            let v = source.read_millivolts().unwrap();
            assert!((944.0..=1056.0).contains(&v), "reading {v} out of band");
        }
    }
}
