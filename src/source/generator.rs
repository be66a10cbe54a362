//! Synthetic row generation.
//!
//! Two modes are available:
//! - **Random**: every dimension performs an independent multiplicative random walk.
//! - **Peaks**: dimensions drift slowly around a baseline and occasionally spike
//!   together, then decay back over a few ticks.

use crate::core::types::Row;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Nominal spacing between generated rows, in milliseconds.
pub const TICK_MS: i64 = 1000;

/// Maximum timestamp jitter applied in peak mode, in either direction.
const PEAK_JITTER_MS: f64 = 100.0;

/// Chance per tick that a peak starts.
const PEAK_PROBABILITY: f64 = 0.05;

/// Shape of the generated series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorMode {
    #[default]
    Random,
    Peaks,
}

/// Generator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub mode: GeneratorMode,
    /// Number of value dimensions
    pub dimensions: usize,
    /// Lower bound of the initial values
    pub min_value: f64,
    /// Upper bound of the initial values
    pub max_value: f64,
    /// Timestamp of the first row; defaults to now
    pub start_time: Option<i64>,
    /// Seed for reproducible output
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: GeneratorMode::Random,
            dimensions: 8,
            min_value: 5.0,
            max_value: 10.0,
            start_time: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct PeakState {
    active: bool,
    decay_counter: u32,
    duration: u32,
    baseline: Vec<f64>,
}

/// Produces an endless, strictly increasing stream of rows.
#[derive(Debug, Clone)]
pub struct RowGenerator {
    mode: GeneratorMode,
    dimensions: Vec<String>,
    min_value: f64,
    max_value: f64,
    start_time: i64,
    rng: StdRng,
    ticks: i64,
    previous: Option<Vec<f64>>,
    peak: PeakState,
}

impl RowGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (min_value, max_value) = if config.min_value <= config.max_value {
            (config.min_value, config.max_value)
        } else {
            (config.max_value, config.min_value)
        };

        Self {
            mode: config.mode,
            dimensions: (1..=config.dimensions).map(|i| format!("Col {i}")).collect(),
            min_value,
            max_value,
            start_time: config.start_time.unwrap_or_else(|| Utc::now().timestamp_millis()),
            rng,
            ticks: 0,
            previous: None,
            peak: PeakState::default(),
        }
    }

    pub fn mode(&self) -> GeneratorMode {
        self.mode
    }

    /// Names of the generated dimensions, in column order.
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    /// Produce the next row.
    pub fn next_row(&mut self) -> Row {
        let values = match self.previous.take() {
            None => self.initial_values(),
            Some(previous) => match self.mode {
                GeneratorMode::Random => self.random_step(&previous),
                GeneratorMode::Peaks => self.peak_step(&previous),
            },
        };

        let timestamp = self.next_timestamp();
        self.ticks += 1;

        let row = Row::from_values(
            timestamp,
            self.dimensions.iter().cloned().zip(values.iter().copied()),
        );
        self.previous = Some(values);
        row
    }

    /// Produce `count` rows.
    pub fn take_rows(&mut self, count: usize) -> Vec<Row> {
        (0..count).map(|_| self.next_row()).collect()
    }

    fn next_timestamp(&mut self) -> i64 {
        let nominal = self.start_time + self.ticks * TICK_MS;
        match self.mode {
            GeneratorMode::Random => nominal,
            GeneratorMode::Peaks => {
                let jitter = (self.rng.gen::<f64>() - 0.5) * 2.0 * PEAK_JITTER_MS;
                nominal + jitter.round() as i64
            }
        }
    }

    fn initial_values(&mut self) -> Vec<f64> {
        let values: Vec<f64> = (0..self.dimensions.len())
            .map(|_| self.rng.gen::<f64>() * (self.max_value - self.min_value) + self.min_value)
            .collect();
        if self.mode == GeneratorMode::Peaks {
            self.peak = PeakState {
                baseline: values.clone(),
                ..PeakState::default()
            };
        }
        values
    }

    fn random_step(&mut self, previous: &[f64]) -> Vec<f64> {
        previous
            .iter()
            .map(|&value| {
                if self.rng.gen::<f64>() > 0.5 {
                    let r = self.rng.gen::<f64>() * self.rng.gen::<f64>();
                    value * (1.0 + r * 0.3)
                } else {
                    let r: f64 = (0..4).map(|_| self.rng.gen::<f64>()).product();
                    value * (1.0 - r)
                }
            })
            .collect()
    }

    fn peak_step(&mut self, previous: &[f64]) -> Vec<f64> {
        if self.peak.active {
            if self.peak.decay_counter > 0 {
                let values = previous
                    .iter()
                    .zip(&self.peak.baseline)
                    .map(|(&value, &baseline)| {
                        value - (value - baseline) * (0.2 + self.rng.gen::<f64>() * 0.1)
                    })
                    .collect();
                self.peak.decay_counter -= 1;
                if self.peak.decay_counter == 0 {
                    self.peak.active = false;
                }
                values
            } else {
                self.peak.decay_counter = self.peak.duration;
                previous
                    .iter()
                    .map(|&value| value * (1.0 + self.rng.gen::<f64>() * 0.2))
                    .collect()
            }
        } else {
            let mut values = Vec::with_capacity(previous.len());
            for (value, baseline) in previous.iter().zip(self.peak.baseline.iter_mut()) {
                *baseline += (self.rng.gen::<f64>() - 0.5) * 0.02;
                values.push(value * (1.0 + (self.rng.gen::<f64>() - 0.5) * 0.03));
            }

            if self.rng.gen::<f64>() < PEAK_PROBABILITY {
                self.peak.active = true;
                self.peak.duration = (5.0 + self.rng.gen::<f64>() * 5.0).floor() as u32;
                values = previous
                    .iter()
                    .map(|&value| {
                        let r = self.rng.gen::<f64>() * self.rng.gen::<f64>();
                        value * (1.0 + r * 0.5)
                    })
                    .collect();
            }
            values
        }
    }
}

impl Iterator for RowGenerator {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        Some(self.next_row())
    }
}
