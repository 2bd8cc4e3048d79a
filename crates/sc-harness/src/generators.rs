//! Test signal generators
//!
//! Two kinds of source feed the mixer: band-limited noise (two cascaded leaky
//! integrators followed by a first difference) and a swept tone that glides
//! toward a new random frequency at regular intervals.

use crate::random::Random;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Noise generator state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseState {
    sum1: f32,
    sum2: f32,
    sum2_prev: f32,
    factor: f32,
    scalar: f32,
}

impl NoiseState {
    /// Higher factors put more energy in low frequencies. The scalar keeps
    /// perceived loudness roughly level across factors.
    pub fn new(factor: f32) -> Self {
        let f = factor as f64;
        let scalar = f * f * f * f.sqrt() / (2.0 + f * f);

        Self {
            sum1: 0.0,
            sum2: 0.0,
            sum2_prev: 0.0,
            factor,
            scalar: scalar as f32,
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    fn run(&mut self, rng: &mut Random, out: &mut [f32]) {
        for sample in out.iter_mut() {
            let source = ((rng.draw() - 0.5) * self.scalar as f64) as f32;
            self.sum1 += (source - self.sum1) / self.factor;
            self.sum2 += (self.sum1 - self.sum2) / self.factor;
            *sample = self.sum2 - self.sum2_prev;
            self.sum2_prev = self.sum2;
        }
    }
}

/// Swept tone generator state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToneState {
    sample_rate: u32,
    samples_per_update: u32,
    low_frequency: u32,
    high_frequency: u32,
    angle: f32,
    velocity: f32,
    acceleration: f32,
    samples_left: u32,
}

impl ToneState {
    pub fn new(sample_rate: u32, low_frequency: u32, high_frequency: u32) -> Self {
        let low_frequency = low_frequency.max(1);

        Self {
            sample_rate,
            samples_per_update: (sample_rate / low_frequency * 4).max(1),
            low_frequency,
            high_frequency,
            angle: 0.0,
            velocity: 0.0,
            acceleration: 0.0,
            samples_left: 0,
        }
    }

    /// Number of samples between frequency retargets
    pub fn samples_per_update(&self) -> u32 {
        self.samples_per_update
    }

    fn retarget(&mut self, rng: &mut Random) {
        self.samples_left = self.samples_per_update;

        let low = self.low_frequency as f64;
        let ratio = self.high_frequency as f64 / low;
        let target_frequency = low * ratio.powf(rng.draw());
        let target_velocity = (PI * 2.0) / (self.sample_rate as f64 / target_frequency);

        self.acceleration =
            ((target_velocity - self.velocity as f64) / self.samples_left as f64) as f32;
    }

    fn run(&mut self, rng: &mut Random, out: &mut [f32]) {
        for sample in out.iter_mut() {
            if self.samples_left == 0 {
                self.retarget(rng);
            }

            self.velocity += self.acceleration;
            self.angle += self.velocity;
            *sample = (self.angle as f64).sin() as f32;

            if self.angle as f64 > PI {
                self.angle -= (PI * 2.0) as f32;
            }
            self.samples_left -= 1;
        }
    }
}

/// One signal source, either noise or tone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Generator {
    Noise(NoiseState),
    Tone(ToneState),
}

impl Generator {
    pub fn noise(factor: f32) -> Self {
        Generator::Noise(NoiseState::new(factor))
    }

    pub fn tone(sample_rate: u32, low_frequency: u32, high_frequency: u32) -> Self {
        Generator::Tone(ToneState::new(sample_rate, low_frequency, high_frequency))
    }

    /// Fill `out` with the next samples of this source
    pub fn run(&mut self, rng: &mut Random, out: &mut [f32]) {
        match self {
            Generator::Noise(state) => state.run(rng, out),
            Generator::Tone(state) => state.run(rng, out),
        }
    }

    pub fn is_noise(&self) -> bool {
        matches!(self, Generator::Noise(_))
    }
}

/// The six sources used for every voice: three noise and three tone
/// generators spanning low, mid and high bands.
pub fn standard_bank(sample_rate: u32) -> [Generator; 6] {
    [
        Generator::noise(128.0),
        Generator::tone(sample_rate, 20, 200),
        Generator::noise(12.0),
        Generator::tone(sample_rate, 200, 2000),
        Generator::noise(1.75),
        Generator::tone(sample_rate, 2000, 20000),
    ]
}
