//! Channel mixer
//!
//! Mixes the six generators into every output channel with gains that drift
//! continuously, so the codec sees audio whose character keeps changing. A
//! slowly rotating sequencing angle picks which generator dominates, and a
//! width envelope alternates between a narrow, almost impulsive gain shape and
//! a wide, nearly uniform one.

use crate::generators::{standard_bank, Generator};
use crate::random::Random;
use crate::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Frames produced per mixing block
pub const BLOCK_FRAMES: usize = 128;

/// Number of generators feeding each channel
pub const NUM_GENERATORS: usize = 6;

const NOISE_GAIN: f64 = 0.6667;
const TONE_GAIN: f64 = 0.3333;

/// Seconds for one full turn of the sequencing angle
const SEQUENCING_PERIOD: f64 = 60.0;

/// Phase (in units of π) and gain of each generator slot
const SLOTS: [(f64, f64); NUM_GENERATORS] = [
    (1.6667, NOISE_GAIN),
    (0.6667, TONE_GAIN),
    (0.3333, NOISE_GAIN),
    (1.3333, TONE_GAIN),
    (1.0, NOISE_GAIN),
    (0.0, TONE_GAIN),
];

/// Supported speaker layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLayout {
    Mono,
    Stereo,
    Quad,
    Surround51,
}

impl ChannelLayout {
    /// Layout for a channel count. Anything but 1, 2, 4 or 6 is a
    /// configuration error.
    pub fn from_count(channels: usize) -> Result<Self> {
        match channels {
            1 => Ok(ChannelLayout::Mono),
            2 => Ok(ChannelLayout::Stereo),
            4 => Ok(ChannelLayout::Quad),
            6 => Ok(ChannelLayout::Surround51),
            n => Err(HarnessError::InvalidChannelCount(n)),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
            ChannelLayout::Quad => 4,
            ChannelLayout::Surround51 => 6,
        }
    }

    /// Speaker mask in WAVEFORMATEXTENSIBLE bit order
    pub fn channel_mask(&self) -> u32 {
        match self {
            ChannelLayout::Mono => 0x4,
            ChannelLayout::Stereo => 0x3,
            ChannelLayout::Quad => 0x33,
            ChannelLayout::Surround51 => 0x3F,
        }
    }

    fn geometry(&self) -> Vec<ChannelState> {
        let front = PI / 24.0;
        let rear = 23.0 * PI / 24.0;

        let (offsets, lfe): (&[f64], Option<usize>) = match self {
            ChannelLayout::Mono => (&[0.0], None),
            ChannelLayout::Stereo => (&[-front, front], None),
            ChannelLayout::Quad => (&[-front, front, -rear, rear], None),
            ChannelLayout::Surround51 => (&[-front, front, 0.0, 0.0, -rear, rear], Some(3)),
        };

        offsets
            .iter()
            .enumerate()
            .map(|(index, &angle_offset)| ChannelState {
                gain_history: [0.0; NUM_GENERATORS],
                angle_offset,
                lfe: lfe == Some(index),
            })
            .collect()
    }
}

/// Per-channel mixing state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelState {
    gain_history: [f32; NUM_GENERATORS],
    angle_offset: f64,
    lfe: bool,
}

impl ChannelState {
    pub fn is_lfe(&self) -> bool {
        self.lfe
    }

    pub fn angle_offset(&self) -> f64 {
        self.angle_offset
    }

    /// LFE channels only take the two lowest-band generators
    fn accepts(&self, generator: usize) -> bool {
        !self.lfe || generator < 2
    }
}

/// Add `source` into one channel of an interleaved buffer, ramping the gain
/// linearly from `initial_gain` toward `final_gain`.
pub fn mix_with_gain(
    destin: &mut [f32],
    source: &[f32],
    channel: usize,
    num_channels: usize,
    initial_gain: f32,
    final_gain: f32,
) {
    if source.is_empty() {
        return;
    }

    let delta = (final_gain - initial_gain) / source.len() as f32;
    let mut gain = initial_gain - delta;

    for (frame, &sample) in destin
        .chunks_exact_mut(num_channels)
        .zip(source.iter())
    {
        gain += delta;
        frame[channel] += sample * gain;
    }
}

/// The complete synthetic signal for one test case
#[derive(Debug, Clone)]
pub struct SignalSource {
    layout: ChannelLayout,
    sample_rate: u32,
    generators: [Generator; NUM_GENERATORS],
    channels: Vec<ChannelState>,
    scratch: Vec<f32>,
    sequencing_angle: f64,
    width: f64,
    widening: bool,
    seconds: u32,
    samples: u32,
}

impl SignalSource {
    pub fn new(layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            layout,
            sample_rate,
            generators: standard_bank(sample_rate),
            channels: layout.geometry(),
            scratch: vec![0.0; BLOCK_FRAMES],
            sequencing_angle: 0.0,
            width: 200.0,
            widening: false,
            seconds: 0,
            samples: 0,
        }
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn channel_states(&self) -> &[ChannelState] {
        &self.channels
    }

    /// Whole seconds rendered so far
    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Total frames rendered so far
    pub fn total_frames(&self) -> u64 {
        self.seconds as u64 * self.sample_rate as u64 + self.samples as u64
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    fn target_gains(&self, channel: &ChannelState) -> [f32; NUM_GENERATORS] {
        let translated = self.sequencing_angle.cos() * 100.0;
        let width_scalar = 2f64.powf(-self.width);
        let mut gains = [0.0f32; NUM_GENERATORS];

        for (gain, &(phase, level)) in gains.iter_mut().zip(SLOTS.iter()) {
            let shape = (translated + channel.angle_offset - PI * phase).sin() + 1.0;
            *gain = (shape.powf(self.width) * width_scalar * level) as f32;
        }

        gains
    }

    /// Render the next block of interleaved frames into `out`, which must
    /// hold `BLOCK_FRAMES * channels` samples.
    pub fn render_block(&mut self, rng: &mut Random, out: &mut [f32]) {
        let num_channels = self.channels.len();
        debug_assert_eq!(out.len(), BLOCK_FRAMES * num_channels);

        let targets: Vec<[f32; NUM_GENERATORS]> = self
            .channels
            .iter()
            .map(|channel| self.target_gains(channel))
            .collect();

        out.fill(0.0);

        for (index, generator) in self.generators.iter_mut().enumerate() {
            generator.run(rng, &mut self.scratch);

            for (k, channel) in self.channels.iter_mut().enumerate() {
                let target = targets[k][index];
                if channel.accepts(index) {
                    mix_with_gain(
                        out,
                        &self.scratch,
                        k,
                        num_channels,
                        channel.gain_history[index],
                        target,
                    );
                }
                channel.gain_history[index] = target;
            }
        }

        self.advance();
    }

    fn advance(&mut self) {
        self.sequencing_angle +=
            2.0 * PI / self.sample_rate as f64 / SEQUENCING_PERIOD * BLOCK_FRAMES as f64;
        if self.sequencing_angle > PI {
            self.sequencing_angle -= PI * 2.0;
        }

        self.samples += BLOCK_FRAMES as u32;
        if self.samples >= self.sample_rate {
            self.samples -= self.sample_rate;
            self.seconds += 1;
            self.step_width();
        }
    }

    fn step_width(&mut self) {
        if !self.widening {
            if self.width > 1.0 {
                self.width *= 0.875;
            } else if self.width > 0.125 {
                self.width -= 0.125;
            } else {
                self.width = 0.0;
                self.widening = true;
            }
        } else if self.width < 1.0 {
            self.width += 0.125;
        } else if self.width < 200.0 {
            self.width *= 1.125;
        } else {
            self.widening = false;
        }
    }
}
