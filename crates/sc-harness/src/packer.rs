//! Sample quantization and byte packing
//!
//! The mixer produces floats; codecs take interleaved `i32` words. This module
//! turns one into the other for every supported sample format, and serializes
//! canonical `i32` samples into 1 to 4 byte containers so that encoded-side and
//! decoded-side audio hash identically regardless of how either side stores
//! samples internally.

use crate::random::Random;
use crate::{HarnessError, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Quantization
// ============================================================================

/// How generated audio is presented to the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Plain integer PCM at the configured depth
    Integer,
    /// IEEE float; truncated to the configured precision when it is 25 bits
    /// or less
    Float,
    /// Float bit patterns handed over as if they were 32-bit integers
    FloatAsInt32,
    /// 32-bit integers handed over as if they were float bit patterns
    Int32AsFloat,
}

impl SampleFormat {
    /// Whether the codec should be told the data is floating point
    pub fn is_float(&self) -> bool {
        matches!(self, SampleFormat::Float | SampleFormat::Int32AsFloat)
    }

    /// Bytes per sample the codec is configured with
    pub fn bytes_per_sample(&self, bits: u32) -> usize {
        match self {
            SampleFormat::Integer => bits.div_ceil(8) as usize,
            _ => 4,
        }
    }

    /// Bits per sample the codec is configured with
    pub fn codec_bits(&self, bits: u32) -> u32 {
        match self {
            SampleFormat::Integer => bits,
            _ => 32,
        }
    }

    /// Reject depth/format combinations that cannot be produced
    pub fn validate(&self, bits: u32) -> Result<()> {
        let ok = match self {
            SampleFormat::Integer => (1..=32).contains(&bits),
            SampleFormat::Float => (1..=25).contains(&bits) || bits == 32,
            SampleFormat::FloatAsInt32 | SampleFormat::Int32AsFloat => bits == 32,
        };

        if ok {
            Ok(())
        } else {
            Err(HarnessError::InvalidBitDepth(bits))
        }
    }
}

fn limits(bits: u32) -> (i64, i64, f64) {
    let scalar = (1i64 << (bits - 1)) as f64;
    (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1, scalar)
}

/// Quantize one sample to a signed integer of `bits` bits (1..=32).
///
/// Inputs at or beyond full scale clamp to the extremes; everything else is
/// scaled by `2^(bits-1)` and rounded toward negative infinity.
pub fn quantize(sample: f32, bits: u32) -> i32 {
    let (min, max, scalar) = limits(bits);

    if sample.is_nan() {
        return 0;
    }

    let value = if sample >= 1.0 {
        max
    } else if sample <= -1.0 {
        min
    } else {
        ((sample as f64 * scalar).floor() as i64).clamp(min, max)
    };

    value as i32
}

/// Quantize to `bits` and left-justify in the byte container, so 12-bit
/// samples occupy the top of a 16-bit word.
pub fn float_to_integer(samples: &[f32], bits: u32, out: &mut [i32]) {
    let shift = (8 - (bits & 7)) & 7;

    for (dst, &src) in out.iter_mut().zip(samples) {
        *dst = ((quantize(src, bits) as u32) << shift) as i32;
    }
}

/// Quantize to full 32 bits, replacing the trailing zero bits of nonzero
/// samples with random bits.
pub fn float_to_i32_filled(samples: &[f32], rng: &mut Random, out: &mut [i32]) {
    for (dst, &src) in out.iter_mut().zip(samples) {
        let mut value = quantize(src, 32) as u32;

        if value != 0 && value & 1 == 0 {
            let zeros = value.trailing_zeros();
            value >>= zeros;
            for _ in 0..zeros {
                value = (value << 1) | u32::from(rng.draw() > 0.5);
            }
        }

        *dst = value as i32;
    }
}

/// Round floats down to `bits` of precision while keeping them floats
pub fn truncate_float(samples: &mut [f32], bits: u32) {
    let (_, _, scalar) = limits(bits);

    for sample in samples.iter_mut() {
        *sample = (quantize(*sample, bits) as f64 / scalar) as f32;
    }
}

/// Convert one block of mixer output into the words handed to the codec
pub fn prepare_block(
    format: SampleFormat,
    bits: u32,
    samples: &mut [f32],
    rng: &mut Random,
    out: &mut [i32],
) -> Result<()> {
    format.validate(bits)?;

    match format {
        SampleFormat::Integer if bits == 32 => float_to_i32_filled(samples, rng, out),
        SampleFormat::Integer => float_to_integer(samples, bits, out),
        SampleFormat::Float => {
            if bits <= 25 {
                truncate_float(samples, bits);
            }
            for (dst, src) in out.iter_mut().zip(samples.iter()) {
                *dst = src.to_bits() as i32;
            }
        }
        SampleFormat::FloatAsInt32 => {
            for (dst, src) in out.iter_mut().zip(samples.iter()) {
                *dst = src.to_bits() as i32;
            }
        }
        SampleFormat::Int32AsFloat => float_to_i32_filled(samples, rng, out),
    }

    Ok(())
}

// ============================================================================
// Byte packing
// ============================================================================

/// Byte order of packed samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    Little,
    Big,
}

/// Signedness of packed samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signedness {
    /// WAV convention: 8-bit unsigned, wider signed
    Default,
    Signed,
    Unsigned,
}

/// Container layout for packed samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackFormat {
    pub bytes_per_sample: usize,
    pub endian: Endian,
    pub signedness: Signedness,
}

impl PackFormat {
    /// Little-endian with WAV signedness, the layout hashed on both sides
    pub fn canonical(bytes_per_sample: usize) -> Self {
        Self {
            bytes_per_sample,
            endian: Endian::Little,
            signedness: Signedness::Default,
        }
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn with_signedness(mut self, signedness: Signedness) -> Self {
        self.signedness = signedness;
        self
    }

    pub fn is_unsigned(&self) -> bool {
        match self.signedness {
            Signedness::Default => self.bytes_per_sample == 1,
            Signedness::Signed => false,
            Signedness::Unsigned => true,
        }
    }

    fn bias(&self) -> u32 {
        if self.is_unsigned() {
            1u32 << (self.bytes_per_sample * 8 - 1)
        } else {
            0
        }
    }

    fn validate(&self) -> Result<()> {
        if (1..=4).contains(&self.bytes_per_sample) {
            Ok(())
        } else {
            Err(HarnessError::InvalidBitDepth(self.bytes_per_sample as u32 * 8))
        }
    }
}

/// Append `src` to `dst` packed in the given layout
pub fn store_samples(dst: &mut Vec<u8>, src: &[i32], format: PackFormat) -> Result<()> {
    format.validate()?;
    let width = format.bytes_per_sample;
    let bias = format.bias();
    dst.reserve(src.len() * width);

    for &sample in src {
        let word = (sample as u32).wrapping_add(bias).to_le_bytes();
        match format.endian {
            Endian::Little => dst.extend_from_slice(&word[..width]),
            Endian::Big => dst.extend(word[..width].iter().rev()),
        }
    }

    Ok(())
}

/// Parse samples packed by [`store_samples`] back into canonical words.
/// Trailing bytes that do not fill a whole sample are ignored.
pub fn load_samples(src: &[u8], format: PackFormat) -> Result<Vec<i32>> {
    format.validate()?;
    let width = format.bytes_per_sample;
    let bias = format.bias();
    let unused = 32 - width as u32 * 8;

    Ok(src
        .chunks_exact(width)
        .map(|chunk| {
            let mut word = [0u8; 4];
            match format.endian {
                Endian::Little => word[..width].copy_from_slice(chunk),
                Endian::Big => {
                    for (dst, &src) in word[..width].iter_mut().zip(chunk.iter().rev()) {
                        *dst = src;
                    }
                }
            }
            let raw = u32::from_le_bytes(word).wrapping_sub(bias);
            // sign-extend from the container width
            ((raw << unused) as i32) >> unused
        })
        .collect())
}
