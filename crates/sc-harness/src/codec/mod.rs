//! Codec collaborator interface
//!
//! The harness drives any codec through these traits. Encoders push their
//! output through a [`BlockSink`], decoders pull their input from a
//! [`ByteSource`]. Both are implemented by [`crate::stream::VirtualStream`],
//! so a codec never learns that it is talking to an in-memory pipe.

pub mod block;
pub mod reference;

pub use reference::ReferenceCodec;
pub use std::io::SeekFrom;

use crate::stream::StreamError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors reported by codec implementations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("input is not a recognised stream")]
    NotAStream,

    #[error("invalid encoder configuration: {0}")]
    InvalidConfig(String),

    #[error("sample count {samples} is not a whole number of {channels}-channel frames")]
    PartialFrame { samples: usize, channels: usize },

    #[error("output sink rejected a {0}-byte block")]
    SinkRejected(usize),

    #[error("encoder is closed")]
    Closed,

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
}

// ============================================================================
// Transport
// ============================================================================

/// Destination for encoded blocks
pub trait BlockSink: Send + Sync {
    /// Deliver one block. The sink may modify the block in place.
    /// Returns `false` when the block could not be accepted.
    fn write_block(&self, data: &mut [u8]) -> bool;
}

/// Origin of encoded bytes for a decoder
#[allow(clippy::len_without_is_empty)]
pub trait ByteSource: Send + Sync {
    /// Fill `data`, blocking as needed. A short count means end of stream.
    fn read(&self, data: &mut [u8]) -> usize;

    /// Return one byte so the next read sees it first
    fn push_back(&self, byte: u8) -> Result<(), StreamError>;

    /// Current offset, if the source tracks one
    fn position(&self) -> Option<u64>;

    /// Total length in bytes, zero when unknown
    fn len(&self) -> u64;

    fn seek(&self, pos: SeekFrom) -> Result<(), StreamError>;

    fn can_seek(&self) -> bool;

    /// Whether the producer has finished writing
    fn is_done(&self) -> bool;
}

// ============================================================================
// Configuration
// ============================================================================

/// Speed/quality trade-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeedMode {
    Fast,
    Normal,
    High,
    VeryHigh,
}

impl SpeedMode {
    pub const ALL: [SpeedMode; 4] = [
        SpeedMode::Fast,
        SpeedMode::Normal,
        SpeedMode::High,
        SpeedMode::VeryHigh,
    ];

    /// Command-line style flag letters
    pub fn flag(&self) -> &'static str {
        match self {
            SpeedMode::Fast => "f",
            SpeedMode::Normal => "",
            SpeedMode::High => "h",
            SpeedMode::VeryHigh => "hh",
        }
    }
}

impl fmt::Display for SpeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpeedMode::Fast => "fast",
            SpeedMode::Normal => "normal",
            SpeedMode::High => "high",
            SpeedMode::VeryHigh => "very high",
        };
        f.write_str(name)
    }
}

/// Lossy primary stream with an optional correction stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Target bits per sample of the primary stream
    pub bitrate: f32,

    /// Emit a correction stream that restores the exact input
    pub create_correction: bool,
}

/// Render speed, extra level and hybrid settings the way command-line flags
/// would spell them
pub fn mode_tag(speed: SpeedMode, extra: u8, hybrid: Option<&HybridConfig>) -> String {
    let mut mode = format!("-{}", speed.flag());

    if extra > 0 {
        mode.push_str(&format!("x{}", extra));
    }

    if let Some(hybrid) = hybrid {
        mode.push_str(&format!("b{}", hybrid.bitrate));
        if hybrid.create_correction {
            mode.push('c');
        }
    }

    mode
}

/// Everything an encoder needs to know about its input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub sample_rate: u32,
    pub num_channels: usize,
    pub channel_mask: u32,
    pub bits_per_sample: u32,
    pub bytes_per_sample: usize,
    pub float_data: bool,
    pub speed: SpeedMode,

    /// Extra processing level, 0 disables
    pub extra: u8,

    pub hybrid: Option<HybridConfig>,

    /// Embed a checksum of the input at the end of the stream
    pub checksum: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            num_channels: 2,
            channel_mask: 0x3,
            bits_per_sample: 16,
            bytes_per_sample: 2,
            float_data: false,
            speed: SpeedMode::Normal,
            extra: 0,
            hybrid: None,
            checksum: true,
        }
    }
}

impl EncoderConfig {
    /// Highest supported extra level
    pub const MAX_EXTRA: u8 = 6;

    pub fn with_speed(mut self, speed: SpeedMode) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_extra(mut self, extra: u8) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_hybrid(mut self, bitrate: f32, create_correction: bool) -> Self {
        self.hybrid = Some(HybridConfig {
            bitrate,
            create_correction,
        });
        self
    }

    pub fn is_hybrid(&self) -> bool {
        self.hybrid.is_some()
    }

    pub fn creates_correction(&self) -> bool {
        self.hybrid.is_some_and(|h| h.create_correction)
    }

    /// Short mode tag such as `-hx3b3c`
    pub fn mode_string(&self) -> String {
        mode_tag(self.speed, self.extra, self.hybrid.as_ref())
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        if self.sample_rate == 0 {
            return Err(CodecError::InvalidConfig("sample rate is zero".into()));
        }
        if !(1..=8).contains(&self.num_channels) {
            return Err(CodecError::InvalidConfig(format!(
                "{} channels",
                self.num_channels
            )));
        }
        if !(1..=4).contains(&self.bytes_per_sample) {
            return Err(CodecError::InvalidConfig(format!(
                "{} bytes per sample",
                self.bytes_per_sample
            )));
        }
        if self.bits_per_sample == 0 || self.bits_per_sample as usize > self.bytes_per_sample * 8
        {
            return Err(CodecError::InvalidConfig(format!(
                "{} bits in {} bytes",
                self.bits_per_sample, self.bytes_per_sample
            )));
        }
        if self.float_data && self.bits_per_sample != 32 {
            return Err(CodecError::InvalidConfig("float data must be 32 bits".into()));
        }
        if self.extra > Self::MAX_EXTRA {
            return Err(CodecError::InvalidConfig(format!("extra level {}", self.extra)));
        }
        if let Some(hybrid) = &self.hybrid {
            if !(hybrid.bitrate.is_finite() && hybrid.bitrate > 0.0) {
                return Err(CodecError::InvalidConfig(format!(
                    "hybrid bitrate {}",
                    hybrid.bitrate
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Streaming encoder instance
pub trait Encoder {
    /// Encode interleaved samples, a whole number of frames
    fn pack_samples(&mut self, samples: &[i32]) -> Result<(), CodecError>;

    /// Emit everything buffered so far
    fn flush(&mut self) -> Result<(), CodecError>;

    /// Embed a checksum of the canonical input
    fn store_checksum(&mut self, digest: [u8; 16]) -> Result<(), CodecError>;

    /// Finish the stream
    fn close(self: Box<Self>) -> Result<(), CodecError>;
}

/// Streaming decoder instance
pub trait Decoder {
    fn num_channels(&self) -> usize;

    fn bytes_per_sample(&self) -> usize;

    /// Decode up to `frames` frames into `out`. Returns zero only at the end
    /// of the stream.
    fn unpack_samples(&mut self, out: &mut [i32], frames: usize) -> usize;

    /// Errors detected so far
    fn num_errors(&self) -> u32;
}

/// A codec the harness can verify
pub trait Codec: Sync {
    fn name(&self) -> &str;

    /// Extension for captured primary streams. Correction streams append `c`.
    fn file_extension(&self) -> &str;

    fn create_encoder<'a>(
        &self,
        config: &EncoderConfig,
        main: &'a dyn BlockSink,
        correction: Option<&'a dyn BlockSink>,
    ) -> Result<Box<dyn Encoder + 'a>, CodecError>;

    fn open_decoder<'a>(
        &self,
        main: &'a dyn ByteSource,
        correction: Option<&'a dyn ByteSource>,
    ) -> Result<Box<dyn Decoder + 'a>, CodecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_strings() {
        let base = EncoderConfig::default();
        assert_eq!(base.mode_string(), "-");
        assert_eq!(base.clone().with_speed(SpeedMode::Fast).mode_string(), "-f");
        assert_eq!(
            base.clone().with_speed(SpeedMode::VeryHigh).with_extra(4).mode_string(),
            "-hhx4"
        );
        assert_eq!(
            base.clone().with_speed(SpeedMode::High).with_hybrid(3.0, true).mode_string(),
            "-hb3c"
        );
        assert_eq!(base.clone().with_hybrid(4.0, true).mode_string(), "-b4c");
        assert_eq!(base.with_extra(2).with_hybrid(5.0, false).mode_string(), "-x2b5");
    }

    #[test]
    fn test_validate() {
        assert!(EncoderConfig::default().validate().is_ok());

        let bad_bits = EncoderConfig {
            bits_per_sample: 24,
            ..Default::default()
        };
        assert!(bad_bits.validate().is_err());

        let bad_float = EncoderConfig {
            float_data: true,
            ..Default::default()
        };
        assert!(bad_float.validate().is_err());

        assert!(EncoderConfig::default().with_extra(7).validate().is_err());
        assert!(EncoderConfig::default().with_hybrid(0.0, false).validate().is_err());
    }

    #[test]
    fn test_correction_flag() {
        let config = EncoderConfig::default();
        assert!(!config.creates_correction());
        assert!(config.clone().with_hybrid(3.0, true).creates_correction());
        assert!(!config.with_hybrid(5.0, false).creates_correction());
    }
}
