//! # sc-harness
//!
//! Round-trip and fuzz verification harness for streaming audio codecs.
//!
//! ## Features
//!
//! - **Deterministic Test Audio**: Noise and swept tones mixed into 1 to 6
//!   channels from a seedable generator
//! - **Streaming Round Trips**: Encoder and decoder run concurrently over a
//!   bounded in-memory channel
//! - **Bit-Flip Fuzzing**: Binomially distributed corruption that leaves the
//!   generated audio untouched
//! - **Content Hashes**: MD5 of canonical PCM on both sides of the codec
//! - **Full Test Matrix**: Bit depths, layouts, speed modes, extra levels and
//!   hybrid variants
//! - **CI Integration**: Text, JSON, Markdown and JUnit reports
//!
//! ## Example
//!
//! ```rust,no_run
//! use sc_harness::{HarnessConfig, ReferenceCodec, Suite};
//!
//! let config = HarnessConfig::quick();
//! let mut suite = Suite::new(config, ReferenceCodec).unwrap();
//! let report = suite.run();
//! assert!(report.all_passed());
//! ```

pub mod codec;
pub mod config;
pub mod fuzz;
pub mod generators;
pub mod harness;
pub mod matrix;
pub mod mixer;
pub mod packer;
pub mod random;
pub mod ranges;
pub mod report;
pub mod stream;

pub use codec::{Codec, CodecError, EncoderConfig, ReferenceCodec, SpeedMode};
pub use config::HarnessConfig;
pub use harness::{RoundTrip, Suite, SuiteEvent, TestCase, TestOutcome, Verdict};
pub use matrix::{Section, SizeMode, TestMatrix};
pub use mixer::ChannelLayout;
pub use packer::SampleFormat;
pub use random::{Random, SharedRandom};
pub use ranges::WriteRanges;
pub use report::{ReportFormat, SuiteReport};
pub use stream::{StreamError, StreamStats, VirtualStream};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the harness
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("invalid channel count = {0}")]
    InvalidChannelCount(usize),

    #[error("invalid bits configuration: {0}")]
    InvalidBitDepth(u32),

    #[error("fuzz period must be 10 - 1000000 bytes, got {0}")]
    InvalidFuzzPeriod(u32),

    #[error("syntax error in write specification: {0}")]
    InvalidWriteSpec(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("can't create file {}: {}", .path.display(), .source)]
    Capture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decoder worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Failures that abort a single test case rather than the whole run
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            HarnessError::Capture { .. } | HarnessError::WorkerPanicked(_) | HarnessError::Codec(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Run one lossless round trip with the reference codec and default settings
pub fn quick_round_trip(layout: ChannelLayout, bits: u32, seconds: u32) -> Result<TestOutcome> {
    let case = TestCase::new(1, layout, bits, seconds);
    let rng = SharedRandom::new(random::DEFAULT_SEED);
    RoundTrip::new(&ReferenceCodec, rng).run(&case)
}
