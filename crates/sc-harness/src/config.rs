//! Harness configuration

use crate::fuzz::validate_period;
use crate::random::DEFAULT_SEED;
use crate::ranges::WriteRanges;
use crate::stream::DEFAULT_CAPACITY;
use crate::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Run the default test set
    pub default_suite: bool,

    /// Run the exhaustive test set
    pub exhaustive_suite: bool,

    /// Run-length scale in minutes (1 short, 2 normal, 5 long)
    pub base_minutes: u32,

    /// Average bytes between injected corruptions (None = no fuzzing)
    pub fuzz_period: Option<u32>,

    /// Skip decoding and verification
    pub no_decode: bool,

    /// Skip the extra processing levels
    pub no_extras: bool,

    /// Skip the hybrid sections
    pub no_hybrid: bool,

    /// Skip float sample formats
    pub no_floats: bool,

    /// Skip the lossy hybrid sections
    pub no_lossy: bool,

    /// Run the normal speed mode only
    pub no_speeds: bool,

    /// Tests whose streams are mirrored to disk
    pub write_ranges: WriteRanges,

    /// Directory receiving captured streams
    pub capture_dir: PathBuf,

    /// Generator seed at the start of the run
    pub seed: u64,

    /// Channel capacity in bytes
    pub buffer_size: usize,

    /// Embed a checksum in every encoded stream
    pub checksum: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            default_suite: true,
            exhaustive_suite: false,
            base_minutes: 2,
            fuzz_period: None,
            no_decode: false,
            no_extras: false,
            no_hybrid: false,
            no_floats: false,
            no_lossy: false,
            no_speeds: false,
            write_ranges: WriteRanges::none(),
            capture_dir: PathBuf::from("."),
            seed: DEFAULT_SEED,
            buffer_size: DEFAULT_CAPACITY,
            checksum: true,
        }
    }
}

impl HarnessConfig {
    /// Short runs of the default set
    pub fn quick() -> Self {
        Self {
            base_minutes: 1,
            ..Default::default()
        }
    }

    /// Every test in both sets
    pub fn exhaustive() -> Self {
        Self {
            default_suite: true,
            exhaustive_suite: true,
            ..Default::default()
        }
    }

    /// Builder: set the run-length scale
    pub fn with_base_minutes(mut self, minutes: u32) -> Self {
        self.base_minutes = minutes;
        self
    }

    /// Builder: enable fuzzing
    pub fn with_fuzz_period(mut self, period: u32) -> Self {
        self.fuzz_period = Some(period);
        self
    }

    /// Builder: set seed for reproducibility
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder: mirror the selected tests to disk
    pub fn with_write_ranges(mut self, ranges: WriteRanges) -> Self {
        self.write_ranges = ranges;
        self
    }

    /// Builder: set capture directory
    pub fn with_capture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = dir.into();
        self
    }

    /// Builder: set channel capacity
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn is_fuzzing(&self) -> bool {
        self.fuzz_period.is_some()
    }

    /// Check ranges and combinations
    pub fn validate(&self) -> Result<()> {
        if let Some(period) = self.fuzz_period {
            validate_period(period)?;
        }

        if self.base_minutes == 0 {
            return Err(HarnessError::InvalidConfig(
                "run length must be at least one minute".into(),
            ));
        }

        if self.buffer_size < 2 {
            return Err(HarnessError::InvalidConfig(format!(
                "buffer size {} cannot hold any data",
                self.buffer_size
            )));
        }

        Ok(())
    }
}
