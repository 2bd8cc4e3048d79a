//! Capture range selection
//!
//! Parses specifications such as `3`, `1-4` or `2,7-9,15` naming the test
//! numbers whose encoded streams are mirrored to disk.

use crate::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Most ranges one `--write` list may hold
pub const MAX_RANGES: usize = 10;

/// Inclusive range of test numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRange {
    pub start: u32,
    pub stop: u32,
}

impl TestRange {
    pub fn contains(&self, test_number: u32) -> bool {
        (self.start..=self.stop).contains(&test_number)
    }
}

/// A parsed `--write` specification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRanges {
    ranges: Vec<TestRange>,
}

impl WriteRanges {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[TestRange] {
        &self.ranges
    }

    /// Whether the given test should be captured
    pub fn contains(&self, test_number: u32) -> bool {
        self.ranges.iter().any(|r| r.contains(test_number))
    }
}

fn parse_number(text: &str, spec: &str) -> Result<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HarnessError::InvalidWriteSpec(spec.to_string()));
    }
    text.parse()
        .map_err(|_| HarnessError::InvalidWriteSpec(spec.to_string()))
}

impl FromStr for WriteRanges {
    type Err = HarnessError;

    fn from_str(spec: &str) -> Result<Self> {
        let mut ranges = Vec::new();

        for item in spec.split(',') {
            if ranges.len() == MAX_RANGES {
                return Err(HarnessError::InvalidWriteSpec(spec.to_string()));
            }

            let range = match item.split_once('-') {
                Some((start, stop)) => TestRange {
                    start: parse_number(start, spec)?,
                    stop: parse_number(stop, spec)?,
                },
                None => {
                    let n = parse_number(item, spec)?;
                    TestRange { start: n, stop: n }
                }
            };

            ranges.push(range);
        }

        Ok(Self { ranges })
    }
}

impl fmt::Display for WriteRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if range.start == range.stop {
                write!(f, "{}", range.start)?;
            } else {
                write!(f, "{}-{}", range.start, range.stop)?;
            }
        }
        Ok(())
    }
}
