//! Test matrix enumeration
//!
//! Expands a [`HarnessConfig`] into the ordered list of test cases: sections
//! (lossless, hybrid variants) contain size groups (bit depth and layout),
//! and each group runs every speed mode crossed with the selected extra
//! levels. Cases are numbered sequentially from 1 across the whole run.

use crate::codec::SpeedMode;
use crate::config::HarnessConfig;
use crate::harness::TestCase;
use crate::mixer::ChannelLayout;
use crate::packer::SampleFormat;
use serde::{Deserialize, Serialize};

/// Top-level grouping of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Section {
    PureLossless,
    HybridLossless,
    HybridLossy,
    HybridIgnoreCorrection,
}

impl Section {
    pub fn title(&self) -> &'static str {
        match self {
            Section::PureLossless => "pure lossless",
            Section::HybridLossless => "hybrid lossless",
            Section::HybridLossy => "hybrid lossy",
            Section::HybridIgnoreCorrection => "hybrid lossless (but ignore correction on decode)",
        }
    }

    pub fn is_hybrid(&self) -> bool {
        !matches!(self, Section::PureLossless)
    }

    /// Bitrate and correction flag for hybrid sections
    fn hybrid(&self) -> Option<(f32, bool)> {
        match self {
            Section::PureLossless => None,
            Section::HybridLossless => Some((3.0, true)),
            Section::HybridLossy => Some((5.0, false)),
            Section::HybridIgnoreCorrection => Some((4.0, true)),
        }
    }

    /// Sections enabled by the configuration, in run order
    pub fn enabled(config: &HarnessConfig) -> Vec<Section> {
        let mut sections = vec![Section::PureLossless];

        if !config.no_hybrid {
            if !config.is_fuzzing() {
                sections.push(Section::HybridLossless);
            }
            if !config.no_lossy {
                sections.push(Section::HybridLossy);
                sections.push(Section::HybridIgnoreCorrection);
            }
        }

        sections
    }
}

/// Bit depth, layout and sample format of one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeMode {
    pub bits: u32,
    pub layout: ChannelLayout,
    pub format: SampleFormat,
    /// Run length in units of the configured base minutes
    pub minutes_factor: u32,
}

impl SizeMode {
    const fn new(bits: u32, layout: ChannelLayout, format: SampleFormat, minutes_factor: u32) -> Self {
        Self {
            bits,
            layout,
            format,
            minutes_factor,
        }
    }

    pub fn title(&self) -> String {
        let layout = match self.layout {
            ChannelLayout::Mono => "mono",
            ChannelLayout::Stereo => "stereo",
            ChannelLayout::Quad => "quad",
            ChannelLayout::Surround51 => "5.1 channels",
        };

        match self.format {
            SampleFormat::Integer if self.bits == 32 => format!("32-bit integer, {}", layout),
            SampleFormat::Integer => format!("{}-bit, {}", self.bits, layout),
            SampleFormat::Float if self.bits == 32 => format!("32-bit float, {}", layout),
            SampleFormat::Float => format!("{}-bit (converted to float), {}", self.bits, layout),
            SampleFormat::FloatAsInt32 => {
                format!("32-bit float stored as integer (pathological), {}", layout)
            }
            SampleFormat::Int32AsFloat => {
                format!("32-bit integer stored as float (pathological), {}", layout)
            }
        }
    }

    /// Size modes enabled for a section, in run order
    pub fn enabled(config: &HarnessConfig, section: Section) -> Vec<SizeMode> {
        use ChannelLayout::*;
        use SampleFormat::*;

        let exhaustive = config.exhaustive_suite;
        let floats = !config.no_floats;
        let mut modes = vec![SizeMode::new(8, Mono, Integer, 5)];

        if exhaustive {
            modes.push(SizeMode::new(16, Mono, Integer, 5));
        }

        modes.push(SizeMode::new(16, Stereo, Integer, 3));

        if exhaustive && floats {
            modes.push(SizeMode::new(16, Stereo, Float, 3));
        }

        modes.push(SizeMode::new(24, Surround51, Integer, 1));

        if exhaustive {
            if floats {
                modes.push(SizeMode::new(24, Surround51, Float, 1));
            }

            modes.push(SizeMode::new(32, Surround51, Integer, 1));

            if floats {
                modes.push(SizeMode::new(32, Surround51, FloatAsInt32, 1));

                if !section.is_hybrid() {
                    modes.push(SizeMode::new(32, Surround51, Int32AsFloat, 1));
                }
            }
        }

        if floats {
            modes.push(SizeMode::new(32, Surround51, Float, 1));
        }

        modes
    }
}

/// Speed modes to run, in order
pub fn speed_modes(config: &HarnessConfig) -> Vec<SpeedMode> {
    if config.no_speeds {
        vec![SpeedMode::Normal]
    } else {
        SpeedMode::ALL.to_vec()
    }
}

/// Extra levels to run, in order. Level 0 always runs; the default and
/// exhaustive sets cover disjoint levels beyond it.
pub fn extra_levels(config: &HarnessConfig) -> Vec<u8> {
    let mut levels = vec![0];

    if config.no_extras {
        return levels;
    }

    for level in 1..=6u8 {
        let in_default = matches!(level, 2 | 5);
        if (in_default && config.default_suite) || (!in_default && config.exhaustive_suite) {
            levels.push(level);
        }
    }

    levels
}

/// Cases sharing a size mode
#[derive(Debug, Clone)]
pub struct Group {
    pub title: String,
    pub size: SizeMode,
    pub cases: Vec<TestCase>,
}

/// Groups of one section
#[derive(Debug, Clone)]
pub struct SectionPlan {
    pub section: Section,
    pub groups: Vec<Group>,
}

/// The complete ordered test plan
#[derive(Debug, Clone, Default)]
pub struct TestMatrix {
    sections: Vec<SectionPlan>,
}

impl TestMatrix {
    pub fn new(config: &HarnessConfig) -> Self {
        let speeds = speed_modes(config);
        let extras = extra_levels(config);
        let mut number = 0u32;
        let mut sections = Vec::new();

        if !config.default_suite && !config.exhaustive_suite {
            return Self { sections };
        }

        for section in Section::enabled(config) {
            let mut groups = Vec::new();

            for size in SizeMode::enabled(config, section) {
                let seconds = config.base_minutes * size.minutes_factor * 60;
                let mut cases = Vec::new();

                for &speed in &speeds {
                    for &extra in &extras {
                        number += 1;
                        cases.push(build_case(config, section, size, seconds, speed, extra, number));
                    }
                }

                groups.push(Group {
                    title: size.title(),
                    size,
                    cases,
                });
            }

            sections.push(SectionPlan { section, groups });
        }

        Self { sections }
    }

    pub fn sections(&self) -> &[SectionPlan] {
        &self.sections
    }

    /// All cases in run order
    pub fn cases(&self) -> impl Iterator<Item = &TestCase> {
        self.sections
            .iter()
            .flat_map(|s| s.groups.iter())
            .flat_map(|g| g.cases.iter())
    }

    pub fn len(&self) -> usize {
        self.cases().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn build_case(
    config: &HarnessConfig,
    section: Section,
    size: SizeMode,
    seconds: u32,
    speed: SpeedMode,
    extra: u8,
    number: u32,
) -> TestCase {
    let mut case = TestCase::new(number, size.layout, size.bits, seconds)
        .with_format(size.format)
        .with_speed(speed)
        .with_extra(extra)
        .with_buffer_size(config.buffer_size)
        .with_checksum(config.checksum);

    if let Some((bitrate, correction)) = section.hybrid() {
        case = case.with_hybrid(bitrate, correction);
    }
    if section == Section::HybridIgnoreCorrection {
        case = case.ignoring_correction();
    }
    if config.no_decode {
        case = case.without_decode();
    }
    if let Some(period) = config.fuzz_period {
        case = case.with_fuzz_period(period);
    }
    if config.write_ranges.contains(number) {
        case = case.with_capture(config.capture_dir.clone());
    }

    case
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> HarnessConfig {
        HarnessConfig::default()
    }

    #[test]
    fn test_extra_levels() {
        let mut config = default_config();
        assert_eq!(extra_levels(&config), vec![0, 2, 5]);

        config.exhaustive_suite = true;
        assert_eq!(extra_levels(&config), vec![0, 1, 2, 3, 4, 5, 6]);

        config.default_suite = false;
        assert_eq!(extra_levels(&config), vec![0, 1, 3, 4, 6]);

        config.no_extras = true;
        assert_eq!(extra_levels(&config), vec![0]);
    }

    #[test]
    fn test_default_matrix_shape() {
        let matrix = TestMatrix::new(&default_config());
        let sections: Vec<Section> = matrix.sections().iter().map(|s| s.section).collect();
        assert_eq!(
            sections,
            vec![
                Section::PureLossless,
                Section::HybridLossless,
                Section::HybridLossy,
                Section::HybridIgnoreCorrection
            ]
        );

        // 8-bit mono, 16-bit stereo, 24-bit 5.1, 32-bit float 5.1
        let groups = &matrix.sections()[0].groups;
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].title, "8-bit, mono");
        assert_eq!(groups[3].title, "32-bit float, 5.1 channels");

        // four speeds times three extra levels
        assert_eq!(groups[0].cases.len(), 12);
        assert_eq!(matrix.len(), 4 * 4 * 12);
    }

    #[test]
    fn test_numbering_is_sequential() {
        let matrix = TestMatrix::new(&default_config());
        for (i, case) in matrix.cases().enumerate() {
            assert_eq!(case.number, i as u32 + 1);
        }
    }

    #[test]
    fn test_run_lengths() {
        let matrix = TestMatrix::new(&default_config());
        let groups = &matrix.sections()[0].groups;
        assert_eq!(groups[0].cases[0].seconds, 600);
        assert_eq!(groups[1].cases[0].seconds, 360);
        assert_eq!(groups[2].cases[0].seconds, 120);
    }

    #[test]
    fn test_fuzzing_skips_hybrid_lossless() {
        let config = default_config().with_fuzz_period(5000);
        let matrix = TestMatrix::new(&config);
        assert!(matrix
            .sections()
            .iter()
            .all(|s| s.section != Section::HybridLossless));
        assert!(matrix.cases().all(|c| c.fuzz_period == Some(5000)));
    }

    #[test]
    fn test_exclusions() {
        let mut config = default_config();
        config.no_hybrid = true;
        config.no_speeds = true;
        config.no_floats = true;
        let matrix = TestMatrix::new(&config);

        assert_eq!(matrix.sections().len(), 1);
        assert_eq!(matrix.sections()[0].groups.len(), 3);
        assert!(matrix.cases().all(|c| c.speed == SpeedMode::Normal));
        assert!(matrix.cases().all(|c| c.format == SampleFormat::Integer));
    }

    #[test]
    fn test_no_lossy_keeps_hybrid_lossless() {
        let mut config = default_config();
        config.no_lossy = true;
        let sections: Vec<Section> = TestMatrix::new(&config)
            .sections()
            .iter()
            .map(|s| s.section)
            .collect();
        assert_eq!(sections, vec![Section::PureLossless, Section::HybridLossless]);
    }

    #[test]
    fn test_exhaustive_groups() {
        let matrix = TestMatrix::new(&HarnessConfig::exhaustive());
        let lossless: Vec<String> = matrix.sections()[0]
            .groups
            .iter()
            .map(|g| g.title.clone())
            .collect();
        assert_eq!(lossless.len(), 10);
        assert!(lossless.iter().any(|t| t.contains("integer stored as float")));

        let hybrid = &matrix.sections()[1].groups;
        assert_eq!(hybrid.len(), 9);
        assert!(!hybrid.iter().any(|g| g.title.contains("integer stored as float")));
    }

    #[test]
    fn test_hybrid_case_settings() {
        let matrix = TestMatrix::new(&default_config());
        let ignore = matrix
            .cases()
            .find(|c| c.ignore_correction)
            .unwrap();
        assert!(ignore.mode_string().ends_with("b4c"));
        assert!(!ignore.is_lossless());

        let lossy = matrix
            .cases()
            .find(|c| c.hybrid.is_some_and(|h| !h.create_correction))
            .unwrap();
        assert!(lossy.mode_string().ends_with("b5"));
    }

    #[test]
    fn test_write_ranges_select_capture() {
        let config = default_config()
            .with_write_ranges("2,5-6".parse().unwrap())
            .with_capture_dir("/tmp/captures");
        let matrix = TestMatrix::new(&config);
        let captured: Vec<u32> = matrix
            .cases()
            .filter(|c| c.capture_dir.is_some())
            .map(|c| c.number)
            .collect();
        assert_eq!(captured, vec![2, 5, 6]);
    }

    #[test]
    fn test_no_suite_selected_is_empty() {
        let mut config = default_config();
        config.default_suite = false;
        assert!(TestMatrix::new(&config).is_empty());
    }
}
