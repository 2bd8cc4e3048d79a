//! Round-trip verification pipeline and suite runner
//!
//! A [`RoundTrip`] runs one [`TestCase`]: it synthesises audio, feeds it to an
//! encoder on the calling thread, decodes concurrently on a scoped worker
//! thread, and compares sample counts and MD5 hashes of the canonical PCM on
//! both sides. A [`Suite`] walks the whole [`TestMatrix`] and stops at the
//! first failure.

use crate::codec::{
    mode_tag, BlockSink, ByteSource, Codec, EncoderConfig, HybridConfig, SpeedMode,
};
use crate::config::HarnessConfig;
use crate::fuzz::FuzzInjector;
use crate::matrix::{Section, TestMatrix};
use crate::mixer::{ChannelLayout, SignalSource, BLOCK_FRAMES};
use crate::packer::{prepare_block, store_samples, PackFormat, SampleFormat};
use crate::random::SharedRandom;
use crate::report::SuiteReport;
use crate::stream::{VirtualStream, DEFAULT_CAPACITY};
use crate::{HarnessError, Result};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

/// Sample rate of all generated audio
pub const SAMPLE_RATE: u32 = 44100;

/// Frames requested from the decoder per call
pub const DECODE_FRAMES: usize = 1000;

const UNKNOWN_MD5: &str = "????????????????????????????????";

// ============================================================================
// Test cases
// ============================================================================

/// One fully specified round trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Sequence number, from 1
    pub number: u32,
    pub layout: ChannelLayout,
    pub bits: u32,
    pub format: SampleFormat,
    pub seconds: u32,
    pub speed: SpeedMode,
    pub extra: u8,
    pub hybrid: Option<HybridConfig>,
    /// Decode without the correction stream even if one is produced
    pub ignore_correction: bool,
    pub decode: bool,
    pub fuzz_period: Option<u32>,
    /// Mirror encoded streams into this directory
    pub capture_dir: Option<PathBuf>,
    pub checksum: bool,
    pub buffer_size: usize,
}

impl TestCase {
    /// Plain integer, normal speed, lossless case
    pub fn new(number: u32, layout: ChannelLayout, bits: u32, seconds: u32) -> Self {
        Self {
            number,
            layout,
            bits,
            format: SampleFormat::Integer,
            seconds,
            speed: SpeedMode::Normal,
            extra: 0,
            hybrid: None,
            ignore_correction: false,
            decode: true,
            fuzz_period: None,
            capture_dir: None,
            checksum: true,
            buffer_size: DEFAULT_CAPACITY,
        }
    }

    pub fn with_format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

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

    pub fn ignoring_correction(mut self) -> Self {
        self.ignore_correction = true;
        self
    }

    pub fn without_decode(mut self) -> Self {
        self.decode = false;
        self
    }

    pub fn with_fuzz_period(mut self, period: u32) -> Self {
        self.fuzz_period = Some(period);
        self
    }

    pub fn with_capture(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = Some(dir.into());
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn creates_correction(&self) -> bool {
        self.hybrid.is_some_and(|h| h.create_correction)
    }

    /// Correction stream produced and used on decode
    pub fn honours_correction(&self) -> bool {
        self.creates_correction() && !self.ignore_correction
    }

    /// Decoded audio must match the input exactly
    pub fn is_lossless(&self) -> bool {
        self.hybrid.is_none() || self.honours_correction()
    }

    /// Codec configuration for this case
    pub fn encoder_config(&self) -> Result<EncoderConfig> {
        self.format.validate(self.bits)?;

        Ok(EncoderConfig {
            sample_rate: SAMPLE_RATE,
            num_channels: self.layout.channels(),
            channel_mask: self.layout.channel_mask(),
            bits_per_sample: self.format.codec_bits(self.bits),
            bytes_per_sample: self.format.bytes_per_sample(self.bits),
            float_data: self.format.is_float(),
            speed: self.speed,
            extra: self.extra,
            hybrid: self.hybrid,
            checksum: self.checksum,
        })
    }

    /// Mode tag used in pass lines, such as `-hx3b3c`
    pub fn mode_string(&self) -> String {
        mode_tag(self.speed, self.extra, self.hybrid.as_ref())
    }

    fn capture_paths(&self, extension: &str) -> Option<(PathBuf, PathBuf)> {
        let dir = self.capture_dir.as_ref()?;
        let main = dir.join(format!("testfile-{:04}.{}", self.number, extension));
        let correction = dir.join(format!("testfile-{:04}.{}c", self.number, extension));
        Some((main, correction))
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// How a case ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Counts, hashes and error tally all matched
    Passed,
    /// Mismatches occurred under fuzzing and were accepted
    Tolerated,
    /// Content mismatch
    Failed,
    /// The case could not be run
    SetupFailed,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Passed | Verdict::Tolerated)
    }
}

/// Result of one round trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    pub number: u32,
    pub mode: String,
    pub description: String,
    pub verdict: Verdict,
    pub encoded_samples: u64,
    pub decoded_samples: u64,
    pub encoded_md5: String,
    pub decoded_md5: Option<String>,
    pub decode_errors: u32,
    pub encoded_bytes: u64,
    pub first_block_size: usize,
    pub reduction_percent: f64,
    pub bits_per_sample: f64,
    pub fuzz_hits: u64,
    pub lossless: bool,
    pub duration_ms: u64,
    pub message: Option<String>,
}

impl TestOutcome {
    /// Outcome for a case that never produced results
    pub fn setup_failure(case: &TestCase, error: &HarnessError) -> Self {
        Self {
            number: case.number,
            mode: case.mode_string(),
            description: describe(case),
            verdict: Verdict::SetupFailed,
            encoded_samples: 0,
            decoded_samples: 0,
            encoded_md5: UNKNOWN_MD5.to_string(),
            decoded_md5: None,
            decode_errors: 0,
            encoded_bytes: 0,
            first_block_size: 0,
            reduction_percent: 0.0,
            bits_per_sample: 0.0,
            fuzz_hits: 0,
            lossless: case.is_lossless(),
            duration_ms: 0,
            message: Some(error.to_string()),
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict.is_pass()
    }

    /// One-line result in the form `pass (mode, reduction%, bps bps, md5)`.
    /// Tolerated mismatches also carry the sample counts and error tally.
    pub fn summary(&self) -> String {
        match self.verdict {
            Verdict::Passed => format!(
                "pass ({:>8}, {:.2}%, {:.2} bps, {})",
                self.mode,
                self.reduction_percent,
                self.bits_per_sample,
                self.decoded_md5.as_deref().unwrap_or(UNKNOWN_MD5)
            ),
            Verdict::Tolerated => format!(
                "pass ({:>8}, {:.2}%, {:.2} bps, {}, {} of {} samples, {} errors, {} hits)",
                self.mode,
                self.reduction_percent,
                self.bits_per_sample,
                self.decoded_md5.as_deref().unwrap_or(UNKNOWN_MD5),
                self.decoded_samples,
                self.encoded_samples,
                self.decode_errors,
                self.fuzz_hits
            ),
            Verdict::Failed => format!(
                "fail ({}, {} of {} samples, {} errors)",
                self.mode, self.decoded_samples, self.encoded_samples, self.decode_errors
            ),
            Verdict::SetupFailed => format!(
                "setup failure: {}",
                self.message.as_deref().unwrap_or("unknown")
            ),
        }
    }

    /// Multi-line comparison block for mismatches
    pub fn diagnostics(&self) -> String {
        let rule = "-".repeat(45);
        format!(
            "{rule}\nenc/dec sample count: {} / {}\nencoded md5: {}\ndecoded md5: {}\nreported decode errors: {}\n{rule}",
            self.encoded_samples,
            self.decoded_samples,
            self.encoded_md5,
            self.decoded_md5.as_deref().unwrap_or(UNKNOWN_MD5),
            self.decode_errors,
        )
    }

    /// Whether counts, hashes and errors all matched
    pub fn is_exact(&self) -> bool {
        self.decode_errors == 0
            && self.decoded_samples == self.encoded_samples
            && (!self.lossless || self.decoded_md5.as_deref() == Some(self.encoded_md5.as_str()))
    }
}

fn describe(case: &TestCase) -> String {
    let layout = match case.layout {
        ChannelLayout::Mono => "mono",
        ChannelLayout::Stereo => "stereo",
        ChannelLayout::Quad => "quad",
        ChannelLayout::Surround51 => "5.1",
    };
    let format = match case.format {
        SampleFormat::Integer => "int",
        SampleFormat::Float => "float",
        SampleFormat::FloatAsInt32 => "float-as-int",
        SampleFormat::Int32AsFloat => "int-as-float",
    };
    format!(
        "{}-bit {} {}, {} s, {}",
        case.bits, format, layout, case.seconds, case.speed
    )
}

// ============================================================================
// Round trip
// ============================================================================

#[derive(Debug)]
struct EncodeSummary {
    frames: u64,
    md5: [u8; 16],
}

#[derive(Debug, Default)]
struct DecodeSummary {
    frames: u64,
    md5: Option<[u8; 16]>,
    errors: u32,
}

/// Decoder worker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodePhase {
    Opening,
    Open,
    Draining,
    Closed,
}

fn finish(md5: Md5) -> [u8; 16] {
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&md5.finalize());
    digest
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Runs single test cases against a codec
pub struct RoundTrip<'c> {
    codec: &'c dyn Codec,
    rng: SharedRandom,
}

impl<'c> RoundTrip<'c> {
    /// The generator is shared with the caller and keeps advancing across cases
    pub fn new(codec: &'c dyn Codec, rng: SharedRandom) -> Self {
        Self { codec, rng }
    }

    fn open_stream(
        &self,
        case: &TestCase,
        decoded: bool,
        capture: Option<PathBuf>,
    ) -> Result<VirtualStream> {
        let mut stream = if decoded {
            VirtualStream::new(case.buffer_size)
        } else {
            VirtualStream::sink()
        };

        if decoded {
            if let Some(period) = case.fuzz_period {
                stream = stream.with_fuzz(FuzzInjector::new(period, self.rng.clone())?);
            }
        }

        match capture {
            Some(path) => stream.with_capture(path),
            None => Ok(stream),
        }
    }

    /// Run one case to completion
    pub fn run(&self, case: &TestCase) -> Result<TestOutcome> {
        let started = Instant::now();
        let config = case.encoder_config()?;
        let channels = case.layout.channels();
        let paths = case.capture_paths(self.codec.file_extension());

        log::debug!("test {:04}: configuring {}", case.number, describe(case));

        let main = self.open_stream(case, case.decode, paths.as_ref().map(|p| p.0.clone()))?;
        let correction = if case.creates_correction() {
            Some(self.open_stream(
                case,
                case.decode && !case.ignore_correction,
                paths.as_ref().map(|p| p.1.clone()),
            )?)
        } else {
            None
        };
        let decode_correction = correction.as_ref().filter(|_| case.honours_correction());

        let (encoded, decoded) = thread::scope(|scope| {
            let worker = case.decode.then(|| {
                let main = &main;
                scope.spawn(move || self.decode(main, decode_correction))
            });

            log::debug!("test {:04}: encoding", case.number);
            let encoded = self.encode(case, &config, &main, correction.as_ref());

            main.mark_done();
            if let Some(c) = &correction {
                c.mark_done();
            }

            let decoded = worker.map(|handle| handle.join());
            (encoded, decoded)
        });

        main.release();
        if let Some(c) = &correction {
            c.release();
        }

        let decoded = match decoded {
            Some(Ok(summary)) => Some(summary),
            Some(Err(payload)) => {
                let message = panic_message(payload);
                log::error!("test {:04}: decoder worker panicked: {}", case.number, message);
                return Err(HarnessError::WorkerPanicked(message));
            }
            None => None,
        };
        let encoded = encoded?;

        let main_stats = main.stats();
        let correction_stats = correction.as_ref().map(|c| c.stats());
        let mut encoded_bytes = main_stats.bytes_written;
        if case.honours_correction() {
            encoded_bytes += correction_stats.map_or(0, |s| s.bytes_written);
        }
        let fuzz_hits = main_stats.fuzz_hits + correction_stats.map_or(0, |s| s.fuzz_hits);

        let frames = encoded.frames.max(1) as f64;
        let ratio = encoded_bytes as f64 / (frames * config.bytes_per_sample as f64 * channels as f64);
        let bps = encoded_bytes as f64 * 8.0 / (frames * channels as f64);

        let mut outcome = TestOutcome {
            number: case.number,
            mode: case.mode_string(),
            description: describe(case),
            verdict: Verdict::Passed,
            encoded_samples: encoded.frames,
            decoded_samples: decoded.as_ref().map_or(0, |d| d.frames),
            encoded_md5: hex::encode(encoded.md5),
            decoded_md5: decoded.as_ref().and_then(|d| d.md5).map(hex::encode),
            decode_errors: decoded.as_ref().map_or(0, |d| d.errors),
            encoded_bytes,
            first_block_size: main_stats.first_block_size,
            reduction_percent: 100.0 - ratio * 100.0,
            bits_per_sample: bps,
            fuzz_hits,
            lossless: case.is_lossless(),
            duration_ms: started.elapsed().as_millis() as u64,
            message: None,
        };

        if decoded.is_some() && !outcome.is_exact() {
            if case.fuzz_period.is_some() {
                log::warn!(
                    "test {:04}: mismatch tolerated under fuzzing ({} errors, {} hits)",
                    case.number,
                    outcome.decode_errors,
                    fuzz_hits
                );
                outcome.verdict = Verdict::Tolerated;
            } else {
                log::warn!("test {:04}: round trip mismatch", case.number);
                outcome.verdict = Verdict::Failed;
            }
        }

        log::info!("test {:04}: {}", case.number, outcome.summary());
        Ok(outcome)
    }

    fn encode(
        &self,
        case: &TestCase,
        config: &EncoderConfig,
        main: &VirtualStream,
        correction: Option<&VirtualStream>,
    ) -> Result<EncodeSummary> {
        let mut encoder =
            self.codec
                .create_encoder(config, main, correction.map(|c| c as &dyn BlockSink))?;

        let channels = case.layout.channels();
        let canonical_format = PackFormat::canonical(config.bytes_per_sample);
        let mut source = SignalSource::new(case.layout, SAMPLE_RATE);
        let mut block = vec![0.0f32; BLOCK_FRAMES * channels];
        let mut words = vec![0i32; BLOCK_FRAMES * channels];
        let mut canonical = Vec::with_capacity(BLOCK_FRAMES * channels * 4);
        let mut md5 = Md5::new();

        while source.seconds() < case.seconds {
            {
                let mut rng = self.rng.lock();
                source.render_block(&mut rng, &mut block);
                prepare_block(case.format, case.bits, &mut block, &mut rng, &mut words)?;
            }

            if let Err(e) = encoder.pack_samples(&words) {
                log::warn!("test {:04}: pack_samples failed: {}", case.number, e);
            }

            canonical.clear();
            store_samples(&mut canonical, &words, canonical_format)?;
            md5.update(&canonical);
        }

        encoder.flush()?;
        let digest = finish(md5);

        if config.checksum {
            encoder.store_checksum(digest)?;
            encoder.flush()?;
        }

        encoder.close()?;

        Ok(EncodeSummary {
            frames: source.total_frames(),
            md5: digest,
        })
    }

    fn decode(&self, main: &VirtualStream, correction: Option<&VirtualStream>) -> DecodeSummary {
        let done = || main.is_done() || correction.is_some_and(|c| c.is_done());
        let mut summary = DecodeSummary::default();
        let mut phase = DecodePhase::Opening;
        let mut decoder = None;
        let mut buffer = Vec::new();
        let mut canonical = Vec::new();
        let mut md5 = Md5::new();

        while phase != DecodePhase::Closed {
            match phase {
                DecodePhase::Opening => {
                    match self
                        .codec
                        .open_decoder(main, correction.map(|c| c as &dyn ByteSource))
                    {
                        Ok(d) => {
                            decoder = Some(d);
                            phase = DecodePhase::Open;
                        }
                        Err(e) => {
                            log::trace!("decoder open failed: {}", e);
                            summary.errors += 1;
                            if done() {
                                phase = DecodePhase::Closed;
                            }
                        }
                    }
                }
                DecodePhase::Open => {
                    if let Some(d) = decoder.as_ref() {
                        buffer.resize(DECODE_FRAMES * d.num_channels(), 0);
                    }
                    log::debug!("decoder open after {} failed attempts", summary.errors);
                    phase = DecodePhase::Draining;
                }
                DecodePhase::Draining => {
                    let Some(d) = decoder.as_mut() else {
                        phase = DecodePhase::Closed;
                        continue;
                    };

                    let frames = d.unpack_samples(&mut buffer, DECODE_FRAMES);
                    if frames > 0 {
                        let format = PackFormat::canonical(d.bytes_per_sample());
                        canonical.clear();
                        if store_samples(&mut canonical, &buffer[..frames * d.num_channels()], format)
                            .is_err()
                        {
                            summary.errors += 1;
                        }
                        md5.update(&canonical);
                        summary.frames += frames as u64;
                    } else if done() {
                        phase = DecodePhase::Closed;
                    } else {
                        summary.errors += 1;
                    }
                }
                DecodePhase::Closed => {}
            }
        }

        if let Some(d) = decoder {
            summary.errors = d.num_errors();
            summary.md5 = Some(finish(md5));
        }

        log::debug!(
            "decoder closed: {} frames, {} errors",
            summary.frames,
            summary.errors
        );
        summary
    }
}

// ============================================================================
// Suite
// ============================================================================

/// Progress notifications from a suite run
#[derive(Debug)]
pub enum SuiteEvent<'a> {
    SectionStarted(Section),
    GroupStarted(&'a str),
    CaseStarted(&'a TestCase),
    CaseFinished(&'a TestOutcome),
    CaseAborted(&'a TestCase, &'a HarnessError),
}

/// Runs every case of the matrix in order
pub struct Suite<C: Codec> {
    config: HarnessConfig,
    codec: C,
    rng: SharedRandom,
    matrix: TestMatrix,
}

impl<C: Codec> Suite<C> {
    pub fn new(config: HarnessConfig, codec: C) -> Result<Self> {
        config.validate()?;
        let matrix = TestMatrix::new(&config);
        let rng = SharedRandom::new(config.seed);

        Ok(Self {
            config,
            codec,
            rng,
            matrix,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn matrix(&self) -> &TestMatrix {
        &self.matrix
    }

    pub fn run(&mut self) -> SuiteReport {
        self.run_with(|_| {})
    }

    /// Run the suite, reporting progress to `observer`. Stops at the first
    /// case that fails or cannot be set up.
    pub fn run_with<F>(&mut self, mut observer: F) -> SuiteReport
    where
        F: FnMut(&SuiteEvent<'_>),
    {
        let mut report = SuiteReport::new(format!("{} codec round trips", self.codec.name()));
        report.seed = Some(self.config.seed);
        report.fuzz_period = self.config.fuzz_period;

        let round_trip = RoundTrip::new(&self.codec, self.rng.clone());

        'sections: for plan in self.matrix.sections() {
            log::info!("section: {}", plan.section.title());
            observer(&SuiteEvent::SectionStarted(plan.section));

            for group in &plan.groups {
                log::info!("group: {}", group.title);
                observer(&SuiteEvent::GroupStarted(&group.title));

                for case in &group.cases {
                    observer(&SuiteEvent::CaseStarted(case));

                    match round_trip.run(case) {
                        Ok(outcome) => {
                            observer(&SuiteEvent::CaseFinished(&outcome));
                            let passed = outcome.passed();
                            report.add_outcome(outcome);
                            if !passed {
                                break 'sections;
                            }
                        }
                        Err(error) => {
                            log::error!("test {:04}: {}", case.number, error);
                            observer(&SuiteEvent::CaseAborted(case, &error));
                            report.add_outcome(TestOutcome::setup_failure(case, &error));
                            break 'sections;
                        }
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ReferenceCodec;

    fn run(case: &TestCase) -> TestOutcome {
        RoundTrip::new(&ReferenceCodec, SharedRandom::default())
            .run(case)
            .unwrap()
    }

    #[test]
    fn test_lossless_stereo_passes() {
        let outcome = run(&TestCase::new(1, ChannelLayout::Stereo, 16, 1));
        assert_eq!(outcome.verdict, Verdict::Passed);
        assert_eq!(outcome.decoded_samples, outcome.encoded_samples);
        assert_eq!(outcome.decoded_md5.as_deref(), Some(outcome.encoded_md5.as_str()));
        assert!(outcome.summary().starts_with("pass ("));
    }

    #[test]
    fn test_no_decode_passes_without_hash() {
        let outcome = run(&TestCase::new(1, ChannelLayout::Mono, 16, 1).without_decode());
        assert_eq!(outcome.verdict, Verdict::Passed);
        assert!(outcome.decoded_md5.is_none());
        assert!(outcome.summary().contains(UNKNOWN_MD5));
        assert!(outcome.encoded_bytes > 0);
    }

    #[test]
    fn test_hybrid_lossy_counts_only() {
        let outcome = run(&TestCase::new(1, ChannelLayout::Stereo, 16, 1).with_hybrid(5.0, false));
        assert_eq!(outcome.verdict, Verdict::Passed);
        assert!(!outcome.lossless);
        assert_ne!(outcome.decoded_md5.as_deref(), Some(outcome.encoded_md5.as_str()));
    }

    #[test]
    fn test_ignored_correction_is_lossy() {
        let case = TestCase::new(1, ChannelLayout::Stereo, 16, 1)
            .with_hybrid(4.0, true)
            .ignoring_correction();
        assert!(!case.is_lossless());

        let outcome = run(&case);
        assert_eq!(outcome.verdict, Verdict::Passed);
        assert!(outcome.mode.ends_with("b4c"));
    }

    #[test]
    fn test_small_buffer_still_completes() {
        let outcome = run(&TestCase::new(1, ChannelLayout::Quad, 24, 1).with_buffer_size(64));
        assert_eq!(outcome.verdict, Verdict::Passed);
    }

    #[test]
    fn test_capture_failure_is_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let case = TestCase::new(3, ChannelLayout::Mono, 8, 1)
            .with_capture(dir.path().join("missing"));

        let err = RoundTrip::new(&ReferenceCodec, SharedRandom::default())
            .run(&case)
            .unwrap_err();
        assert!(err.is_setup_failure());
        assert!(err.to_string().contains("testfile-0003.rts"));
    }

    #[test]
    fn test_invalid_bits_rejected() {
        let case = TestCase::new(1, ChannelLayout::Stereo, 24, 1).with_format(SampleFormat::FloatAsInt32);
        let err = RoundTrip::new(&ReferenceCodec, SharedRandom::default())
            .run(&case)
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidBitDepth(24)));
        assert!(!err.is_setup_failure());
    }

    #[test]
    fn test_mode_string_matches_codec() {
        let case = TestCase::new(1, ChannelLayout::Stereo, 16, 1)
            .with_speed(SpeedMode::High)
            .with_extra(3)
            .with_hybrid(3.0, true);
        assert_eq!(case.mode_string(), "-hx3b3c");
        assert_eq!(case.encoder_config().unwrap().mode_string(), case.mode_string());
    }

    #[test]
    fn test_tolerated_summary_reports_errors() {
        let case = TestCase::new(7, ChannelLayout::Mono, 16, 1);
        let mut outcome = run(&case);
        outcome.verdict = Verdict::Tolerated;
        outcome.decoded_samples = outcome.encoded_samples - 128;
        outcome.decode_errors = 3;
        outcome.fuzz_hits = 41;

        let line = outcome.summary();
        assert!(line.starts_with("pass ("));
        assert!(line.contains("3 errors"));
        assert!(line.contains("41 hits"));
        assert!(line.contains(&format!(
            "{} of {} samples",
            outcome.decoded_samples, outcome.encoded_samples
        )));

        outcome.verdict = Verdict::Passed;
        assert!(!outcome.summary().contains("errors"));
    }

    #[test]
    fn test_diagnostics_lists_counts() {
        let outcome = run(&TestCase::new(1, ChannelLayout::Mono, 8, 1));
        let text = outcome.diagnostics();
        assert!(text.contains("enc/dec sample count"));
        assert!(text.contains(&outcome.encoded_md5));
    }
}
