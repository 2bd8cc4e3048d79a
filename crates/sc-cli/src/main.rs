//! StreamCheck command-line driver
//!
//! Usage:
//!   streamcheck --default                 - Run the default test set
//!   streamcheck --exhaustive --short      - Run everything with short runs
//!   streamcheck --default --fuzz-period=5000
//!   streamcheck --default --write=1-3,17  - Capture selected tests to disk

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use sc_harness::{
    HarnessConfig, ReferenceCodec, ReportFormat, Suite, SuiteEvent, SuiteReport, TestOutcome,
    Verdict, WriteRanges,
};

#[derive(Parser, Debug)]
#[command(
    name = "streamcheck",
    version,
    about = "Streaming audio codec round-trip tester",
    after_help = "Decode errors are reported and ignored while fuzzing."
)]
struct Cli {
    /// Perform the default test suite
    #[arg(long = "default")]
    default_suite: bool,

    /// Perform the exhaustive test suite
    #[arg(long)]
    exhaustive: bool,

    /// Perform shorter runs of each test
    #[arg(long, conflicts_with = "long")]
    short: bool,

    /// Perform longer runs of each test
    #[arg(long)]
    long: bool,

    /// Fuzz at the specified average period in bytes (10 - 1000000)
    #[arg(long, value_name = "N")]
    fuzz_period: Option<u32>,

    /// Skip the decoding process
    #[arg(long)]
    no_decode: bool,

    /// Skip the "extra" modes
    #[arg(long)]
    no_extras: bool,

    /// Skip the hybrid modes
    #[arg(long)]
    no_hybrid: bool,

    /// Skip the float modes
    #[arg(long)]
    no_floats: bool,

    /// Skip the lossy modes
    #[arg(long)]
    no_lossy: bool,

    /// Skip the speed modes (fast, high, etc.)
    #[arg(long)]
    no_speeds: bool,

    /// Do not embed checksums in encoded streams
    #[arg(long)]
    no_checksum: bool,

    /// Write specific test(s) or range(s) to disk, e.g. 1-3,17
    #[arg(long, value_name = "N[-N][,...]")]
    write: Option<WriteRanges>,

    /// Directory receiving files selected with --write
    #[arg(long, value_name = "DIR", default_value = ".")]
    capture_dir: PathBuf,

    /// Generator seed
    #[arg(long, value_parser = parse_seed)]
    seed: Option<u64>,

    /// Channel capacity in bytes
    #[arg(long, value_name = "BYTES")]
    buffer_size: Option<usize>,

    /// Save a report; the format follows the extension (.json, .md, .xml)
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn harness_config(&self) -> HarnessConfig {
        let mut config = HarnessConfig {
            default_suite: self.default_suite,
            exhaustive_suite: self.exhaustive,
            fuzz_period: self.fuzz_period,
            no_decode: self.no_decode,
            no_extras: self.no_extras,
            no_hybrid: self.no_hybrid,
            no_floats: self.no_floats,
            no_lossy: self.no_lossy,
            no_speeds: self.no_speeds,
            write_ranges: self.write.clone().unwrap_or_default(),
            capture_dir: self.capture_dir.clone(),
            checksum: !self.no_checksum,
            ..Default::default()
        };

        if self.short {
            config.base_minutes = 1;
        } else if self.long {
            config.base_minutes = 5;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(size) = self.buffer_size {
            config.buffer_size = size;
        }

        config
    }

    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Accept decimal or `0x` hexadecimal seeds
fn parse_seed(text: &str) -> std::result::Result<u64, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid seed {}: {}", text, e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .format_timestamp(None)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    println!(
        "\n StreamCheck  Streaming Audio Codec Round-Trip Tester  Version {}\n",
        env!("CARGO_PKG_VERSION")
    );

    if !cli.default_suite && !cli.exhaustive {
        println!("{}", Cli::command().render_help());
        return Ok(false);
    }

    let config = cli.harness_config();
    let mut suite = Suite::new(config, ReferenceCodec)?;
    log::info!("{} tests planned", suite.matrix().len());

    let report = suite.run_with(print_event);

    if report.all_passed() {
        println!("\nall tests pass\n");
    } else {
        println!("\ntest failed!\n");
    }

    if let Some(path) = &cli.report {
        save_report(&report, path)?;
    }

    Ok(report.all_passed())
}

fn print_event(event: &SuiteEvent<'_>) {
    match event {
        SuiteEvent::SectionStarted(section) => {
            let heading = format!("****** {} ******", section.title());
            println!("\n\n{:^80}", heading);
        }
        SuiteEvent::GroupStarted(title) => println!("\n   *** {} ***", title),
        SuiteEvent::CaseStarted(case) => {
            print!("test {:04}...", case.number);
            if let Err(e) = io::stdout().flush() {
                log::warn!("failed to flush stdout: {}", e);
            }
        }
        SuiteEvent::CaseFinished(outcome) => println!("{}", result_text(outcome)),
        SuiteEvent::CaseAborted(_, error) => println!("{}", error),
    }
}

/// Text printed after `test NNNN...` once a case has finished
fn result_text(outcome: &TestOutcome) -> String {
    match outcome.verdict {
        Verdict::Passed => outcome.summary(),
        Verdict::Tolerated => format!("\n{}\n{}", outcome.diagnostics(), outcome.summary()),
        Verdict::Failed | Verdict::SetupFailed => format!("\n{}", outcome.diagnostics()),
    }
}

fn save_report(report: &SuiteReport, path: &Path) -> Result<()> {
    let format = ReportFormat::from_path(path);
    report
        .save(path, format)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    println!("report written to {}", path.display());
    Ok(())
}
