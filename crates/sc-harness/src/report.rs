//! Report generation for suite runs

use crate::Result;
use crate::harness::{TestOutcome, Verdict};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Results of a suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub title: String,

    pub timestamp: String,

    /// Generator seed at the start of the run
    pub seed: Option<u64>,

    /// Fuzz period, if the run injected corruption
    pub fuzz_period: Option<u32>,

    /// Outcomes in run order
    pub outcomes: Vec<TestOutcome>,

    pub summary: SuiteSummary,
}

/// Totals over all outcomes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total_cases: usize,
    pub passed_cases: usize,
    pub tolerated_cases: usize,
    pub failed_cases: usize,
    pub setup_failures: usize,
    pub total_samples: u64,
    pub total_encoded_bytes: u64,
    pub total_fuzz_hits: u64,
    pub total_decode_errors: u64,
    pub total_duration_ms: u64,
}

impl SuiteReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            timestamp: timestamp_now(),
            seed: None,
            fuzz_period: None,
            outcomes: Vec::new(),
            summary: SuiteSummary::default(),
        }
    }

    pub fn add_outcome(&mut self, outcome: TestOutcome) {
        let summary = &mut self.summary;
        summary.total_cases += 1;
        match outcome.verdict {
            Verdict::Passed => summary.passed_cases += 1,
            Verdict::Tolerated => summary.tolerated_cases += 1,
            Verdict::Failed => summary.failed_cases += 1,
            Verdict::SetupFailed => summary.setup_failures += 1,
        }
        summary.total_samples += outcome.encoded_samples;
        summary.total_encoded_bytes += outcome.encoded_bytes;
        summary.total_fuzz_hits += outcome.fuzz_hits;
        summary.total_decode_errors += outcome.decode_errors as u64;
        summary.total_duration_ms += outcome.duration_ms;

        self.outcomes.push(outcome);
    }

    /// True when no case failed or aborted
    pub fn all_passed(&self) -> bool {
        self.summary.failed_cases == 0 && self.summary.setup_failures == 0
    }

    /// First case that did not pass
    pub fn first_failure(&self) -> Option<&TestOutcome> {
        self.outcomes.iter().find(|o| !o.passed())
    }

    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.to_text(),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::JUnit => self.to_junit(),
        }
    }

    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", self.title));
        output.push_str(&format!("{}\n\n", "=".repeat(self.title.len())));
        output.push_str(&format!("Timestamp: {}\n", self.timestamp));
        if let Some(seed) = self.seed {
            output.push_str(&format!("Seed: {:#018x}\n", seed));
        }
        if let Some(period) = self.fuzz_period {
            output.push_str(&format!("Fuzz period: {} bytes\n", period));
        }
        output.push('\n');

        output.push_str("Summary:\n");
        output.push_str(&format!(
            "  Cases: {} total, {} passed, {} tolerated, {} failed, {} aborted\n",
            self.summary.total_cases,
            self.summary.passed_cases,
            self.summary.tolerated_cases,
            self.summary.failed_cases,
            self.summary.setup_failures
        ));
        output.push_str(&format!(
            "  Samples: {}, encoded bytes: {}\n",
            self.summary.total_samples, self.summary.total_encoded_bytes
        ));
        if self.fuzz_period.is_some() {
            output.push_str(&format!(
                "  Fuzz hits: {}, decode errors: {}\n",
                self.summary.total_fuzz_hits, self.summary.total_decode_errors
            ));
        }
        output.push_str(&format!("  Duration: {} ms\n\n", self.summary.total_duration_ms));

        output.push_str("Results:\n");
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for outcome in &self.outcomes {
            output.push_str(&format!(
                "test {:04}: {}\n    {}\n",
                outcome.number,
                outcome.description,
                outcome.summary()
            ));
            if !outcome.passed() && outcome.verdict != Verdict::SetupFailed {
                for line in outcome.diagnostics().lines() {
                    output.push_str(&format!("    {}\n", line));
                }
            }
        }

        output
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into())
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", self.title));
        output.push_str(&format!("**Timestamp:** {}\n\n", self.timestamp));

        let status = if self.all_passed() { "✅ PASS" } else { "❌ FAIL" };
        output.push_str(&format!("## Status: {}\n\n", status));

        output.push_str("## Summary\n\n");
        output.push_str("| Metric | Value |\n");
        output.push_str("|--------|-------|\n");
        output.push_str(&format!("| Cases | {} |\n", self.summary.total_cases));
        output.push_str(&format!("| Passed | {} |\n", self.summary.passed_cases));
        output.push_str(&format!("| Tolerated | {} |\n", self.summary.tolerated_cases));
        output.push_str(&format!("| Failed | {} |\n", self.summary.failed_cases));
        output.push_str(&format!("| Aborted | {} |\n", self.summary.setup_failures));
        output.push_str(&format!("| Fuzz Hits | {} |\n", self.summary.total_fuzz_hits));
        output.push_str(&format!("| Duration | {} ms |\n\n", self.summary.total_duration_ms));

        output.push_str("## Results\n\n");
        output.push_str("| Test | Description | Mode | Status | Reduction | Bits/Sample |\n");
        output.push_str("|------|-------------|------|--------|-----------|-------------|\n");
        for outcome in &self.outcomes {
            let status = match outcome.verdict {
                Verdict::Passed => "✅",
                Verdict::Tolerated => "⚠️",
                Verdict::Failed | Verdict::SetupFailed => "❌",
            };
            output.push_str(&format!(
                "| {:04} | {} | `{}` | {} | {:.2}% | {:.2} |\n",
                outcome.number,
                outcome.description,
                outcome.mode,
                status,
                outcome.reduction_percent,
                outcome.bits_per_sample
            ));
        }
        output.push('\n');

        if let Some(failure) = self.first_failure() {
            output.push_str(&format!("## Failure: test {:04}\n\n", failure.number));
            match &failure.message {
                Some(message) => output.push_str(&format!("{}\n", message)),
                None => {
                    output.push_str("```\n");
                    output.push_str(&failure.diagnostics());
                    output.push_str("\n```\n");
                }
            }
        }

        output
    }

    pub fn to_junit(&self) -> String {
        let mut output = String::new();

        output.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        output.push_str(&format!(
            "<testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" time=\"{}\">\n",
            xml_escape(&self.title),
            self.summary.total_cases,
            self.summary.failed_cases,
            self.summary.setup_failures,
            self.summary.total_duration_ms as f64 / 1000.0
        ));

        for outcome in &self.outcomes {
            output.push_str(&format!(
                "  <testcase name=\"{:04} {} {}\" time=\"{}\">\n",
                outcome.number,
                xml_escape(&outcome.description),
                xml_escape(&outcome.mode),
                outcome.duration_ms as f64 / 1000.0
            ));

            match outcome.verdict {
                Verdict::Failed => output.push_str(&format!(
                    "    <failure message=\"{}\">{}</failure>\n",
                    xml_escape(&outcome.summary()),
                    xml_escape(&outcome.diagnostics())
                )),
                Verdict::SetupFailed => output.push_str(&format!(
                    "    <error message=\"{}\"/>\n",
                    xml_escape(outcome.message.as_deref().unwrap_or("unknown"))
                )),
                Verdict::Passed | Verdict::Tolerated => {}
            }

            output.push_str("  </testcase>\n");
        }

        output.push_str("</testsuite>\n");
        output
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, format: ReportFormat) -> Result<()> {
        fs::write(path, self.render(format))?;
        Ok(())
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
    JUnit,
}

impl ReportFormat {
    /// Guess the format from a file extension, defaulting to text
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ReportFormat::Json,
            Some("md") | Some("markdown") => ReportFormat::Markdown,
            Some("xml") => ReportFormat::JUnit,
            _ => ReportFormat::Text,
        }
    }
}

fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    format_utc(secs)
}

fn is_leap(year: u64) -> bool {
    year.is_multiple_of(4) && (!year.is_multiple_of(100) || year.is_multiple_of(400))
}

/// ISO 8601 UTC rendering of a Unix time
fn format_utc(secs: u64) -> String {
    let time_of_day = secs % 86400;
    let mut days = secs / 86400;

    let mut year = 1970u64;
    while days >= if is_leap(year) { 366 } else { 365 } {
        days -= if is_leap(year) { 366 } else { 365 };
        year += 1;
    }

    let february = if is_leap(year) { 29 } else { 28 };
    let month_lengths = [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

    let mut month = 1;
    for length in month_lengths {
        if days < length {
            break;
        }
        days -= length;
        month += 1;
    }

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        days + 1,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(number: u32, verdict: Verdict) -> TestOutcome {
        TestOutcome {
            number,
            mode: "-x2".into(),
            description: "16-bit stereo".into(),
            verdict,
            encoded_samples: 88200,
            decoded_samples: if verdict == Verdict::Failed { 44100 } else { 88200 },
            encoded_md5: "0".repeat(32),
            decoded_md5: Some("0".repeat(32)),
            decode_errors: 0,
            encoded_bytes: 200_000,
            first_block_size: 1200,
            reduction_percent: 43.31,
            bits_per_sample: 9.07,
            fuzz_hits: 3,
            lossless: true,
            duration_ms: 40,
            message: (verdict == Verdict::SetupFailed).then(|| "can't create file".to_string()),
        }
    }

    #[test]
    fn test_report_totals() {
        let mut report = SuiteReport::new("Round Trips");
        report.add_outcome(outcome(1, Verdict::Passed));
        report.add_outcome(outcome(2, Verdict::Tolerated));
        assert!(report.all_passed());

        report.add_outcome(outcome(3, Verdict::Failed));
        assert_eq!(report.summary.total_cases, 3);
        assert_eq!(report.summary.passed_cases, 1);
        assert_eq!(report.summary.tolerated_cases, 1);
        assert_eq!(report.summary.failed_cases, 1);
        assert_eq!(report.summary.total_fuzz_hits, 9);
        assert!(!report.all_passed());
        assert_eq!(report.first_failure().map(|o| o.number), Some(3));
    }

    #[test]
    fn test_setup_failure_fails_report() {
        let mut report = SuiteReport::new("Round Trips");
        report.add_outcome(outcome(1, Verdict::SetupFailed));
        assert!(!report.all_passed());
        assert!(report.to_junit().contains("<error message=\"can&apos;t create file\"/>"));
    }

    #[test]
    fn test_text_report() {
        let mut report = SuiteReport::new("Round Trips");
        report.seed = Some(42);
        report.add_outcome(outcome(7, Verdict::Passed));

        let text = report.to_text();
        assert!(text.contains("Round Trips"));
        assert!(text.contains("test 0007: 16-bit stereo"));
        assert!(text.contains("pass ("));
        assert!(text.contains("Seed: 0x000000000000002a"));
    }

    #[test]
    fn test_markdown_report() {
        let mut report = SuiteReport::new("Round Trips");
        report.add_outcome(outcome(1, Verdict::Failed));

        let md = report.to_markdown();
        assert!(md.contains("# Round Trips"));
        assert!(md.contains("| Test |"));
        assert!(md.contains("## Failure: test 0001"));
        assert!(md.contains("enc/dec sample count"));
    }

    #[test]
    fn test_json_report_parses() {
        let mut report = SuiteReport::new("Round Trips");
        report.fuzz_period = Some(5000);
        report.add_outcome(outcome(1, Verdict::Passed));

        let back: SuiteReport = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(back.fuzz_period, Some(5000));
        assert_eq!(back.outcomes.len(), 1);
    }

    #[test]
    fn test_save_writes_and_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = SuiteReport::new("Round Trips");
        report.add_outcome(outcome(1, Verdict::Passed));

        let path = dir.path().join("report.json");
        report.save(&path, ReportFormat::Json).unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["summary"]["passed_cases"], 1);

        let missing = dir.path().join("missing").join("report.txt");
        let err = report.save(&missing, ReportFormat::Text).unwrap_err();
        assert!(matches!(err, crate::HarnessError::Io(_)));
        assert!(!err.is_setup_failure());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ReportFormat::from_path(Path::new("r.json")), ReportFormat::Json);
        assert_eq!(ReportFormat::from_path(Path::new("r.md")), ReportFormat::Markdown);
        assert_eq!(ReportFormat::from_path(Path::new("r.xml")), ReportFormat::JUnit);
        assert_eq!(ReportFormat::from_path(Path::new("r")), ReportFormat::Text);
    }

    #[test]
    fn test_format_utc() {
        assert_eq!(format_utc(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_utc(951_782_400), "2000-02-29T00:00:00Z");
        assert_eq!(format_utc(1_700_000_000), "2023-11-14T22:13:20Z");
    }
}
