use std::io::Write;
use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::analyzers::duplicate::{DuplicateReport, MemberReport};
use crate::converter::batch::BatchSummary;
use crate::Result;

/// One CSV row per duplicate group member.
#[derive(Debug, Serialize)]
struct DuplicateRow<'a> {
    key: &'a str,
    source: String,
    destination: String,
    suggestion: &'a str,
}

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// Human-readable duplicate report: one block per group, each member
    /// followed by its suggested action.
    pub fn write_duplicate_report(&self, report: &DuplicateReport, out: &mut impl Write) -> Result<()> {
        writeln!(
            out,
            "Scanned {} files ({} skipped), {} duplicate groups",
            report.files_scanned,
            report.files_skipped,
            report.groups.len()
        )?;
        for group in &report.groups {
            writeln!(out)?;
            writeln!(out, "Duplicate group '{}':", group.key)?;
            for member in &group.members {
                match member {
                    MemberReport::Resolved {
                        source,
                        destination,
                        suggestion,
                    } => {
                        writeln!(out, "  {} -> {}", source.display(), destination.display())?;
                        writeln!(out, "    {}", suggestion)?;
                    }
                    MemberReport::Skipped { source, reason } => {
                        writeln!(out, "  {} (skipped: {})", source.display(), reason)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn print_duplicate_report(&self, report: &DuplicateReport) -> Result<()> {
        let stdout = std::io::stdout();
        self.write_duplicate_report(report, &mut stdout.lock())
    }

    pub fn generate_duplicate_csv(&self, report: &DuplicateReport, output_path: impl AsRef<Path>) -> Result<()> {
        let output_path_ref = output_path.as_ref();
        let mut writer = Writer::from_path(output_path_ref)?;

        for group in &report.groups {
            for member in &group.members {
                let row = match member {
                    MemberReport::Resolved {
                        source,
                        destination,
                        suggestion,
                    } => DuplicateRow {
                        key: &group.key,
                        source: source.display().to_string(),
                        destination: destination.display().to_string(),
                        suggestion,
                    },
                    MemberReport::Skipped { source, .. } => DuplicateRow {
                        key: &group.key,
                        source: source.display().to_string(),
                        destination: String::new(),
                        suggestion: "",
                    },
                };
                writer.serialize(row)?;
            }
        }

        writer.flush()?;
        println!("Duplicate report generated: {}", output_path_ref.display());
        Ok(())
    }

    pub fn print_batch_summary(&self, summary: &BatchSummary) {
        println!("\nConversion summary:");
        println!("  Transcoded: {}", summary.transcoded);
        println!("  Copied:     {}", summary.copied);
        println!("  Existing:   {}", summary.existing);
        println!("  Skipped:    {}", summary.skipped);
        println!("  Failed:     {}", summary.failed);
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
