//! JSON report: chart-ready structures and export rows per result

use super::{AnalysisReport, Summary};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct JsonReport<'a> {
    generator: &'static str,
    version: &'static str,
    summary: Summary,
    reports: &'a [AnalysisReport],
}

pub fn write<W: Write>(writer: &mut W, reports: &[AnalysisReport]) -> io::Result<()> {
    let doc = JsonReport {
        generator: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        summary: Summary::from_reports(reports),
        reports,
    };
    serde_json::to_writer_pretty(&mut *writer, &doc).map_err(io::Error::other)?;
    writeln!(writer)
}

/// A single report as a JSON string
pub fn to_string(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string(report)
}
