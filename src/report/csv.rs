//! CSV export: one `path,value` line per row, no header

use super::{AnalysisReport, ExportRow};
use std::io::{self, Write};

pub fn write<W: Write>(writer: &mut W, reports: &[AnalysisReport]) -> io::Result<()> {
    for report in reports {
        write_rows(writer, &report.rows)?;
    }
    Ok(())
}

pub fn write_rows<W: Write>(writer: &mut W, rows: &[ExportRow]) -> io::Result<()> {
    for row in rows {
        writeln!(writer, "{},{}", escape(&row.path), row.value)?;
    }
    Ok(())
}

/// Rows as one string, as handed to the browser download
pub fn to_string(rows: &[ExportRow]) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail
    let _ = write_rows(&mut out, rows);
    String::from_utf8_lossy(&out).into_owned()
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
