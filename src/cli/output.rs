//! Output formatting utilities

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::io;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::OutputFormat;

/// Resolve `auto` to the command's preferred format
pub fn effective_format(format: OutputFormat, preferred: OutputFormat) -> OutputFormat {
    match format {
        OutputFormat::Auto => preferred,
        other => other,
    }
}

/// Print a serializable value as JSON or YAML
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
        }
        _ => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Write rows as CSV or TSV on stdout
pub fn print_delimited(headers: &[&str], rows: &[Vec<String>], format: OutputFormat) -> Result<()> {
    let delimiter = if format == OutputFormat::Tsv { b'\t' } else { b',' };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(io::stdout());
    writer.write_record(headers).into_diagnostic()?;
    for row in rows {
        writer.write_record(row).into_diagnostic()?;
    }
    writer.flush().into_diagnostic()?;
    Ok(())
}

/// Render rows as a rounded terminal table
pub fn render_table<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}
