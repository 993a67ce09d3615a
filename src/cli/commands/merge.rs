//! `funnelkit merge` command - join the source tables into one row per user

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

use crate::cli::commands::utils::Workspace;
use crate::cli::output::{effective_format, print_structured};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::report::SourceSummary;

#[derive(clap::Args, Debug)]
pub struct MergeArgs {
    /// File to write the merged table to
    #[arg(long, default_value = "merged.csv")]
    pub out: PathBuf,

    /// Do not write the merged table to a file
    #[arg(long, conflicts_with = "out")]
    pub no_export: bool,
}

#[derive(Debug, Serialize)]
struct MergeSummary<'a> {
    sources: SourceSummary,
    columns: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    exported_to: Option<&'a PathBuf>,
}

/// Run the merge command
pub fn run(args: MergeArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let merged = &workspace.merged;
    let format = effective_format(global.output, OutputFormat::Table);

    // Delimited output streams the table itself instead of a file
    if matches!(format, OutputFormat::Csv | OutputFormat::Tsv) {
        let delimiter = if format == OutputFormat::Tsv { b'\t' } else { b',' };
        merged
            .write_delimited(io::stdout(), delimiter)
            .into_diagnostic()?;
        return Ok(());
    }

    let exported_to = if args.no_export {
        None
    } else {
        merged.export(&args.out).into_diagnostic()?;
        Some(&args.out)
    };

    let summary = MergeSummary {
        sources: SourceSummary::new(&workspace.sources, merged),
        columns: merged.headers(),
        exported_to,
    };

    match format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&summary, format)?,
        _ => {
            println!(
                "{} Merged {} users from {} tables",
                style("✓").green(),
                style(merged.len()).cyan(),
                workspace.sources.in_join_order().count()
            );
            for table in workspace.sources.in_join_order() {
                println!(
                    "   {:<14} {:>8} rows",
                    table.name(),
                    style(table.len()).yellow()
                );
            }
            println!("   {}: {}", style("Columns").bold(), merged.headers().join(", "));
            if let Some(path) = exported_to {
                println!(
                    "{} Exported merged table to {}",
                    style("✓").green(),
                    style(path.display()).cyan()
                );
            }
        }
    }

    Ok(())
}
