//! `funnelkit report` command - full analysis report
//!
//! The funnel and A/B views take separate filter selections, each with the
//! defaults of its own command.

use console::style;
use miette::Result;

use crate::cli::commands::utils::Workspace;
use crate::cli::commands::{ab, funnel};
use crate::cli::output::{effective_format, print_structured};
use crate::cli::{FilterArgs, GlobalOpts, MissingFilter, OutputFormat};
use crate::core::report::{build_report, AnalysisReport};

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Gender values for the funnel view
    #[arg(long, value_delimiter = ',')]
    pub funnel_sex: Option<Vec<String>>,

    /// Device values for the funnel view
    #[arg(long, value_delimiter = ',')]
    pub funnel_device: Option<Vec<String>>,

    /// Missing gender/device in the funnel view (default: exclude)
    #[arg(long)]
    pub funnel_missing: Option<MissingFilter>,

    /// Gender values for the A/B view
    #[arg(long, value_delimiter = ',')]
    pub ab_sex: Option<Vec<String>>,

    /// Device values for the A/B view
    #[arg(long, value_delimiter = ',')]
    pub ab_device: Option<Vec<String>>,

    /// Missing gender/device in the A/B view (default: include)
    #[arg(long)]
    pub ab_missing: Option<MissingFilter>,
}

impl ReportArgs {
    pub fn funnel_filters(&self) -> FilterArgs {
        FilterArgs {
            sex: self.funnel_sex.clone(),
            device: self.funnel_device.clone(),
            missing: self.funnel_missing,
        }
    }

    pub fn ab_filters(&self) -> FilterArgs {
        FilterArgs {
            sex: self.ab_sex.clone(),
            device: self.ab_device.clone(),
            missing: self.ab_missing,
        }
    }
}

/// Run the report command
pub fn run(args: ReportArgs, global: &GlobalOpts) -> Result<()> {
    let format = effective_format(global.output, OutputFormat::Json);
    if matches!(format, OutputFormat::Csv | OutputFormat::Tsv) {
        return Err(miette::miette!(
            "The report is nested; use -o json, yaml or table (or `funnel`/`ab` for {} output)",
            format
        ));
    }

    let workspace = Workspace::load(global)?;
    let funnel_filters = args
        .funnel_filters()
        .to_filter_set(&workspace.merged, MissingFilter::Exclude);
    let ab_filters = args
        .ab_filters()
        .to_filter_set(&workspace.merged, MissingFilter::Include);

    let report = build_report(
        &workspace.sources,
        &workspace.merged,
        funnel_filters,
        ab_filters,
        &workspace.config,
    );

    match format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&report, format),
        _ => {
            print_report(&report);
            Ok(())
        }
    }
}

fn print_report(report: &AnalysisReport) {
    println!(
        "{} {}",
        style("Funnel Report").bold().underlined(),
        style(report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")).dim()
    );
    println!(
        "{}",
        style(format!(
            "{} users merged from {} user rows",
            report.sources.merged, report.sources.users
        ))
        .dim()
    );
    println!("{}", style("─".repeat(60)).dim());
    funnel::print_funnel(&report.funnel, true);
    println!("{}", style("─".repeat(60)).dim());
    ab::print_ab(&report.ab, &report.significance);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_are_split_per_view() {
        let args = ReportArgs {
            funnel_sex: Some(vec!["Male".to_string()]),
            funnel_device: None,
            funnel_missing: None,
            ab_sex: None,
            ab_device: Some(vec!["Mobile".to_string()]),
            ab_missing: Some(MissingFilter::Exclude),
        };

        let funnel = args.funnel_filters();
        assert_eq!(funnel.sex, Some(vec!["Male".to_string()]));
        assert!(funnel.device.is_none());

        let ab = args.ab_filters();
        assert!(ab.sex.is_none());
        assert_eq!(ab.missing, Some(MissingFilter::Exclude));
    }
}
