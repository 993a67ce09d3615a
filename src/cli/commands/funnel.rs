//! `funnelkit funnel` command - step reach, conversion cards, sliced funnels

use console::style;
use miette::Result;

use crate::cli::commands::utils::Workspace;
use crate::cli::helpers::{capitalize, display_value, format_percent};
use crate::cli::output::{effective_format, print_delimited, print_structured};
use crate::cli::viz;
use crate::cli::{FilterArgs, GlobalOpts, MissingFilter, OutputFormat};
use crate::core::funnel::{self, FunnelAnalysis, FunnelCounts, SlicedFunnel};

/// Columns of the delimited funnel output
pub const FUNNEL_COLUMNS: [&str; 8] = [
    "dimension",
    "segment",
    "step",
    "users",
    "percent_of_initial",
    "conversion_rate",
    "drop_off_rate",
    "title",
];

#[derive(clap::Args, Debug)]
pub struct FunnelArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Only show the overall funnel and conversion cards
    #[arg(long)]
    pub no_slices: bool,
}

/// Run the funnel command
pub fn run(args: FunnelArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let filters = args
        .filters
        .to_filter_set(&workspace.merged, MissingFilter::Exclude);
    let analysis = funnel::analyze_funnel(&workspace.merged, &filters, &workspace.config.markers);

    match effective_format(global.output, OutputFormat::Table) {
        OutputFormat::Csv => print_delimited(&FUNNEL_COLUMNS, &funnel_rows(&analysis), OutputFormat::Csv),
        OutputFormat::Tsv => print_delimited(&FUNNEL_COLUMNS, &funnel_rows(&analysis), OutputFormat::Tsv),
        format @ (OutputFormat::Json | OutputFormat::Yaml) => print_structured(&analysis, format),
        _ => {
            print_funnel(&analysis, !args.no_slices);
            Ok(())
        }
    }
}

/// Terminal rendering of the funnel view
pub fn print_funnel(analysis: &FunnelAnalysis, slices: bool) {
    println!(
        "{} {}",
        style("User Funnel Analysis").bold(),
        style(format!("({} users after filters)", analysis.users)).dim()
    );
    println!();
    println!("{}", viz::render_funnel(&analysis.title, &analysis.overall));
    println!();

    let m = &analysis.metrics;
    println!("{}", style("Conversion").bold());
    println!(
        "  {:<24} {:>8}  {}",
        "Home → Confirmation",
        style(format_percent(m.home_to_confirmation)).cyan(),
        style(format!("({} of {} users)", m.confirmation_users, m.home_users)).dim()
    );
    println!(
        "  {:<24} {:>8}  {}",
        "Home → Payment",
        style(format_percent(m.home_to_payment)).cyan(),
        style(format!("({} of {} users)", m.payment_users, m.home_users)).dim()
    );
    println!(
        "  {:<24} {:>8}  {}",
        "Payment → Confirmation",
        style(format_percent(m.payment_to_confirmation)).cyan(),
        style(format!("({} of {} users)", m.confirmation_users, m.payment_users)).dim()
    );

    if slices {
        for sliced in [&analysis.by_gender, &analysis.by_device] {
            println!();
            println!("{}", viz::render_sliced_funnel(&sliced_title(sliced), sliced));
        }
    }
}

fn sliced_title(sliced: &SlicedFunnel) -> String {
    format!("Funnel by {}", capitalize(&sliced.dimension.to_string()))
}

/// One delimited row per (slice, step); the overall funnel comes first
pub fn funnel_rows(analysis: &FunnelAnalysis) -> Vec<Vec<String>> {
    let mut rows = counts_rows("overall", "", &analysis.title, &analysis.overall);
    for sliced in [&analysis.by_gender, &analysis.by_device] {
        let title = sliced_title(sliced);
        for slice in &sliced.slices {
            rows.extend(counts_rows(
                &sliced.dimension.to_string(),
                display_value(slice.value.as_deref()),
                &title,
                &slice.counts,
            ));
        }
    }
    rows
}

fn counts_rows(dimension: &str, segment: &str, title: &str, counts: &FunnelCounts) -> Vec<Vec<String>> {
    counts
        .steps
        .iter()
        .map(|s| {
            vec![
                dimension.to_string(),
                segment.to_string(),
                s.step.to_string(),
                s.users.to_string(),
                format!("{:.4}", s.percent_of_initial),
                format!("{:.4}", s.conversion_rate),
                format!("{:.4}", s.drop_off_rate),
                title.to_string(),
            ]
        })
        .collect()
}
