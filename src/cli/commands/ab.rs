//! `funnelkit ab` command - conversion by variant and significance test

use console::style;
use miette::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::commands::utils::Workspace;
use crate::cli::helpers::{capitalize, format_fraction};
use crate::cli::output::{effective_format, print_delimited, print_structured, render_table};
use crate::cli::viz;
use crate::cli::{FilterArgs, GlobalOpts, MissingFilter, OutputFormat};
use crate::core::ab::{self, AbAnalysis, ConversionRow, SegmentedConversion};
use crate::core::report::{self, SignificanceOutcome};
use crate::core::significance::ChiSquareTest;

/// Columns of the delimited conversion output
pub const CONVERSION_COLUMNS: [&str; 6] = [
    "dimension",
    "variant",
    "segment",
    "conversion_rate",
    "converted",
    "sample_size",
];

#[derive(clap::Args, Debug)]
pub struct AbArgs {
    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Serialize)]
struct AbView<'a> {
    #[serde(flatten)]
    analysis: &'a AbAnalysis,
    significance: &'a SignificanceOutcome,
}

#[derive(Tabled)]
struct VariantLine {
    #[tabled(rename = "Variant")]
    variant: String,
    #[tabled(rename = "Conversion")]
    conversion: String,
    #[tabled(rename = "Confirmed")]
    converted: usize,
    #[tabled(rename = "Reached payment")]
    sample_size: usize,
}

#[derive(Tabled)]
struct SegmentLine {
    #[tabled(rename = "Variant")]
    variant: String,
    #[tabled(rename = "Segment")]
    segment: String,
    #[tabled(rename = "Conversion")]
    conversion: String,
    #[tabled(rename = "Confirmed")]
    converted: usize,
    #[tabled(rename = "Reached payment")]
    sample_size: usize,
}

#[derive(Tabled)]
struct ContingencyLine {
    #[tabled(rename = "Variant")]
    variant: String,
    #[tabled(rename = "Not confirmed")]
    not_confirmed: u64,
    #[tabled(rename = "Confirmed")]
    confirmed: u64,
}

/// Run the A/B command
pub fn run(args: AbArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let filters = args
        .filters
        .to_filter_set(&workspace.merged, MissingFilter::Include);
    let analysis = ab::analyze_ab(&workspace.merged, &filters);
    let significance = report::significance_outcome(&workspace.merged, &filters, &workspace.config);

    match effective_format(global.output, OutputFormat::Table) {
        format @ (OutputFormat::Csv | OutputFormat::Tsv) => {
            print_delimited(&CONVERSION_COLUMNS, &conversion_rows(&analysis), format)
        }
        format @ (OutputFormat::Json | OutputFormat::Yaml) => print_structured(
            &AbView {
                analysis: &analysis,
                significance: &significance,
            },
            format,
        ),
        _ => {
            print_ab(&analysis, &significance);
            Ok(())
        }
    }
}

/// Terminal rendering of the A/B view
pub fn print_ab(analysis: &AbAnalysis, significance: &SignificanceOutcome) {
    println!(
        "{} {}",
        style("A/B Test Analysis").bold(),
        style(format!("({} users after filters)", analysis.users)).dim()
    );
    println!();

    let confirmations: Vec<(String, usize)> = analysis
        .confirmations
        .iter()
        .map(|c| (c.variant.clone(), c.confirmed_users))
        .collect();
    println!(
        "{}",
        viz::render_distribution("Confirmed Users by Variant", &confirmations)
    );
    println!();

    println!("{}", style("Conversion Rate by Variant").bold());
    if analysis.overall.is_empty() {
        println!("  {}", style("No users reached payment in this selection").dim());
    } else {
        let rates: Vec<(String, f64)> = analysis
            .overall
            .iter()
            .map(|r| (r.variant.clone(), r.conversion_rate * 100.0))
            .collect();
        println!("{}", viz::render_rates(&rates));
        println!("{}", render_table(variant_lines(&analysis.overall)));
    }

    for segmented in [&analysis.by_gender, &analysis.by_device] {
        println!();
        print_segmented(segmented);
    }

    println!();
    print_significance(significance);
}

fn print_segmented(segmented: &SegmentedConversion) {
    println!(
        "{}",
        style(format!(
            "Conversion Rate by Variant and {}",
            capitalize(&segmented.dimension.to_string())
        ))
        .bold()
    );
    if segmented.rows.is_empty() {
        println!("  {}", style("No users reached payment in this selection").dim());
        return;
    }
    let lines: Vec<SegmentLine> = segmented
        .rows
        .iter()
        .map(|r| SegmentLine {
            variant: r.variant.clone(),
            segment: r.segment.clone().unwrap_or_default(),
            conversion: format_fraction(r.conversion_rate),
            converted: r.converted,
            sample_size: r.sample_size,
        })
        .collect();
    println!("{}", render_table(lines));
}

fn variant_lines(rows: &[ConversionRow]) -> Vec<VariantLine> {
    rows.iter()
        .map(|r| VariantLine {
            variant: r.variant.clone(),
            conversion: format_fraction(r.conversion_rate),
            converted: r.converted,
            sample_size: r.sample_size,
        })
        .collect()
}

/// Chi-square result, or the reason it is unavailable
pub fn print_significance(significance: &SignificanceOutcome) {
    println!("{}", style("Statistical Significance (chi-square)").bold());
    match significance {
        SignificanceOutcome::Unavailable { message } => {
            println!("  {} {}", style("!").yellow(), style(message).yellow());
        }
        SignificanceOutcome::Computed(test) => print_test(test),
    }
}

fn print_test(test: &ChiSquareTest) {
    let lines: Vec<ContingencyLine> = test
        .observed
        .variants
        .iter()
        .zip(&test.observed.counts)
        .map(|(variant, counts)| ContingencyLine {
            variant: variant.clone(),
            not_confirmed: counts[0],
            confirmed: counts[1],
        })
        .collect();
    println!("{}", render_table(lines));

    println!(
        "  statistic {:.4}, dof {}, p-value {:.6}{}",
        test.statistic,
        test.degrees_of_freedom,
        test.p_value,
        if test.yates_correction {
            " (Yates correction)"
        } else {
            ""
        }
    );
    let marker = if test.verdict.is_significant() {
        style("✓").green()
    } else {
        style("○").dim()
    };
    println!("  {} {}", marker, test.summary());
}

/// One delimited row per conversion group, per-variant rows first
pub fn conversion_rows(analysis: &AbAnalysis) -> Vec<Vec<String>> {
    let row = |dimension: &str, r: &ConversionRow| {
        vec![
            dimension.to_string(),
            r.variant.clone(),
            r.segment.clone().unwrap_or_default(),
            format!("{:.6}", r.conversion_rate),
            r.converted.to_string(),
            r.sample_size.to_string(),
        ]
    };

    let mut rows: Vec<Vec<String>> = analysis.overall.iter().map(|r| row("variant", r)).collect();
    for segmented in [&analysis.by_gender, &analysis.by_device] {
        let dimension = segmented.dimension.to_string();
        rows.extend(segmented.rows.iter().map(|r| row(&dimension, r)));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{Dimension, FunnelStep, UserRecord};

    fn analysis() -> AbAnalysis {
        let records = vec![
            UserRecord::new("1")
                .with_dimension(Dimension::Variant, "A")
                .with_dimension(Dimension::Gender, "Male")
                .with_dimension(Dimension::Device, "Desktop")
                .with_step(FunnelStep::Payment, "payment_page")
                .with_step(FunnelStep::Confirmation, "payment_confirmation_page"),
            UserRecord::new("2")
                .with_dimension(Dimension::Variant, "B")
                .with_dimension(Dimension::Gender, "Female")
                .with_dimension(Dimension::Device, "Mobile")
                .with_step(FunnelStep::Payment, "payment_page"),
        ];
        let rows: Vec<&UserRecord> = records.iter().collect();
        ab::analyze_rows(&rows)
    }

    #[test]
    fn test_conversion_rows() {
        let rows = conversion_rows(&analysis());
        // 2 variants + 2 (variant, gender) + 2 (variant, device)
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0], vec!["variant", "A", "", "1.000000", "1", "1"]);
        assert_eq!(rows[1][3], "0.000000");
        assert_eq!(rows[2][0], "gender");
        assert_eq!(rows[2][2], "Male");
        assert!(rows.iter().all(|r| r.len() == CONVERSION_COLUMNS.len()));
    }

    #[test]
    fn test_variant_lines() {
        let lines = variant_lines(&analysis().overall);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].conversion, "100.00%");
        assert_eq!(lines[1].conversion, "0.00%");
    }
}
