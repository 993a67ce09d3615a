//! Terminal charts for funnel and A/B results
//!
//! Everything renders to plain strings so the commands decide on styling.

use crate::cli::helpers::{display_value, format_percent, truncate_str};
use crate::core::funnel::{FunnelCounts, SlicedFunnel};
use crate::core::record::FunnelStep;

/// Width of the longest bar
pub const BAR_WIDTH: usize = 40;

/// Widest label before truncation
pub const LABEL_WIDTH: usize = 14;

const FULL: char = '█';

/// Bar of `value` scaled against `max`
///
/// Non-zero values always get at least one cell.
pub fn bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let cells = ((value / max) * width as f64).round() as usize;
    FULL.to_string().repeat(cells.clamp(1, width))
}

fn label(text: &str) -> String {
    format!("{:<width$}", truncate_str(text, LABEL_WIDTH), width = LABEL_WIDTH)
}

/// Horizontal funnel: one bar per step with count and share of the first step
///
/// ```text
/// Overall Funnel
///   Homepage       ████████████████████████████████████████  90400  100.00%
///   Search         ████████████████████                      45200   50.00%
/// ```
pub fn render_funnel(title: &str, counts: &FunnelCounts) -> String {
    let mut lines = vec![title.to_string()];
    let max = counts.steps.iter().map(|s| s.users).max().unwrap_or(0);
    let digits = max.to_string().len();

    for step in &counts.steps {
        lines.push(format!(
            "  {} {:<w$}  {:>digits$}  {:>7}",
            label(step.step.name()),
            bar(step.users as f64, max as f64, BAR_WIDTH),
            step.users,
            format_percent(step.percent_of_initial),
            w = BAR_WIDTH,
            digits = digits,
        ));
    }
    lines.join("\n")
}

/// Grouped funnel: every step lists one bar per slice
///
/// All bars share one scale so slices compare directly.
pub fn render_sliced_funnel(title: &str, sliced: &SlicedFunnel) -> String {
    let mut lines = vec![title.to_string()];
    if sliced.slices.is_empty() {
        lines.push("  (no users)".to_string());
        return lines.join("\n");
    }

    let max = sliced
        .slices
        .iter()
        .flat_map(|s| s.counts.steps.iter().map(|c| c.users))
        .max()
        .unwrap_or(0);
    let digits = max.to_string().len();

    for step in FunnelStep::ALL {
        lines.push(format!("  {}", step));
        for slice in &sliced.slices {
            let users = slice.counts.users(step);
            lines.push(format!(
                "    {} {:<w$}  {:>digits$}",
                label(display_value(slice.value.as_deref())),
                bar(users as f64, max as f64, BAR_WIDTH),
                users,
                w = BAR_WIDTH,
                digits = digits,
            ));
        }
    }
    lines.join("\n")
}

/// Share of a total per category, largest bar for the largest share
pub fn render_distribution(title: &str, items: &[(String, usize)]) -> String {
    let mut lines = vec![title.to_string()];
    let total: usize = items.iter().map(|(_, n)| n).sum();
    if total == 0 {
        lines.push("  (none)".to_string());
        return lines.join("\n");
    }
    let max = items.iter().map(|(_, n)| *n).max().unwrap_or(0);

    for (name, count) in items {
        let share = *count as f64 / total as f64 * 100.0;
        lines.push(format!(
            "  {} {:<w$}  {} ({})",
            label(name),
            bar(*count as f64, max as f64, BAR_WIDTH),
            count,
            format_percent(share),
            w = BAR_WIDTH,
        ));
    }
    lines.join("\n")
}

/// Rate bars scaled against 100%; `rates` are 0-100
pub fn render_rates(rates: &[(String, f64)]) -> String {
    let mut lines = Vec::new();
    for (name, rate) in rates {
        lines.push(format!(
            "  {} {:<w$}  {:>7}",
            label(name),
            bar(*rate, 100.0, BAR_WIDTH),
            format_percent(*rate),
            w = BAR_WIDTH,
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::funnel::FunnelSlice;
    use crate::core::record::Dimension;

    fn cells(line: &str) -> usize {
        line.chars().filter(|c| *c == FULL).count()
    }

    #[test]
    fn test_bar_scaling() {
        assert_eq!(bar(10.0, 10.0, 40).chars().count(), 40);
        assert_eq!(bar(5.0, 10.0, 40).chars().count(), 20);
        assert_eq!(bar(0.01, 10.0, 40).chars().count(), 1);
        assert_eq!(bar(0.0, 10.0, 40), "");
        assert_eq!(bar(3.0, 0.0, 40), "");
    }

    #[test]
    fn test_render_funnel() {
        let counts = FunnelCounts::from_counts([4, 2, 2, 1]);
        let out = render_funnel("Overall Funnel", &counts);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "Overall Funnel");
        assert_eq!(lines.len(), 5);
        assert!(lines[1].contains("Homepage"));
        assert!(lines[1].contains("100.00%"));
        assert_eq!(cells(lines[1]), BAR_WIDTH);
        assert_eq!(cells(lines[2]), BAR_WIDTH / 2);
        assert!(lines[4].contains("25.00%"));
    }

    #[test]
    fn test_render_funnel_all_zero() {
        let counts = FunnelCounts::from_counts([0, 0, 0, 0]);
        let out = render_funnel("Overall Funnel", &counts);
        assert!(out.lines().skip(1).all(|l| cells(l) == 0));
    }

    #[test]
    fn test_render_sliced_funnel_shows_missing() {
        let sliced = SlicedFunnel {
            dimension: Dimension::Gender,
            slices: vec![
                FunnelSlice {
                    value: Some("Male".to_string()),
                    counts: FunnelCounts::from_counts([2, 1, 1, 0]),
                },
                FunnelSlice {
                    value: None,
                    counts: FunnelCounts::from_counts([1, 0, 0, 0]),
                },
            ],
        };
        let out = render_sliced_funnel("Funnel by Gender", &sliced);
        assert!(out.contains("(missing)"));
        // Title + 4 steps × (header + 2 slices)
        assert_eq!(out.lines().count(), 1 + 4 * 3);
    }

    #[test]
    fn test_render_distribution() {
        let out = render_distribution(
            "Confirmations by Variant",
            &[("A".to_string(), 3), ("B".to_string(), 1)],
        );
        assert!(out.contains("75.00%"));
        assert!(out.contains("25.00%"));

        let empty = render_distribution("Confirmations by Variant", &[]);
        assert!(empty.contains("(none)"));
    }

    #[test]
    fn test_render_rates() {
        let out = render_rates(&[("A".to_string(), 50.0)]);
        let line = out.lines().next().unwrap();
        assert_eq!(cells(line), BAR_WIDTH / 2);
        assert!(line.contains("50.00%"));
    }
}
