//! Shared helper functions for CLI commands

/// Label shown for a missing dimension value
pub const MISSING_LABEL: &str = "(missing)";

/// Display a dimension value, rendering missing as `(missing)`
pub fn display_value(value: Option<&str>) -> &str {
    value.unwrap_or(MISSING_LABEL)
}

/// Format a 0-100 percentage with two decimals
pub fn format_percent(percent: f64) -> String {
    format!("{:.2}%", percent)
}

/// Format a 0-1 fraction as a percentage
pub fn format_fraction(fraction: f64) -> String {
    format_percent(fraction * 100.0)
}

/// Upper-case the first character
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
