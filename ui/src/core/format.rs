//! Formatting helpers for presenting report figures.

pub fn format_percent(value: f64) -> String {
    if value.is_finite() {
        format!("{:.1}%", value * 100.0)
    } else {
        "—".to_string()
    }
}

pub fn format_number(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{value:.decimals$}")
    } else {
        "—".to_string()
    }
}

pub fn format_skewness(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:+.3}"),
        _ => "N/A".to_string(),
    }
}

pub fn format_count(count: f64) -> String {
    if count.is_finite() && count.fract() == 0.0 {
        format!("{}", count as i64)
    } else {
        format_number(count, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_values_render_as_placeholders() {
        assert_eq!(format_percent(f64::NAN), "—");
        assert_eq!(format_skewness(Some(f64::INFINITY)), "N/A");
        assert_eq!(format_skewness(None), "N/A");
    }

    #[test]
    fn figures_round_as_displayed() {
        assert_eq!(format_percent(0.256), "25.6%");
        assert_eq!(format_skewness(Some(1.2)), "+1.200");
        assert_eq!(format_count(42.0), "42");
        assert_eq!(format_count(1.5), "1.50");
    }
}
