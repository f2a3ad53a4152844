use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `[canary]`, `[canary: 25]`, `[Canary:12.5%]`
    static ref CANARY_MARKER: Regex =
        Regex::new(r"(?i)\[canary(?:\s*:\s*(\d+(?:\.\d+)?)\s*%?)?\]").unwrap();
}

/// Scan release notes for the canary marker.
///
/// No marker means no canary was declared (`None`), which is distinct from a
/// declared `0`. A bare `[canary]` declares `0`. Values are clamped to 100.
pub fn declared_canary_percent(notes: &str) -> Option<f64> {
    let caps = CANARY_MARKER.captures(notes)?;
    let percent = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    Some(percent.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_marker_is_none() {
        assert_eq!(declared_canary_percent("Fixed the widget layout."), None);
        assert_eq!(declared_canary_percent(""), None);
    }

    #[test]
    fn reads_integer_and_decimal_percent() {
        assert_eq!(declared_canary_percent("notes\n[canary: 25]\n"), Some(25.0));
        assert_eq!(declared_canary_percent("[CANARY:12.5%] rollout"), Some(12.5));
    }

    #[test]
    fn bare_marker_declares_zero() {
        assert_eq!(declared_canary_percent("[canary]"), Some(0.0));
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(declared_canary_percent("[canary: 250]"), Some(100.0));
    }

    #[test]
    fn first_marker_wins() {
        assert_eq!(declared_canary_percent("[canary: 10] [canary: 90]"), Some(10.0));
    }
}
