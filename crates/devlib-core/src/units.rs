//! Engineering units and SI prefix handling.

/// Parse the numeric prefix of `s` the way SPICE reads values.
///
/// Returns the scaled value and the number of bytes consumed. A scale
/// suffix (`T G MEG K M MIL U N P F A`, case-insensitive) may follow the
/// number, and any further letters are unit decoration and are consumed
/// without effect (`10uF`, `5V`).
pub fn parse_number_prefix(s: &str) -> Option<(f64, usize)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let mut digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }
    // Exponent only when digits follow.
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > start {
            i = j;
        }
    }
    let value: f64 = s[..i].parse().ok()?;

    let rest = &s[i..];
    let (multiplier, scale_len) = scale_suffix(rest);
    let mut end = i + scale_len;
    while end < bytes.len() && bytes[end].is_ascii_alphabetic() {
        end += 1;
    }
    Some((value * multiplier, end))
}

fn scale_suffix(rest: &str) -> (f64, usize) {
    let lower: String = rest
        .chars()
        .take(3)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if lower.starts_with("meg") {
        return (1e6, 3);
    }
    if lower.starts_with("mil") {
        return (25.4e-6, 3);
    }
    match lower.chars().next() {
        Some('t') => (1e12, 1),
        Some('g') => (1e9, 1),
        Some('k') => (1e3, 1),
        Some('m') => (1e-3, 1),
        Some('u') => (1e-6, 1),
        Some('n') => (1e-9, 1),
        Some('p') => (1e-12, 1),
        Some('f') => (1e-15, 1),
        Some('a') => (1e-18, 1),
        _ => (1.0, 0),
    }
}

/// Parse a complete token as a SPICE value.
///
/// The whole token must be consumed by the number and its suffix.
pub fn parse_value(s: &str) -> Option<f64> {
    let s = s.trim();
    match parse_number_prefix(s) {
        Some((v, n)) if n == s.len() => Some(v),
        _ => None,
    }
}

/// Format a value with appropriate SI prefix.
pub fn format_value(value: f64) -> String {
    let abs_value = value.abs();

    let (scaled, suffix) = if abs_value == 0.0 {
        (0.0, "")
    } else if abs_value >= 1e12 {
        (value / 1e12, "T")
    } else if abs_value >= 1e9 {
        (value / 1e9, "G")
    } else if abs_value >= 1e6 {
        (value / 1e6, "Meg")
    } else if abs_value >= 1e3 {
        (value / 1e3, "k")
    } else if abs_value >= 1.0 {
        (value, "")
    } else if abs_value >= 1e-3 {
        (value * 1e3, "m")
    } else if abs_value >= 1e-6 {
        (value * 1e6, "u")
    } else if abs_value >= 1e-9 {
        (value * 1e9, "n")
    } else if abs_value >= 1e-12 {
        (value * 1e12, "p")
    } else if abs_value >= 1e-15 {
        (value * 1e15, "f")
    } else {
        (value, "")
    };

    format!("{:.4}{}", scaled, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|v| (v - b).abs() < b.abs() * 1e-10 + 1e-20)
    }

    #[test]
    fn test_parse_plain_number() {
        assert_eq!(parse_value("1.5"), Some(1.5));
        assert_eq!(parse_value("-2.5"), Some(-2.5));
        assert_eq!(parse_value("1e-3"), Some(1e-3));
        assert_eq!(parse_value(".5"), Some(0.5));
    }

    #[test]
    fn test_parse_with_suffix() {
        assert!(approx_eq(parse_value("1k"), 1e3));
        assert!(approx_eq(parse_value("4.7K"), 4.7e3));
        assert!(approx_eq(parse_value("10M"), 10e-3));
        assert!(approx_eq(parse_value("10MEG"), 10e6));
        assert!(approx_eq(parse_value("100n"), 100e-9));
        assert!(approx_eq(parse_value("2mil"), 50.8e-6));
    }

    #[test]
    fn test_parse_trailing_units() {
        assert!(approx_eq(parse_value("10uF"), 10e-6));
        assert!(approx_eq(parse_value("5V"), 5.0));
        assert!(approx_eq(parse_value("1e"), 1.0));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_value("abc"), None);
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("1k2"), None);
        assert_eq!(parse_value("v(1)"), None);
    }

    #[test]
    fn test_prefix_stops_at_operator() {
        assert_eq!(parse_number_prefix("2*v(1)"), Some((2.0, 1)));
        let (v, n) = parse_number_prefix("1k+3").unwrap();
        assert_eq!((v, n), (1000.0, 2));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(1000.0), "1.0000k");
        assert_eq!(format_value(0.001), "1.0000m");
        assert_eq!(format_value(1e-9), "1.0000n");
        assert_eq!(format_value(0.0), "0.0000");
    }
}
