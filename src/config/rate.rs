//! Rate limit directives.
//!
//! `"N/Ts"` means N requests per T seconds, `"Ts"` one request every T
//! seconds. A bare number is read as seconds. `"0s"` disables pacing.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use super::ConfigError;

/// Directive used when the configuration has none.
pub const DEFAULT_RATE_LIMIT: &str = "1/3s";

const FIELD: &str = "fetch.rate_limit";
const EXPECTED: &str = "\"N/Ts\" (N requests per T seconds) or \"Ts\"";

#[allow(clippy::expect_used)]
static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(\d+)\s*/\s*)?(\d+(?:\.\d+)?)\s*s?\s*$").expect("rate regex is valid") // Static pattern, safe to panic
});

/// Converts a rate directive to the minimum interval between requests.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the directive does not parse
/// or names zero requests.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use harvester_core::config::parse_rate_limit;
///
/// assert_eq!(parse_rate_limit("1/3s").unwrap(), Duration::from_secs(3));
/// assert_eq!(parse_rate_limit("2/3s").unwrap(), Duration::from_millis(1500));
/// assert_eq!(parse_rate_limit("5s").unwrap(), Duration::from_secs(5));
/// ```
pub fn parse_rate_limit(directive: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::invalid(FIELD, format!("{directive:?}"), EXPECTED);

    let captures = DIRECTIVE.captures(directive).ok_or_else(invalid)?;
    let requests = match captures.get(1) {
        Some(count) => count.as_str().parse::<u32>().map_err(|_| invalid())?,
        None => 1,
    };
    if requests == 0 {
        return Err(invalid());
    }
    let seconds: f64 = captures
        .get(2)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .parse()
        .map_err(|_| invalid())?;

    Duration::try_from_secs_f64(seconds / f64::from(requests)).map_err(|_| invalid())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_per_period_directive() {
        assert_eq!(parse_rate_limit("1/3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_rate_limit("4/2s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_rate_limit(" 1 / 10s ").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_interval_directive() {
        assert_eq!(parse_rate_limit("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_rate_limit("0.5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_rate_limit("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_disables_pacing() {
        assert_eq!(parse_rate_limit("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_rejects_malformed_directives() {
        for directive in ["", "fast", "1/", "/3s", "3m", "0/3s", "-1s"] {
            assert!(
                parse_rate_limit(directive).is_err(),
                "accepted {directive:?}"
            );
        }
    }

    #[test]
    fn test_error_names_the_setting() {
        let err = parse_rate_limit("soon").unwrap_err();
        assert!(err.to_string().contains("fetch.rate_limit"));
    }
}
