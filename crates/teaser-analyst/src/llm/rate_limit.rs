//! Wait hints for HTTP 429 responses.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

fn retry_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:try again in|retry after)\s+(?:([0-9]+)m)?([0-9]+(?:\.[0-9]+)?)\s*(ms|s)\b",
        )
        .ok()
    })
    .as_ref()
}

/// Extracts the wait from messages like `"Please try again in 2.5s"`,
/// `"try again in 1m12.5s"` or `"retry after 750ms"`.
pub fn parse_retry_after(message: &str) -> Option<Duration> {
    let caps = retry_regex()?.captures(message)?;
    let minutes: f64 = match caps.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0.0,
    };
    let value: f64 = caps.get(2)?.as_str().parse().ok()?;
    let secs = match caps.get(3)?.as_str().to_ascii_lowercase().as_str() {
        "ms" => value / 1000.0,
        _ => value,
    };
    Duration::try_from_secs_f64(minutes * 60.0 + secs).ok()
}

/// Reads a `Retry-After` header given in whole or fractional seconds.
pub fn parse_retry_after_header(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// The wait to honour for a rate-limited response.
pub fn retry_wait(body: &str, header: Option<&str>, fallback: Duration) -> Duration {
    parse_retry_after(body)
        .or_else(|| header.and_then(parse_retry_after_header))
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: Duration = Duration::from_secs(15);

    #[test]
    fn test_parses_fractional_seconds() {
        let msg = "Rate limit reached for gpt-4-turbo. Please try again in 2.5s. Visit ...";
        assert_eq!(parse_retry_after(msg), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_parses_milliseconds() {
        assert_eq!(
            parse_retry_after("Please try again in 750ms."),
            Some(Duration::from_millis(750))
        );
    }

    #[test]
    fn test_parses_retry_after_phrase() {
        assert_eq!(
            parse_retry_after("Retry after 12s"),
            Some(Duration::from_secs(12))
        );
    }

    #[test]
    fn test_parses_minutes_and_seconds() {
        assert_eq!(
            parse_retry_after("Rate limit reached. Please try again in 6m0s."),
            Some(Duration::from_secs(360))
        );
        assert_eq!(
            parse_retry_after("Please try again in 1m12.5s"),
            Some(Duration::from_millis(72_500))
        );
        assert_eq!(
            retry_wait("try again in 2m30s", Some("5"), FALLBACK),
            Duration::from_secs(150)
        );
    }

    #[test]
    fn test_no_hint_uses_fallback() {
        assert_eq!(parse_retry_after("Too many requests"), None);
        assert_eq!(retry_wait("Too many requests", None, FALLBACK), FALLBACK);
    }

    #[test]
    fn test_body_hint_wins_over_header() {
        assert_eq!(
            retry_wait("try again in 1s", Some("30"), FALLBACK),
            Duration::from_secs(1)
        );
        assert_eq!(
            retry_wait("slow down", Some("30"), FALLBACK),
            Duration::from_secs(30)
        );
        assert_eq!(retry_wait("slow down", Some("soon"), FALLBACK), FALLBACK);
    }
}
