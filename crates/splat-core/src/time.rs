//! TTL arithmetic on [`jiff::Timestamp`].

use std::num::ParseIntError;
use std::time::Duration;

use jiff::Timestamp;

/// Returns `now + ttl`, saturating at [`Timestamp::MAX`].
#[must_use]
pub fn expires_after(now: Timestamp, ttl: Duration) -> Timestamp {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    from_unix_millis(now.as_millisecond().saturating_add(ttl_ms))
}

/// Converts unix milliseconds into a timestamp, clamping out-of-range values.
#[must_use]
pub fn from_unix_millis(millis: i64) -> Timestamp {
    Timestamp::from_millisecond(millis).unwrap_or(if millis < 0 {
        Timestamp::MIN
    } else {
        Timestamp::MAX
    })
}

/// Returns `true` once `expires_at` lies strictly in the past of `now`.
#[must_use]
pub fn is_expired(expires_at: Timestamp, now: Timestamp) -> bool {
    now > expires_at
}

/// Parses a whole number of seconds, as accepted on the command line.
pub fn parse_secs(value: &str) -> Result<Duration, ParseIntError> {
    value.trim().parse().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_after_adds_ttl() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let expires = expires_after(now, Duration::from_secs(60));
        assert_eq!(expires.as_second(), 1_700_000_060);
    }

    #[test]
    fn test_expires_after_saturates() {
        let now = Timestamp::now();
        let expires = expires_after(now, Duration::MAX);
        assert_eq!(expires, Timestamp::MAX);
    }

    #[test]
    fn test_is_expired_is_strict() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        assert!(!is_expired(now, now));
        assert!(is_expired(now, from_unix_millis(now.as_millisecond() + 1)));
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_secs(" 90 ").unwrap(), Duration::from_secs(90));
        assert!(parse_secs("-1").is_err());
        assert!(parse_secs("soon").is_err());
    }
}
