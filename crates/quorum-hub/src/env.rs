//! Environment variable lookup shared by the binaries and `HubConfig`.

use std::str::FromStr;

use crate::error::{Error, Result};

/// Non-blank value of `key`.
pub fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `key` if set. A value that does not parse is a config error, never
/// a silent fallback to the default.
pub fn parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key).map(|raw| parse_value(key, &raw)).transpose()
}

pub(crate) fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid {}={:?}: {}", key, raw, e)))
}

/// Value of `key`, or a config error naming it.
pub fn require(key: &str) -> Result<String> {
    var(key).ok_or_else(|| Error::Config(format!("{} is required", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_and_blank_are_absent() {
        assert_eq!(parse::<u64>("QUORUM_ENV_TEST_UNSET").unwrap(), None);
        std::env::set_var("QUORUM_ENV_TEST_BLANK", "  ");
        assert_eq!(var("QUORUM_ENV_TEST_BLANK"), None);
    }

    #[test]
    fn malformed_value_is_config_error() {
        std::env::set_var("QUORUM_ENV_TEST_BAD", "ten");
        assert!(matches!(
            parse::<u64>("QUORUM_ENV_TEST_BAD"),
            Err(Error::Config(msg)) if msg.contains("QUORUM_ENV_TEST_BAD")
        ));
    }

    #[test]
    fn values_are_trimmed() {
        std::env::set_var("QUORUM_ENV_TEST_PADDED", " 42 ");
        assert_eq!(parse::<u16>("QUORUM_ENV_TEST_PADDED").unwrap(), Some(42));
    }

    #[test]
    fn require_names_missing_key() {
        assert!(matches!(
            require("QUORUM_ENV_TEST_MISSING"),
            Err(Error::Config(msg)) if msg.contains("QUORUM_ENV_TEST_MISSING")
        ));
    }
}
