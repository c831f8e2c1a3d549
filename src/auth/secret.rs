//! Wrapper that keeps credentials out of logs.

use serde::Deserialize;
use std::fmt;

/// Value that redacts itself in `Debug` and `Display`.
///
/// Tokens, secret ids and storage keys are held in a `Secret` from the moment
/// the configuration is parsed, so a stray `{:?}` on a config struct or a
/// credential cannot leak them.
///
/// ```
/// use snapshot_agent::auth::Secret;
///
/// let token = Secret::new("s.abcdef".to_string());
/// assert_eq!(format!("{:?}", token), "***REDACTED***");
/// assert_eq!(token.expose(), "s.abcdef");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    /// Wrap a sensitive value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the underlying value. Only call this at the point of use.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// True when the wrapped string is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***REDACTED***")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***REDACTED***")
    }
}
