//! Masked password wrapper.

/// Wrapper for sensitive strings that prevents accidental logging.
///
/// The inner value is never exposed via Debug or Display traits.
/// Use `expose()` to access the actual value when needed for SQL or files.
#[derive(Clone, PartialEq, Eq)]
pub struct SecureString(String);

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Expose the inner value.
    ///
    /// Use sparingly and only when writing it where it belongs.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(••••••••)")
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "••••••••")
    }
}
