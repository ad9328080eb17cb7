//! Secret wrapper for sensitive values such as the OAuth client secret

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value - redacted in Debug/Display/logs, zeroized on drop
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    #[allow(dead_code)]
    struct Credentials {
        client_id: String,
        client_secret: Secret<String>,
    }

    #[test]
    fn secret_redacts_debug_and_display() {
        let secret = Secret::new(String::from("whoop-client-secret"));
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn secret_exposes_value() {
        let secret: Secret<String> = String::from("whoop-client-secret").into();
        assert_eq!(secret.expose(), "whoop-client-secret");
    }

    #[test]
    fn secret_stays_hidden_inside_derived_debug() {
        let creds = Credentials {
            client_id: "client-abc".into(),
            client_secret: Secret::new("s3cr3t".into()),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("client-abc"));
        assert!(!debug.contains("s3cr3t"), "secret leaked: {debug}");
    }
}
