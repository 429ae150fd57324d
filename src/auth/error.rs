//! Error taxonomy for authentication operations.
//!
//! `Display` is the client-facing message. Validation errors and
//! business-rule rejections are expected outcomes; only [`AuthError::Fault`]
//! is a server fault, and its source never reaches the response body.

use thiserror::Error;

/// Outcome classification for auth operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required field was absent, blank, or not a string.
    #[error("all fields are required")]
    MissingFields,

    /// The request carried bytes that did not decode to a JSON object.
    #[error("malformed request body")]
    MalformedBody,

    /// Registration attempted with an email that already has an account.
    #[error("user already exists")]
    EmailTaken,

    /// Login attempted for an email with no account.
    #[error("user does not exist")]
    UnknownUser,

    /// Password did not match the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Admin credential pair did not match the configured identity.
    #[error("invalid admin credentials")]
    InvalidAdminCredentials,

    /// Store, hashing, or signing failure. The source stays server-side.
    #[error("{context}")]
    Fault {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl AuthError {
    /// Wrap an infrastructure failure with the operation's generic message.
    pub fn fault(context: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Fault {
            context,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_client_message() {
        assert_eq!(AuthError::MissingFields.to_string(), "all fields are required");
        assert_eq!(AuthError::EmailTaken.to_string(), "user already exists");
        assert_eq!(AuthError::UnknownUser.to_string(), "user does not exist");
        assert_eq!(AuthError::InvalidCredentials.to_string(), "invalid credentials");
        assert_eq!(
            AuthError::InvalidAdminCredentials.to_string(),
            "invalid admin credentials"
        );
    }

    #[test]
    fn fault_displays_context_without_source_detail() {
        let err = AuthError::fault(
            "error during registration",
            anyhow::anyhow!("disk I/O error: /var/db locked"),
        );
        assert_eq!(err.to_string(), "error during registration");
    }
}
