//! Error kinds for lifesim operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on ErrorKind to decide how to report a failure. The three
/// families that matter to the simulation are collaborator failures (the
/// remote model could not answer), parse failures (it answered with something
/// we cannot read) and configuration failures (we could not even start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Missing credential, invalid config file, or client construction failure
    ConfigInvalid,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // Collaborator errors (text, image, speech services)
    // =========================================================================
    /// The remote service returned an error or an unusable response
    CollaboratorFailed,

    /// The call did not finish within the caller-supplied timeout
    CollaboratorTimeout,

    /// Rate limit or quota exceeded
    RateLimited,

    /// Credentials were rejected
    AuthenticationFailed,

    /// Connection-level failure
    NetworkFailed,

    // =========================================================================
    // Data errors
    // =========================================================================
    /// Model output could not be interpreted
    ParseFailed,

    /// Serialization/deserialization of our own data failed
    SerializationFailed,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Collaborator
            ErrorKind::CollaboratorFailed => "CollaboratorFailed",
            ErrorKind::CollaboratorTimeout => "CollaboratorTimeout",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",

            // Data
            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::CollaboratorTimeout | ErrorKind::NetworkFailed | ErrorKind::RateLimited
        )
    }

    /// True for every failure that originated in a remote collaborator call
    pub fn is_collaborator(&self) -> bool {
        matches!(
            self,
            ErrorKind::CollaboratorFailed
                | ErrorKind::CollaboratorTimeout
                | ErrorKind::RateLimited
                | ErrorKind::AuthenticationFailed
                | ErrorKind::NetworkFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
