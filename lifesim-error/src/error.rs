//! The main Error type for lifesim

use crate::{ErrorKind, ErrorStatus};
use std::fmt;

/// Error shared by every lifesim crate.
///
/// Carries a kind, a message and a retry status, plus the operation that
/// failed, key/value context added on the way up, and the raw cause.
///
/// # Example
///
/// ```rust
/// use lifesim_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::new(ErrorKind::CollaboratorFailed, "model returned no candidates")
///     .with_operation("simulator::advance_state")
///     .with_context("model", "gemini-1.5-pro-002")
///     .with_context("step", "2");
///
/// assert_eq!(err.kind(), ErrorKind::CollaboratorFailed);
/// assert!(err.kind().is_collaborator());
/// assert_eq!(err.status(), ErrorStatus::Permanent);
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = if kind.is_retryable() {
            ErrorStatus::Temporary
        } else {
            ErrorStatus::Permanent
        };

        Self {
            kind,
            message: message.into(),
            status,
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Outermost operation; the ones it wrapped sit in context under "called"
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// Look up the first context value recorded under `key`
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    // =========================================================================
    // Builders (chainable)
    // =========================================================================

    /// Set the operation that caused this error.
    ///
    /// If an operation was already set, the previous one is moved to context
    /// as "called" to preserve the call chain.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set the source error.
    ///
    /// # Panics (debug only)
    /// Panics in debug mode if source was already set.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }
}

// =============================================================================
// Display - compact, single-line format for logs
// =============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.context.is_empty() {
            write!(f, ", context {{ ")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", key, value)?;
            }
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        Ok(())
    }
}

// =============================================================================
// Debug - verbose, multi-line format for debugging
// =============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.message.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Message: {}", self.message)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Context:")?;
            for (key, value) in &self.context {
                writeln!(f, "        {}: {}", key, value)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "    Source: {:?}", source)?;
        }

        Ok(())
    }
}

// =============================================================================
// std::error::Error implementation
// =============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// =============================================================================
// Convenient From implementations (be careful not to leak raw errors!)
// =============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}

// =============================================================================
// Convenience constructors
// =============================================================================

impl Error {
    /// Create a ConfigInvalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create a ConfigInvalid error for a missing environment variable
    pub fn missing_env(var: &'static str) -> Self {
        Self::new(
            ErrorKind::ConfigInvalid,
            format!("environment variable {} is not set", var),
        )
        .with_context("env", var)
    }

    /// Create an InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Create a CollaboratorFailed error
    pub fn collaborator_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CollaboratorFailed, message)
    }

    /// Create a CollaboratorTimeout error
    pub fn collaborator_timeout(secs: f64) -> Self {
        Self::new(
            ErrorKind::CollaboratorTimeout,
            format!("collaborator call exceeded {:.1}s", secs),
        )
        .with_context("timeout_secs", format!("{:.1}", secs))
    }

    /// Create a ParseFailed error
    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }

    /// Create a SerializationFailed error
    pub fn serialization_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationFailed, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::new(ErrorKind::ParseFailed, "no balanced delimiter found");
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        assert_eq!(err.message(), "no balanced delimiter found");
        assert_eq!(err.status(), ErrorStatus::Permanent);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::new(ErrorKind::CollaboratorFailed, "empty candidates")
            .with_operation("simulator::choose_actions")
            .with_context("model", "gpt-4o")
            .with_context("step", "4");

        assert_eq!(err.operation(), "simulator::choose_actions");
        assert_eq!(err.context().len(), 2);
        assert_eq!(err.context()[0], ("model", "gpt-4o".to_string()));
        assert_eq!(err.context_value("step"), Some("4"));
        assert_eq!(err.context_value("missing"), None);
    }

    #[test]
    fn test_operation_chaining() {
        let err = Error::new(ErrorKind::ParseFailed, "malformed mapping")
            .with_operation("parser::parse_actions")
            .with_operation("simulator::simulate");

        assert_eq!(err.operation(), "simulator::simulate");
        assert_eq!(err.context().len(), 1);
        assert_eq!(err.context()[0], ("called", "parser::parse_actions".to_string()));
    }

    #[test]
    fn test_temporary_status() {
        let err = Error::new(ErrorKind::RateLimited, "quota exhausted");
        assert!(err.is_retryable());

        let err = Error::new(ErrorKind::ParseFailed, "bad output");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_display() {
        let err = Error::new(ErrorKind::CollaboratorFailed, "model unavailable")
            .with_operation("provider::complete")
            .with_context("model", "gemini-1.5-pro-002")
            .with_context("status", "503");

        let display = format!("{}", err);
        assert!(display.contains("CollaboratorFailed"));
        assert!(display.contains("permanent"));
        assert!(display.contains("provider::complete"));
        assert!(display.contains("model: gemini-1.5-pro-002"));
        assert!(display.ends_with("=> model unavailable"));
    }

    #[test]
    fn test_convenience_constructors() {
        let err = Error::missing_env("GEMINI_API_KEY");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert!(err.message().contains("GEMINI_API_KEY"));

        let err = Error::collaborator_timeout(2.5);
        assert_eq!(err.kind(), ErrorKind::CollaboratorTimeout);
        assert!(err.is_retryable());
        assert_eq!(err.context_value("timeout_secs"), Some("2.5"));

        let err = Error::parse_failed("fewer fields than categories");
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
    }

    #[test]
    fn test_io_conversion_sets_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "state.txt missing");
        let err: Error = io_err.into();

        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(err.operation(), "io");
        assert!(err.source_ref().is_some());
    }
}
