//! Connector error types.
//!
//! Every failure the connector can report maps to one variant of
//! [`ConnectorError`], and every variant maps to a stable error code
//! string.  The controller converts errors into [`ErrorDescriptor`]
//! values at its boundary; nothing past that boundary inspects the
//! original error.

use thiserror::Error;

/// Generate a 16-character hex client request ID for outbound calls.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Connector failure classes expressed as a Rust enum.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// A mandatory request parameter was not supplied.
    #[error("{message}")]
    MissingParameters { message: String },

    /// The named connection cannot be resolved or is not usable as
    /// configured (unknown name, absent capability, bad credentials
    /// section).
    #[error("{message}")]
    InvalidConfiguration { message: String },

    /// Transport-level failure talking to the storage service or the
    /// token endpoint.
    #[error("{message}")]
    Connection { message: String },

    /// Credential or access-token acquisition failed.
    #[error("{message}")]
    Authentication { message: String },

    /// The storage service answered with an error status.
    #[error("Blob storage error: HTTP {status} - {message}")]
    BlobStorage { status: u16, message: String },

    /// Catch-all for unexpected failures.
    #[error(transparent)]
    General(#[from] anyhow::Error),
}

impl ConnectorError {
    /// Return the stable error code string for this failure class.
    pub fn code(&self) -> &'static str {
        match self {
            ConnectorError::MissingParameters { .. } => "MISSING_PARAMETERS",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            ConnectorError::Connection { .. } => "CONNECTION_ERROR",
            ConnectorError::Authentication { .. } => "AUTHENTICATION_ERROR",
            ConnectorError::BlobStorage { .. } => "BLOB_STORAGE_ERROR",
            ConnectorError::General(_) => "GENERAL_ERROR",
        }
    }

    /// Convert into the immutable descriptor attached to the outbound
    /// context.
    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor::new(self.code(), &self.to_string())
    }
}

/// Immutable `(code, message)` pair reported back through the response
/// boundary.  Created once per failing invocation, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescriptor {
    code: String,
    message: String,
}

impl ErrorDescriptor {
    /// Create an error descriptor.
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// The stable error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The human-readable detail message.
    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let cases: Vec<(ConnectorError, &str)> = vec![
            (
                ConnectorError::MissingParameters {
                    message: "m".into(),
                },
                "MISSING_PARAMETERS",
            ),
            (
                ConnectorError::InvalidConfiguration {
                    message: "m".into(),
                },
                "INVALID_CONFIGURATION",
            ),
            (
                ConnectorError::Connection {
                    message: "m".into(),
                },
                "CONNECTION_ERROR",
            ),
            (
                ConnectorError::Authentication {
                    message: "m".into(),
                },
                "AUTHENTICATION_ERROR",
            ),
            (
                ConnectorError::BlobStorage {
                    status: 503,
                    message: "m".into(),
                },
                "BLOB_STORAGE_ERROR",
            ),
            (
                ConnectorError::General(anyhow::anyhow!("m")),
                "GENERAL_ERROR",
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_descriptor_carries_code_and_detail() {
        let err = ConnectorError::BlobStorage {
            status: 500,
            message: "server busy".into(),
        };
        let descriptor = err.descriptor();
        assert_eq!(descriptor.code(), "BLOB_STORAGE_ERROR");
        assert!(descriptor.detail().contains("server busy"));
        assert_eq!(descriptor, err.descriptor());
    }

    #[test]
    fn test_request_id_shape() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
