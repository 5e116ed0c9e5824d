//! Error types for OCSP revocation checking.
//!
//! Every failure in the crate is reported as a [`CheckError`]. The variants
//! follow the stages of a check: decoding the AIA extension, the
//! preconditions of each scenario, the network exchanges, and validation of
//! the OCSP response itself.

use std::io;

use thiserror::Error;

/// Error type for revocation check failures.
///
/// Errors are returned up to the scenario boundary. Nothing in the crate
/// retries, so the first error encountered ends that scenario.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The AIA extension is not well-formed DER of the expected shape
    #[error("malformed AIA extension: {reason}")]
    Asn1Structure {
        /// What was wrong with the encoding
        reason: String,
    },

    /// The CA-Issuers location is present but is not a URI
    #[error("unknown type for AIA issuer location: tag {tag} ({class})")]
    UnknownLocationType {
        /// ASN.1 tag number of the location
        tag: u32,
        /// ASN.1 class of the location
        class: String,
    },

    /// The handshake finished without verification state for the peer
    #[error("no TLS connection state")]
    NoConnectionState,

    /// The handshake did not produce a chain holding the server and its issuer
    #[error("verified chain has {length} certificate(s), need the server certificate and its issuer")]
    NoVerifiedChain {
        /// Number of certificates in the verified chain
        length: usize,
    },

    /// Neither a configured responder nor an OCSP server in the certificate
    #[error("no OCSP responder configured and certificate '{subject}' lists no OCSP server")]
    NoResponderUrl {
        /// Subject common name of the certificate being checked
        subject: String,
    },

    /// The certificate does not say where its issuer can be fetched
    #[error("no issuer location available: certificate '{subject}' has no AIA CA-Issuers URL")]
    NoIssuerLocation {
        /// Subject common name of the certificate being checked
        subject: String,
    },

    /// Neither a URL nor a certificate file was supplied
    #[error("must provide a url or a certificate file")]
    NoScenarioInput,

    /// DNS resolution failed for the given hostname
    #[error("failed to resolve hostname: {hostname}")]
    DnsResolution {
        /// The hostname that failed to resolve
        hostname: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TCP connection failed to the target address
    #[error("connection failed to: {address}")]
    ConnectionFailed {
        /// The address (host:port) that connection failed to
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// TLS handshake failed
    #[error("TLS handshake failed: {details}")]
    HandshakeFailed {
        /// Details about why the handshake failed
        details: String,
    },

    /// An HTTP exchange with a responder or issuer host failed
    #[error("{operation} failed: {reason}")]
    Transport {
        /// Which exchange failed
        operation: String,
        /// Description of the failure
        reason: String,
    },

    /// The OCSP response could not be parsed or did not validate
    #[error("error parsing response: {reason}")]
    ProtocolValidation {
        /// Description of the failure
        reason: String,
    },

    /// A certificate could not be decoded
    #[error("certificate error: {reason}")]
    CertificateError {
        /// Description of what went wrong
        reason: String,
    },

    /// Invalid input provided to the API
    #[error("invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Which field/parameter was invalid
        field: String,
        /// Why it was invalid
        reason: String,
    },

    /// OpenSSL error occurred
    #[error("OpenSSL error: {details}")]
    OpenSSLError {
        /// The underlying OpenSSL error
        details: String,
    },

    /// Generic I/O error
    #[error("I/O error: {source}")]
    IoError {
        /// The underlying I/O error
        #[from]
        source: io::Error,
    },
}

impl CheckError {
    pub(crate) fn asn1(reason: impl Into<String>) -> Self {
        Self::Asn1Structure {
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::ProtocolValidation {
            reason: reason.into(),
        }
    }

    pub(crate) fn certificate(reason: impl Into<String>) -> Self {
        Self::CertificateError {
            reason: reason.into(),
        }
    }
}

impl From<openssl::error::ErrorStack> for CheckError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::OpenSSLError {
            details: e.to_string(),
        }
    }
}

impl<S: std::fmt::Debug> From<openssl::ssl::HandshakeError<S>> for CheckError {
    fn from(e: openssl::ssl::HandshakeError<S>) -> Self {
        Self::HandshakeFailed {
            details: format!("{}", e),
        }
    }
}

impl From<reqwest::Error> for CheckError {
    fn from(e: reqwest::Error) -> Self {
        let operation = if e.is_timeout() {
            "request (timed out)"
        } else {
            "request"
        };
        Self::Transport {
            operation: operation.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CheckError::InvalidInput {
            field: "url".to_string(),
            reason: "must provide a https url".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid input for 'url': must provide a https url"
        );
    }

    #[test]
    fn test_unknown_location_type_display() {
        let err = CheckError::UnknownLocationType {
            tag: 2,
            class: "Universal".to_string(),
        };
        assert!(err.to_string().contains("unknown type"));
        assert!(err.to_string().contains("tag 2"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error;

        let err: CheckError = io::Error::new(io::ErrorKind::NotFound, "cert.pem").into();
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("I/O error"));
    }
}
