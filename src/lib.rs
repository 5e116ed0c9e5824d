//! OCSP revocation checking for TLS servers and PEM certificates.
//!
//! Two entry points are supported:
//!
//! * **Live connection**: connect to an `https://` URL, then validate the
//!   stapled OCSP response, or query the certificate's OCSP responder when no
//!   staple was sent (or stapling is bypassed).
//! * **Certificate file**: load a PEM certificate, download its issuer from
//!   the AIA CA-Issuers URL and query the OCSP responder.
//!
//! # Example
//!
//! ```no_run
//! use ocspcheck::{CheckConfig, HttpTransport, RevocationChecker};
//!
//! let config = CheckConfig {
//!     url: Some("https://example.com".to_string()),
//!     ..CheckConfig::default()
//! };
//! let checker = RevocationChecker::new(config, HttpTransport::new()?);
//! let report = checker.check_url("https://example.com")?;
//! println!("{}: {}", report.subject, report.verdict);
//! # Ok::<(), ocspcheck::CheckError>(())
//! ```

pub mod aia;
pub mod certificate;
pub mod checker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ocsp;
pub mod transport;

pub use aia::{decode_aia, find_access_location, AccessMethod};
pub use certificate::{Certificate, Extension};
pub use checker::{CheckPath, CheckReport, RevocationChecker, Scenario, ScenarioOutcome};
pub use config::CheckConfig;
pub use error::CheckError;
pub use ocsp::{CertStatus, OcspRequest, RequestBuilder, ResponseInterpreter, RevocationReason, Verdict};
pub use transport::{ConnectionState, HttpTransport, Transport};
