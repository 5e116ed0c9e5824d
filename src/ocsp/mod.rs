//! OCSP request construction and response interpretation.
//!
//! # Submodules
//!
//! - `request` - picks the responder and encodes the request
//! - `response` - validates a response against the issuer and turns it into a [`Verdict`]

pub mod request;
pub mod response;

pub use request::{OcspRequest, RequestBuilder, OCSP_REQUEST_CONTENT_TYPE};
pub use response::{CertStatus, ResponseInterpreter, RevocationReason, Verdict};
