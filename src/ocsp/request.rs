use openssl::hash::MessageDigest;
use openssl::ocsp::{OcspCertId, OcspRequest as RawOcspRequest};
use tracing::debug;

use crate::certificate::Certificate;
use crate::error::CheckError;

/// Content type of an OCSP request sent over HTTP POST.
pub const OCSP_REQUEST_CONTENT_TYPE: &str = "application/ocsp-request";

/// A DER-encoded OCSP request and the responder it is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspRequest {
    pub responder_url: String,
    pub der: Vec<u8>,
}

/// Builds OCSP requests for one certificate at a time.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    responder_override: Option<String>,
}

impl RequestBuilder {
    /// `responder_override`, when set and non-empty, replaces the responder
    /// advertised by the certificate.
    pub fn new(responder_override: Option<String>) -> RequestBuilder {
        RequestBuilder {
            responder_override: responder_override.filter(|url| !url.is_empty()),
        }
    }

    /// Picks the responder URL for `end_entity`.
    pub fn responder_url(&self, end_entity: &Certificate) -> Result<String, CheckError> {
        if let Some(url) = &self.responder_override {
            return Ok(url.clone());
        }
        end_entity
            .ocsp_servers()
            .first()
            .cloned()
            .ok_or_else(|| CheckError::NoResponderUrl {
                subject: end_entity.common_name(),
            })
    }

    /// Encodes a single-certificate request bound to the issuer's name and key hash.
    pub fn build(
        &self,
        end_entity: &Certificate,
        issuer: &Certificate,
    ) -> Result<OcspRequest, CheckError> {
        let responder_url = self.responder_url(end_entity)?;

        let cert_id = OcspCertId::from_cert(MessageDigest::sha1(), end_entity.x509(), issuer.x509())?;
        let mut request = RawOcspRequest::new()?;
        request.add_id(cert_id)?;
        let der = request.to_der()?;
        debug!("built {} byte OCSP request for {}", der.len(), responder_url);

        Ok(OcspRequest { responder_url, der })
    }
}
