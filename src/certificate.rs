//! The certificate type consumed by the revocation checks.
//!
//! openssl owns the parsed certificate since the OCSP bindings need an
//! `X509`. The extension records are read with `x509-parser` when asked for,
//! which hands out each `extnValue` untouched.

use std::fmt;

use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509Ref, X509};
use x509_parser::oid_registry::asn1_rs::Oid;

use crate::aia::OID_AUTHORITY_INFO_ACCESS;
use crate::error::CheckError;

/// One X.509 extension: its OID and the raw DER of its value.
#[derive(Debug, Clone)]
pub struct Extension {
    pub oid: Oid<'static>,
    pub critical: bool,
    pub value: Vec<u8>,
}

/// A parsed, immutable X.509 certificate.
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
    ocsp_servers: Vec<String>,
}

impl Certificate {
    /// Parses the first certificate of a PEM document.
    pub fn from_pem(pem: &[u8]) -> Result<Certificate, CheckError> {
        let x509 = X509::from_pem(pem)
            .map_err(|e| CheckError::certificate(format!("failed to parse certificate PEM: {}", e)))?;
        Ok(Certificate::from_x509(x509))
    }

    /// Parses a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Certificate, CheckError> {
        let x509 = X509::from_der(der)
            .map_err(|e| CheckError::certificate(format!("failed to parse certificate: {}", e)))?;
        Ok(Certificate::from_x509(x509))
    }

    pub fn from_x509(x509: X509) -> Certificate {
        // X509_get1_ocsp reports "no AIA" as an empty error stack
        let ocsp_servers = x509
            .ocsp_responders()
            .map(|servers| servers.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        Certificate { x509, ocsp_servers }
    }

    pub fn x509(&self) -> &X509Ref {
        &self.x509
    }

    pub fn common_name(&self) -> String {
        common_name(self.x509.subject_name())
    }

    pub fn issuer_common_name(&self) -> String {
        common_name(self.x509.issuer_name())
    }

    pub fn serial_number(&self) -> String {
        self.x509
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_hex_str().map(|s| s.to_string()))
            .unwrap_or_default()
    }

    /// Reads the extension records. Only the file check needs them, so they
    /// are decoded on demand.
    pub fn extensions(&self) -> Result<Vec<Extension>, CheckError> {
        let der = self.x509.to_der()?;
        let (_, parsed) = x509_parser::parse_x509_certificate(&der)
            .map_err(|e| CheckError::certificate(format!("failed to read extensions: {}", e)))?;
        Ok(parsed
            .extensions()
            .iter()
            .map(|ext| Extension {
                oid: ext.oid.to_owned(),
                critical: ext.critical,
                value: ext.value.to_vec(),
            })
            .collect())
    }

    /// All AIA extension records, in certificate order.
    pub fn authority_info_access(&self) -> Result<Vec<Extension>, CheckError> {
        let mut records = self.extensions()?;
        records.retain(|ext| ext.oid == OID_AUTHORITY_INFO_ACCESS);
        Ok(records)
    }

    /// OCSP responder URLs advertised by the certificate.
    pub fn ocsp_servers(&self) -> &[String] {
        &self.ocsp_servers
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.common_name())
            .field("issuer", &self.issuer_common_name())
            .field("serial", &self.serial_number())
            .field("ocsp_servers", &self.ocsp_servers)
            .finish()
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .map(|entry| String::from_utf8_lossy(entry.data().as_slice()).into_owned())
        .unwrap_or_default()
}
