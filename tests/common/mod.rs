//! Shared fixtures for the integration tests.
//!
//! Builds a throwaway PKI with openssl, signs OCSP responses by hand and
//! offers a [`FakeTransport`] that records every network call the checker
//! makes.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use openssl::asn1::{Asn1Integer, Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Extension, X509NameBuilder, X509};
use url::Url;

use ocspcheck::{CheckError, ConnectionState, Transport};
use x509_parser::oid_registry::asn1_rs::{Any, FromDer};

pub const RESPONDER_URL: &str = "http://ocsp.test.invalid";
pub const ISSUER_URL: &str = "http://ca.test.invalid/issuer.der";

/// A key pair and the certificate for it.
pub struct Identity {
    pub key: PKey<Private>,
    pub cert: X509,
}

impl Identity {
    pub fn der(&self) -> Vec<u8> {
        self.cert.to_der().unwrap()
    }

    pub fn pem(&self) -> Vec<u8> {
        self.cert.to_pem().unwrap()
    }
}

fn new_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn name(common_name: &str) -> openssl::x509::X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder
        .append_entry_by_nid(Nid::COMMONNAME, common_name)
        .unwrap();
    builder.build()
}

/// Self-signed CA.
pub fn ca(common_name: &str) -> Identity {
    let key = new_key();
    let subject = name(common_name);

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = Asn1Integer::from_bn(&BigNum::from_u32(1).unwrap()).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&subject).unwrap();
    builder.set_issuer_name(&subject).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .digital_signature()
                .build()
                .unwrap(),
        )
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    Identity {
        key,
        cert: builder.build(),
    }
}

/// End-entity certificate signed by `issuer`, with an optional raw AIA value.
pub fn leaf(common_name: &str, serial: u32, issuer: &Identity, aia: Option<&[u8]>) -> Identity {
    let key = new_key();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = Asn1Integer::from_bn(&BigNum::from_u32(serial).unwrap()).unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name(common_name)).unwrap();
    builder
        .set_issuer_name(issuer.cert.subject_name())
        .unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(90).unwrap())
        .unwrap();
    if let Some(aia) = aia {
        let oid = Asn1Object::from_str("1.3.6.1.5.5.7.1.1").unwrap();
        let value = Asn1OctetString::new_from_bytes(aia).unwrap();
        builder
            .append_extension(X509Extension::new_from_der(&oid, false, &value).unwrap())
            .unwrap();
    }
    builder.sign(&issuer.key, MessageDigest::sha256()).unwrap();

    Identity {
        key,
        cert: builder.build(),
    }
}

// DER writing

pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(content);
    out
}

pub fn seq(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

fn generalized_time(value: &str) -> Vec<u8> {
    tlv(0x18, value.as_bytes())
}

// 1.3.6.1.5.5.7.48.1 / 48.2
pub const OID_OCSP: [u8; 8] = [0x2b, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x01];
pub const OID_CA_ISSUERS: [u8; 8] = [0x2b, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x02];

/// AIA extension value listing an OCSP responder and a CA-Issuers URL.
pub fn aia_value(ocsp: Option<&str>, ca_issuers: Option<&str>) -> Vec<u8> {
    let mut descriptions = Vec::new();
    if let Some(url) = ocsp {
        descriptions.push(seq(&[tlv(0x06, &OID_OCSP), tlv(0x86, url.as_bytes())]));
    }
    if let Some(url) = ca_issuers {
        descriptions.push(seq(&[
            tlv(0x06, &OID_CA_ISSUERS),
            tlv(0x86, url.as_bytes()),
        ]));
    }
    seq(&descriptions)
}

/// Status to put into a forged single response.
#[derive(Debug, Clone, Copy)]
pub enum Status {
    Good,
    Unknown,
    /// Revoked, with an optional CRLReason code.
    Revoked(Option<u8>),
}

/// Pulls the CertID TLV out of a single-certificate OCSP request.
pub fn request_cert_id(request: &[u8]) -> Vec<u8> {
    fn content(element: &[u8]) -> &[u8] {
        let (_, any) = Any::from_der(element).unwrap();
        any.data
    }
    // OCSPRequest { tbsRequest, .. } -> TBSRequest content
    let tbs = content(content(request));
    // skip optional [0] version / [1] requestorName up to requestList
    let mut rest = tbs;
    loop {
        let (next, any) = Any::from_der(rest).unwrap();
        if any.header.tag().0 == 16 {
            break;
        }
        rest = next;
    }
    // requestList -> Request -> CertID
    let request = content(content(rest));
    let (after, _) = Any::from_der(request).unwrap();
    request[..request.len() - after.len()].to_vec()
}

/// Forges an OCSPResponse for `cert_id` naming `responder` as the responder
/// and signed with `signer`.
pub fn ocsp_response(
    cert_id: &[u8],
    status: Status,
    responder: &X509,
    signer: &PKey<Private>,
) -> Vec<u8> {
    signed_response(cert_id, status, responder, signer, &[])
}

/// Like [`ocsp_response`], with `embedded` carried in the response's certs field.
pub fn signed_response(
    cert_id: &[u8],
    status: Status,
    responder: &X509,
    signer: &PKey<Private>,
    embedded: &[&X509],
) -> Vec<u8> {
    forge_response(cert_id, status, responder, signer, embedded, "20991231000000Z")
}

/// Issuer-signed response whose nextUpdate has already passed.
pub fn expired_response(
    cert_id: &[u8],
    status: Status,
    responder: &X509,
    signer: &PKey<Private>,
) -> Vec<u8> {
    forge_response(cert_id, status, responder, signer, &[], "20240102000000Z")
}

fn forge_response(
    cert_id: &[u8],
    status: Status,
    responder: &X509,
    signer: &PKey<Private>,
    embedded: &[&X509],
    next_update: &str,
) -> Vec<u8> {
    let cert_status = match status {
        Status::Good => vec![0x80, 0x00],
        Status::Unknown => vec![0x82, 0x00],
        Status::Revoked(reason) => {
            let mut info = generalized_time("20240101000000Z");
            if let Some(code) = reason {
                info.extend(tlv(0xa0, &tlv(0x0a, &[code])));
            }
            tlv(0xa1, &info)
        }
    };

    let single = seq(&[
        cert_id.to_vec(),
        cert_status,
        generalized_time("20240101000000Z"),
        tlv(0xa0, &generalized_time(next_update)),
    ]);

    let responder_name = responder.subject_name().to_der().unwrap();
    let tbs = seq(&[
        tlv(0xa1, &responder_name),
        generalized_time("20240101000000Z"),
        seq(&[single]),
    ]);

    let mut signing = Signer::new(MessageDigest::sha256(), signer).unwrap();
    signing.update(&tbs).unwrap();
    let signature = signing.sign_to_vec().unwrap();
    let mut bits = vec![0x00];
    bits.extend(signature);

    // ecdsa-with-SHA256
    let algorithm = seq(&[tlv(
        0x06,
        &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02],
    )]);
    let mut basic_parts = vec![tbs, algorithm, tlv(0x03, &bits)];
    if !embedded.is_empty() {
        let certs: Vec<Vec<u8>> = embedded.iter().map(|c| c.to_der().unwrap()).collect();
        basic_parts.push(tlv(0xa0, &seq(&certs)));
    }
    let basic = seq(&basic_parts);

    // id-pkix-ocsp-basic
    let basic_oid = tlv(0x06, &[0x2b, 0x06, 0x01, 0x05, 0x05, 0x07, 0x30, 0x01, 0x01]);
    let response_bytes = seq(&[basic_oid, tlv(0x04, &basic)]);
    seq(&[tlv(0x0a, &[0x00]), tlv(0xa0, &response_bytes)])
}

/// An OCSPResponse carrying only a non-successful status.
pub fn ocsp_error_response(status: u8) -> Vec<u8> {
    seq(&[tlv(0x0a, &[status])])
}

/// Calls made through a [`FakeTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(String),
    Post { url: String, body: Vec<u8> },
    Fetch { url: String, timeout: Duration },
}

/// Scripted transport. The OCSP answer is produced from the posted request
/// so it can echo the CertID.
pub struct FakeTransport {
    pub state: Option<ConnectionState>,
    pub issuer_body: Option<Vec<u8>>,
    pub responder: Option<Box<dyn Fn(&[u8]) -> Vec<u8>>>,
    pub calls: RefCell<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> FakeTransport {
        FakeTransport {
            state: None,
            issuer_body: None,
            responder: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn posts(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Post { .. }))
            .count()
    }

    pub fn fetches(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Fetch { .. }))
            .count()
    }
}

impl Transport for FakeTransport {
    fn connection_state(&self, target: &Url) -> Result<ConnectionState, CheckError> {
        self.calls
            .borrow_mut()
            .push(Call::Connect(target.to_string()));
        self.state.clone().ok_or(CheckError::NoConnectionState)
    }

    fn post_ocsp_request(&self, responder_url: &str, request: &[u8]) -> Result<Vec<u8>, CheckError> {
        self.calls.borrow_mut().push(Call::Post {
            url: responder_url.to_string(),
            body: request.to_vec(),
        });
        match &self.responder {
            Some(respond) => Ok(respond(request)),
            None => Err(CheckError::Transport {
                operation: "OCSP request".to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }

    fn fetch_issuer(&self, location: &str, timeout: Duration) -> Result<Vec<u8>, CheckError> {
        self.calls.borrow_mut().push(Call::Fetch {
            url: location.to_string(),
            timeout,
        });
        self.issuer_body.clone().ok_or_else(|| CheckError::Transport {
            operation: "issuer certificate fetch".to_string(),
            reason: "404 Not Found".to_string(),
        })
    }
}

/// `Write` sink the test keeps a handle to.
#[derive(Clone, Default)]
pub struct SharedBuffer(pub Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
