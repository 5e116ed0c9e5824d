use std::fmt;

use openssl::hash::MessageDigest;
use openssl::ocsp::{
    OcspCertId, OcspCertStatus, OcspFlag, OcspResponse, OcspResponseStatus, OcspRevokedStatus,
};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyFlags;
use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tracing::{info, warn};

use crate::certificate::Certificate;
use crate::error::CheckError;

/// Clock skew tolerated on thisUpdate/nextUpdate, in seconds.
const MAX_CLOCK_SKEW: u32 = 300;

/// CertID hash algorithms a single response may be keyed by.
const CERT_ID_DIGESTS: [fn() -> MessageDigest; 4] = [
    MessageDigest::sha1,
    MessageDigest::sha256,
    MessageDigest::sha384,
    MessageDigest::sha512,
];

/// Status of a certificate as reported by the responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum CertStatus {
    Good,
    Unknown,
    Revoked,
}

/// CRLReason codes. 7 is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    #[strum(serialize = "CACompromise")]
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    #[strum(serialize = "RemoveFromCRL")]
    RemoveFromCrl,
    PrivilegeWithdrawn,
    #[strum(serialize = "AACompromise")]
    AaCompromise,
}

impl RevocationReason {
    pub fn code(self) -> i32 {
        match self {
            RevocationReason::Unspecified => 0,
            RevocationReason::KeyCompromise => 1,
            RevocationReason::CaCompromise => 2,
            RevocationReason::AffiliationChanged => 3,
            RevocationReason::Superseded => 4,
            RevocationReason::CessationOfOperation => 5,
            RevocationReason::CertificateHold => 6,
            RevocationReason::RemoveFromCrl => 8,
            RevocationReason::PrivilegeWithdrawn => 9,
            RevocationReason::AaCompromise => 10,
        }
    }

    pub fn from_code(code: i32) -> Option<RevocationReason> {
        RevocationReason::iter().find(|reason| reason.code() == code)
    }

    /// Canonical label for `code`, or an explicit diagnostic for codes
    /// outside the table.
    pub fn label(code: i32) -> String {
        match RevocationReason::from_code(code) {
            Some(reason) => reason.to_string(),
            None => format!("unexpected value: {}", code),
        }
    }
}

/// Outcome of interpreting an OCSP response.
///
/// `revocation_reason` is whatever the responder put in the response, so it
/// is `None` when no reason was supplied, including every non-revoked status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub status: CertStatus,
    pub revocation_reason: Option<i32>,
}

impl Verdict {
    pub fn is_revoked(&self) -> bool {
        self.status == CertStatus::Revoked
    }

    pub fn reason_label(&self) -> Option<String> {
        self.revocation_reason.map(RevocationReason::label)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason_label() {
            Some(reason) => write!(f, "{} ({})", self.status, reason),
            None => write!(f, "{}", self.status),
        }
    }
}

/// Validates OCSP responses against the issuer and reads the certificate status.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseInterpreter;

impl ResponseInterpreter {
    pub fn new() -> ResponseInterpreter {
        ResponseInterpreter
    }

    /// Parses `response`, checks that it was signed by `issuer` or by a
    /// responder `issuer` delegated to, and returns the status it gives for
    /// `end_entity`.
    pub fn interpret(
        &self,
        response: &[u8],
        end_entity: &Certificate,
        issuer: &Certificate,
    ) -> Result<Verdict, CheckError> {
        let response = OcspResponse::from_der(response)
            .map_err(|e| CheckError::validation(format!("malformed OCSP response: {}", e)))?;

        let response_status = response.status();
        if response_status != OcspResponseStatus::SUCCESSFUL {
            return Err(CheckError::validation(format!(
                "responder returned {}",
                response_status_name(response_status)
            )));
        }

        let basic = response
            .basic()
            .map_err(|e| CheckError::validation(format!("no basic OCSP response: {}", e)))?;

        // The issuer is the only trust anchor. TRUST_OTHER accepts it as the
        // signer outright; a delegated responder still has to chain to it.
        let mut signers = Stack::new()?;
        signers.push(issuer.x509().to_owned())?;
        let mut store = X509StoreBuilder::new()?;
        store.add_cert(issuer.x509().to_owned())?;
        store.set_flags(X509VerifyFlags::PARTIAL_CHAIN)?;
        let store = store.build();

        basic
            .verify(&signers, &store, OcspFlag::TRUST_OTHER)
            .map_err(|e| CheckError::validation(format!("bad signature on OCSP response: {}", e)))?;

        // the responder picks the CertID hash, so try each one it may use
        let mut found = None;
        for digest in CERT_ID_DIGESTS {
            let cert_id = OcspCertId::from_cert(digest(), end_entity.x509(), issuer.x509())?;
            if let Some(single) = basic.find_status(&cert_id) {
                found = Some(single);
                break;
            }
        }
        let single = found.ok_or_else(|| {
            CheckError::validation(format!(
                "response has no status for certificate serial {}",
                end_entity.serial_number()
            ))
        })?;

        if let Err(e) = single.check_validity(MAX_CLOCK_SKEW, None) {
            warn!("OCSP response outside its validity period: {}", e);
        }

        let status = if single.status == OcspCertStatus::GOOD {
            CertStatus::Good
        } else if single.status == OcspCertStatus::REVOKED {
            CertStatus::Revoked
        } else {
            CertStatus::Unknown
        };

        let revocation_reason = if status == CertStatus::Revoked
            && single.reason != OcspRevokedStatus::NO_STATUS
        {
            Some(single.reason.as_raw())
        } else {
            None
        };

        let verdict = Verdict {
            status,
            revocation_reason,
        };
        match status {
            CertStatus::Good => info!("Certificate Status Good."),
            CertStatus::Unknown => info!("Certificate Status Unknown"),
            CertStatus::Revoked => info!("Certificate Status Revoked"),
        }
        info!(
            "Reason: {}",
            verdict.reason_label().as_deref().unwrap_or("none given")
        );

        Ok(verdict)
    }
}

fn response_status_name(status: OcspResponseStatus) -> String {
    let name = if status == OcspResponseStatus::MALFORMED_REQUEST {
        "malformedRequest"
    } else if status == OcspResponseStatus::INTERNAL_ERROR {
        "internalError"
    } else if status == OcspResponseStatus::TRY_LATER {
        "tryLater"
    } else if status == OcspResponseStatus::SIG_REQUIRED {
        "sigRequired"
    } else if status == OcspResponseStatus::UNAUTHORIZED {
        "unauthorized"
    } else {
        return format!("response status {}", status.as_raw());
    };
    name.to_string()
}
