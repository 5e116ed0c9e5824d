//! Authority Information Access extension decoding.
//!
//! ```asn1
//! AuthorityInfoAccessSyntax ::= SEQUENCE SIZE (1..MAX) OF AccessDescription
//!
//! AccessDescription ::= SEQUENCE {
//!     accessMethod    OBJECT IDENTIFIER,
//!     accessLocation  GeneralName
//! }
//! ```
//!
//! The walk below only looks at the tag, class and constructed bit of each
//! element; the decoding of individual TLVs is left to `asn1-rs`.

use x509_parser::oid_registry::asn1_rs::{oid, Any, Class, FromDer, Oid, Tag};

use crate::error::CheckError;

/// id-pe-authorityInfoAccess
pub const OID_AUTHORITY_INFO_ACCESS: Oid<'static> = oid!(1.3.6.1.5.5.7.1.1);
/// id-ad-ocsp
pub const OID_AD_OCSP: Oid<'static> = oid!(1.3.6.1.5.5.7.48.1);
/// id-ad-caIssuers
pub const OID_AD_CA_ISSUERS: Oid<'static> = oid!(1.3.6.1.5.5.7.48.2);

/// GeneralName uniformResourceIdentifier is `[6] IMPLICIT IA5String`.
const TAG_URI: Tag = Tag(6);

/// Access methods this crate knows how to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMethod {
    /// Where the issuer certificate can be downloaded
    CaIssuers,
    /// Where the OCSP responder lives
    Ocsp,
}

impl AccessMethod {
    pub fn oid(self) -> Oid<'static> {
        match self {
            AccessMethod::CaIssuers => OID_AD_CA_ISSUERS,
            AccessMethod::Ocsp => OID_AD_OCSP,
        }
    }
}

/// Returns the CA-Issuers URL of an AIA extension.
///
/// `extension` is the `extnValue` content, without the outer extension
/// wrapper. `Ok(None)` means the extension holds no CA-Issuers entry.
pub fn decode_aia(extension: &[u8]) -> Result<Option<String>, CheckError> {
    find_access_location(extension, AccessMethod::CaIssuers)
}

/// Returns the location of the first access description using `method`.
///
/// Scanning stops at the first match. A match whose location is not a URI is
/// an error; locations of other methods are not inspected.
pub fn find_access_location(
    extension: &[u8],
    method: AccessMethod,
) -> Result<Option<String>, CheckError> {
    let (rest, outer) = parse_element(extension)?;
    if !rest.is_empty() {
        return Err(CheckError::asn1("trailing data after X.509 extension"));
    }
    expect_sequence(&outer, "bad AIA sequence")?;

    let wanted = method.oid();
    let mut remaining = outer.data;
    while !remaining.is_empty() {
        let (next, description) = parse_access_description(remaining)?;
        remaining = next;

        if description.method == wanted {
            return location_uri(&description.location).map(Some);
        }
    }

    Ok(None)
}

/// One entry of the AIA sequence, still undecoded on the location side.
struct AccessDescription<'a> {
    method: Oid<'a>,
    location: Any<'a>,
}

fn parse_access_description(input: &[u8]) -> Result<(&[u8], AccessDescription<'_>), CheckError> {
    let (rest, inner) = parse_element(input)?;
    expect_sequence(&inner, "bad AccessDescription sequence")?;

    let (body, method) = Oid::from_der(inner.data)
        .map_err(|e| CheckError::asn1(format!("error unmarshaling access method: {}", e)))?;
    let (trailing, location) = parse_element(body)?;
    if !trailing.is_empty() {
        return Err(CheckError::asn1("trailing data after AIA access description"));
    }

    Ok((rest, AccessDescription { method, location }))
}

fn location_uri(location: &Any<'_>) -> Result<String, CheckError> {
    let header = &location.header;
    if header.class() != Class::ContextSpecific || header.tag() != TAG_URI {
        return Err(CheckError::UnknownLocationType {
            tag: header.tag().0,
            class: format!("{:?}", header.class()),
        });
    }

    std::str::from_utf8(location.data)
        .map(str::to_owned)
        .map_err(|_| CheckError::asn1("AIA location URI is not valid text"))
}

fn parse_element(input: &[u8]) -> Result<(&[u8], Any<'_>), CheckError> {
    Any::from_der(input).map_err(|e| CheckError::asn1(format!("error unmarshaling: {}", e)))
}

fn expect_sequence(any: &Any<'_>, message: &str) -> Result<(), CheckError> {
    let header = &any.header;
    if !header.is_constructed() || header.tag() != Tag::Sequence || header.class() != Class::Universal
    {
        return Err(CheckError::asn1(message));
    }
    Ok(())
}
