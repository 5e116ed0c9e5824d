//! Network access used by the revocation checks.
//!
//! The checker never opens sockets itself; it goes through [`Transport`] so
//! that tests can substitute a recording fake.

use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use openssl::ssl::{SslConnector, SslMethod, StatusType};
use openssl::x509::X509;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::error::CheckError;
use crate::ocsp::OCSP_REQUEST_CONTENT_TYPE;

static TIMEOUT: u64 = 30;

/// What a finished TLS handshake tells us about the peer.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    /// Verified chain, end-entity first.
    pub verified_chain: Vec<X509>,
    /// OCSP response stapled by the server, if any.
    pub stapled_response: Option<Vec<u8>>,
}

/// Blocking network operations needed by the checker.
pub trait Transport {
    /// Connects to `target` and returns the negotiated TLS state.
    ///
    /// A handshake that completes without verification state is reported as
    /// [`CheckError::NoConnectionState`].
    fn connection_state(&self, target: &Url) -> Result<ConnectionState, CheckError>;

    /// POSTs a DER-encoded OCSP request and returns the raw response body.
    fn post_ocsp_request(&self, responder_url: &str, request: &[u8])
        -> Result<Vec<u8>, CheckError>;

    /// GETs the issuer certificate published at an AIA CA-Issuers URL.
    fn fetch_issuer(&self, location: &str, timeout: Duration) -> Result<Vec<u8>, CheckError>;
}

/// [`Transport`] over real sockets: openssl for the handshake, reqwest for HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    ca_file: Option<PathBuf>,
}

impl HttpTransport {
    pub fn new() -> Result<HttpTransport, CheckError> {
        HttpTransport::with_ca_file(None)
    }

    /// `ca_file` replaces the default trust store for the TLS handshake.
    pub fn with_ca_file(ca_file: Option<PathBuf>) -> Result<HttpTransport, CheckError> {
        let client = Client::builder().build()?;
        Ok(HttpTransport { client, ca_file })
    }

    fn connector(&self) -> Result<SslConnector, CheckError> {
        let mut builder = SslConnector::builder(SslMethod::tls())?;
        if let Some(ca_file) = &self.ca_file {
            builder.set_ca_file(ca_file)?;
        }
        Ok(builder.build())
    }
}

impl Transport for HttpTransport {
    fn connection_state(&self, target: &Url) -> Result<ConnectionState, CheckError> {
        let host = target.host_str().ok_or_else(|| CheckError::InvalidInput {
            field: "url".to_string(),
            reason: "URL has no host".to_string(),
        })?;
        let port = target.port_or_known_default().unwrap_or(443);
        let remote = format!("{}:{}", host, port);

        let socket_addr = remote
            .to_socket_addrs()
            .map_err(|source| CheckError::DnsResolution {
                hostname: host.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| CheckError::DnsResolution {
                hostname: host.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
            })?;

        let tcp_stream = TcpStream::connect_timeout(&socket_addr, Duration::from_secs(TIMEOUT))
            .map_err(|source| CheckError::ConnectionFailed {
                address: remote.clone(),
                source,
            })?;
        tcp_stream.set_read_timeout(Some(Duration::from_secs(TIMEOUT)))?;

        let mut config = self.connector()?.configure()?;
        config.set_status_type(StatusType::OCSP)?;
        let stream = config.connect(host, tcp_stream)?;

        let ssl = stream.ssl();
        let verified_chain: Vec<X509> = ssl
            .verified_chain()
            .ok_or(CheckError::NoConnectionState)?
            .iter()
            .map(|cert| cert.to_owned())
            .collect();
        let stapled_response = ssl.ocsp_status().map(|staple| staple.to_vec());
        debug!(
            "handshake with {}: {} verified certificate(s), staple: {}",
            remote,
            verified_chain.len(),
            stapled_response.is_some()
        );

        Ok(ConnectionState {
            verified_chain,
            stapled_response,
        })
    }

    fn post_ocsp_request(
        &self,
        responder_url: &str,
        request: &[u8],
    ) -> Result<Vec<u8>, CheckError> {
        let response = self
            .client
            .post(responder_url)
            .header(CONTENT_TYPE, OCSP_REQUEST_CONTENT_TYPE)
            .body(request.to_vec())
            .send()
            .map_err(|e| transport_error("OCSP request", e))?
            .error_for_status()
            .map_err(|e| transport_error("OCSP request", e))?;

        let body = response
            .bytes()
            .map_err(|e| transport_error("reading OCSP response", e))?;
        debug!("{} byte OCSP response from {}", body.len(), responder_url);
        Ok(body.to_vec())
    }

    fn fetch_issuer(&self, location: &str, timeout: Duration) -> Result<Vec<u8>, CheckError> {
        let response = self
            .client
            .get(location)
            .timeout(timeout)
            .send()
            .map_err(|e| transport_error("issuer certificate fetch", e))?
            .error_for_status()
            .map_err(|e| transport_error("issuer certificate fetch", e))?;

        let body = response
            .bytes()
            .map_err(|e| transport_error("reading issuer certificate", e))?;
        debug!("{} byte issuer certificate from {}", body.len(), location);
        Ok(body.to_vec())
    }
}

fn transport_error(operation: &str, e: reqwest::Error) -> CheckError {
    let reason = if e.is_timeout() {
        format!("timed out: {}", e)
    } else {
        e.to_string()
    };
    CheckError::Transport {
        operation: operation.to_string(),
        reason,
    }
}
