//! Revocation check orchestration.
//!
//! [`RevocationChecker`] drives the two entry scenarios:
//!
//! * a live `https://` URL, where the stapled OCSP response is used when the
//!   server sent one and stapling is not bypassed, and a manual OCSP
//!   round-trip is made otherwise;
//! * a PEM certificate file, where the issuer is downloaded from the AIA
//!   CA-Issuers URL before the manual round-trip.
//!
//! Each scenario either ends in a [`CheckReport`] or in the first
//! [`CheckError`] it hits.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use strum_macros::Display;
use tracing::{info, warn};
use url::Url;

use crate::aia::decode_aia;
use crate::certificate::Certificate;
use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::ocsp::{RequestBuilder, ResponseInterpreter, Verdict};
use crate::transport::Transport;

/// PEM label of dumped OCSP requests.
pub const DUMP_REQUEST_LABEL: &str = "OCSP Request";
/// PEM label of dumped OCSP responses.
pub const DUMP_RESPONSE_LABEL: &str = "OCSP Response";

/// Which entry point produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    #[strum(serialize = "url")]
    Url,
    #[strum(serialize = "file")]
    File,
}

/// How the OCSP response was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckPath {
    #[strum(serialize = "stapled")]
    Stapled,
    #[strum(serialize = "manual")]
    Manual,
}

/// Result of a completed revocation check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub scenario: Scenario,
    pub target: String,
    pub path: CheckPath,
    pub subject: String,
    pub issuer: String,
    /// Responder queried on the manual path.
    pub responder: Option<String>,
    pub verdict: Verdict,
    /// Display label of the revocation reason, when one was given.
    pub reason: Option<String>,
}

/// One scenario of a [`RevocationChecker::run`], successful or not.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub target: String,
    pub result: Result<CheckReport, CheckError>,
}

impl ScenarioOutcome {
    pub fn is_revoked(&self) -> bool {
        matches!(&self.result, Ok(report) if report.verdict.is_revoked())
    }
}

/// Checks certificates for revocation over a [`Transport`].
pub struct RevocationChecker<T: Transport> {
    config: CheckConfig,
    transport: T,
    requests: RequestBuilder,
    interpreter: ResponseInterpreter,
    dump_sink: RefCell<Box<dyn Write>>,
}

impl<T: Transport> RevocationChecker<T> {
    pub fn new(config: CheckConfig, transport: T) -> RevocationChecker<T> {
        let requests = RequestBuilder::new(config.responder.clone());
        RevocationChecker {
            config,
            transport,
            requests,
            interpreter: ResponseInterpreter::new(),
            dump_sink: RefCell::new(Box::new(io::stdout())),
        }
    }

    /// Sends the `dump` output somewhere other than stdout.
    pub fn with_dump_writer(mut self, writer: Box<dyn Write>) -> RevocationChecker<T> {
        self.dump_sink = RefCell::new(writer);
        self
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs every scenario the configuration supplies input for: the URL
    /// first, then the file. A failing scenario does not stop the other one.
    pub fn run(&self) -> Result<Vec<ScenarioOutcome>, CheckError> {
        if self.config.url.is_none() && self.config.pem.is_none() {
            return Err(CheckError::NoScenarioInput);
        }

        let mut outcomes = Vec::new();
        if let Some(url) = &self.config.url {
            let result = self.check_url(url);
            if let Err(e) = &result {
                warn!("Error processing URL: {}", e);
            }
            outcomes.push(ScenarioOutcome {
                scenario: Scenario::Url,
                target: url.clone(),
                result,
            });
        }
        if let Some(pem) = &self.config.pem {
            let result = self.check_file(pem);
            if let Err(e) = &result {
                warn!("Error processing file: {}", e);
            }
            outcomes.push(ScenarioOutcome {
                scenario: Scenario::File,
                target: pem.display().to_string(),
                result,
            });
        }
        Ok(outcomes)
    }

    /// Checks the certificate a TLS server presents at `url`.
    pub fn check_url(&self, url: &str) -> Result<CheckReport, CheckError> {
        let target = Url::parse(url).map_err(|e| CheckError::InvalidInput {
            field: "url".to_string(),
            reason: e.to_string(),
        })?;
        if target.scheme() != "https" {
            return Err(CheckError::InvalidInput {
                field: "url".to_string(),
                reason: "must provide a https url".to_string(),
            });
        }

        let state = self.transport.connection_state(&target)?;
        let mut chain = state.verified_chain.into_iter();
        let (server, issuer) = match (chain.next(), chain.next()) {
            (Some(server), Some(issuer)) => (
                Certificate::from_x509(server),
                Certificate::from_x509(issuer),
            ),
            (server, _) => {
                return Err(CheckError::NoVerifiedChain {
                    length: usize::from(server.is_some()),
                })
            }
        };

        match state.stapled_response {
            Some(staple) if !self.config.no_staple => {
                info!("stapled check");
                self.stapled_check(Scenario::Url, url, &server, &issuer, &staple)
            }
            _ => {
                info!("remote check");
                self.manual_check(Scenario::Url, url, &server, &issuer)
            }
        }
    }

    /// Checks a PEM certificate, fetching its issuer through AIA.
    pub fn check_file(&self, path: &Path) -> Result<CheckReport, CheckError> {
        let pem = fs::read(path)?;
        let end_entity = Certificate::from_pem(&pem)?;

        let mut issuer_url = None;
        for extension in end_entity.authority_info_access()? {
            if let Some(url) = decode_aia(&extension.value)? {
                if !url.is_empty() {
                    issuer_url = Some(url);
                }
            }
        }
        let issuer_url = issuer_url.ok_or_else(|| CheckError::NoIssuerLocation {
            subject: end_entity.common_name(),
        })?;

        info!("Fetching issuer certificate from {}", issuer_url);
        let body = self
            .transport
            .fetch_issuer(&issuer_url, self.config.issuer_fetch_timeout)?;
        let issuer = parse_fetched_issuer(&body)?;

        self.manual_check(
            Scenario::File,
            &path.display().to_string(),
            &end_entity,
            &issuer,
        )
    }

    fn manual_check(
        &self,
        scenario: Scenario,
        target: &str,
        end_entity: &Certificate,
        issuer: &Certificate,
    ) -> Result<CheckReport, CheckError> {
        let request = self.requests.build(end_entity, issuer)?;

        info!("Server: {}", end_entity.common_name());
        info!("Issuer: {}", issuer.common_name());
        info!("OCSP URL: {}", request.responder_url);

        self.dump(DUMP_REQUEST_LABEL, &request.der)?;
        let response = self
            .transport
            .post_ocsp_request(&request.responder_url, &request.der)?;
        self.dump(DUMP_RESPONSE_LABEL, &response)?;

        let verdict = self.interpreter.interpret(&response, end_entity, issuer)?;
        Ok(report(
            scenario,
            target,
            CheckPath::Manual,
            end_entity,
            issuer,
            Some(request.responder_url),
            verdict,
        ))
    }

    fn stapled_check(
        &self,
        scenario: Scenario,
        target: &str,
        end_entity: &Certificate,
        issuer: &Certificate,
        staple: &[u8],
    ) -> Result<CheckReport, CheckError> {
        info!("Server: {}", end_entity.common_name());
        info!("Issuer: {}", issuer.common_name());

        self.dump(DUMP_RESPONSE_LABEL, staple)?;
        let verdict = self.interpreter.interpret(staple, end_entity, issuer)?;
        Ok(report(
            scenario,
            target,
            CheckPath::Stapled,
            end_entity,
            issuer,
            None,
            verdict,
        ))
    }

    fn dump(&self, label: &str, bytes: &[u8]) -> Result<(), CheckError> {
        if !self.config.dump {
            return Ok(());
        }
        let block = pem::encode(&pem::Pem::new(label, bytes.to_vec()));
        let mut sink = self.dump_sink.borrow_mut();
        sink.write_all(block.as_bytes())?;
        sink.flush()?;
        Ok(())
    }
}

impl<T: Transport> fmt::Debug for RevocationChecker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevocationChecker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Issuers are published as DER; some CAs serve PEM anyway.
fn parse_fetched_issuer(body: &[u8]) -> Result<Certificate, CheckError> {
    if body.starts_with(b"-----BEGIN") {
        Certificate::from_pem(body)
    } else {
        Certificate::from_der(body)
    }
}

fn report(
    scenario: Scenario,
    target: &str,
    path: CheckPath,
    end_entity: &Certificate,
    issuer: &Certificate,
    responder: Option<String>,
    verdict: Verdict,
) -> CheckReport {
    CheckReport {
        scenario,
        target: target.to_string(),
        path,
        subject: end_entity.common_name(),
        issuer: issuer.common_name(),
        responder,
        reason: verdict.reason_label(),
        verdict,
    }
}
