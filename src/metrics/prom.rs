use lazy_static::lazy_static;
use prometheus::{labels, register_gauge, Gauge};
use tracing::{debug, warn};

use crate::checker::ScenarioOutcome;
use crate::ocsp::CertStatus;

lazy_static! {
    static ref OCSPCHECK_REVOCATION_STATUS: Gauge = register_gauge!(
        "ocspcheck_revocation_status",
        "certificate revocation status"
    )
    .expect("metric can be registered");
}

/// Gauge value for an outcome.
///
/// 0 = check failed, 1 = Good, 2 = Unknown, 3 = Revoked
pub fn status_value(outcome: &ScenarioOutcome) -> f64 {
    match &outcome.result {
        Ok(report) => match report.verdict.status {
            CertStatus::Good => 1.0,
            CertStatus::Unknown => 2.0,
            CertStatus::Revoked => 3.0,
        },
        Err(_) => 0.0,
    }
}

/// Function to push metrics to prometheus
/// # Arguments
/// * `outcomes` - Scenario outcomes of one run
/// * `prometheus_address` - Push gateway address
pub fn prometheus_metrics(outcomes: &[ScenarioOutcome], prometheus_address: &str) {
    for outcome in outcomes {
        OCSPCHECK_REVOCATION_STATUS.set(status_value(outcome));

        let path = match &outcome.result {
            Ok(report) => report.path.to_string(),
            Err(_) => "none".to_string(),
        };

        let metric_families = prometheus::gather();
        let pushed = prometheus::push_metrics(
            "ocspcheck",
            labels! {
                "instance".to_owned() => "ocspcheck".to_owned(),
                "target".to_owned() => outcome.target.to_owned(),
                "scenario".to_owned() => outcome.scenario.to_string(),
                "path".to_owned() => path,
                "revoked".to_owned() => outcome.is_revoked().to_string(),
            },
            &format!("{}/metrics/job", prometheus_address),
            metric_families,
            None,
        );

        match pushed {
            Ok(_) => debug!("pushed metrics for {}", outcome.target),
            Err(e) => warn!("Failed to push metrics to prometheus: {}", e),
        }
    }
}
