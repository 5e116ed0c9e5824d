use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use ocspcheck::config::{Config, OutputFormat, PrometheusConfig, DEFAULT_CONFIG_FILE};
use ocspcheck::metrics::prom::prometheus_metrics;
use ocspcheck::{CertStatus, HttpTransport, RevocationChecker, ScenarioOutcome};

/// Check the OCSP revocation status of a TLS server or a PEM certificate
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// HTTPS URL to check
    #[arg(long)]
    url: Option<String>,

    /// PEM certificate file to check
    #[arg(long)]
    pem: Option<PathBuf>,

    /// OCSP responder to use instead of the one in the certificate
    #[arg(long)]
    responder: Option<String>,

    /// Ignore stapled OCSP responses
    #[arg(long)]
    nostaple: bool,

    /// Dump raw OCSP requests and responses as PEM to stdout
    #[arg(long)]
    dump: bool,

    /// Output format: text or json
    #[arg(short, long)]
    output: Option<String>,

    /// Exit code used when a certificate is revoked
    #[arg(long)]
    exit_code: Option<i32>,

    /// Issuer certificate fetch timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// CA bundle used to verify the TLS server
    #[arg(long)]
    ca_file: Option<PathBuf>,

    /// Configuration file (defaults to ocspcheck.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    generate_config: bool,

    /// Push verdicts to a Prometheus push gateway
    #[arg(long)]
    prometheus: bool,

    /// Prometheus push gateway address
    #[arg(long)]
    prometheus_address: Option<String>,

    /// Verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn to_config(&self) -> Config {
        Config {
            url: self.url.clone(),
            pem: self.pem.clone(),
            responder: self.responder.clone(),
            no_staple: self.nostaple.then_some(true),
            dump: self.dump.then_some(true),
            output: self.output.clone(),
            exit_code: self.exit_code,
            issuer_fetch_timeout_secs: self.timeout,
            ca_file: self.ca_file.clone(),
            prometheus: Some(PrometheusConfig {
                enabled: self.prometheus.then_some(true),
                address: self.prometheus_address.clone(),
            }),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(file_config) => Config::defaults()
            .merge_with(file_config)
            .merge_with(cli.to_config()),
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    };

    let output = config.output_format().unwrap_or_else(|e| {
        eprintln!("{}", e);
        exit(1)
    });
    let check_config = config.to_check_config().unwrap_or_else(|e| {
        eprintln!("{}", e);
        exit(1)
    });

    let transport = HttpTransport::with_ca_file(check_config.ca_file.clone()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        exit(1)
    });
    let checker = RevocationChecker::new(check_config, transport);

    let outcomes = match checker.run() {
        Ok(outcomes) => outcomes,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    match output {
        OutputFormat::Json => print_json(&outcomes),
        OutputFormat::Text => print_table(&outcomes),
    }

    if let Some(address) = config.prometheus_address() {
        prometheus_metrics(&outcomes, &address);
    }

    if outcomes.iter().any(|o| o.result.is_err()) {
        exit(1);
    }
    if outcomes.iter().any(ScenarioOutcome::is_revoked) {
        exit(config.exit_code.unwrap_or(2));
    }
    exit(0);
}

/// Reads the explicit config file, or `ocspcheck.toml` if one is lying around.
fn load_config(path: Option<&Path>) -> Result<Config, ocspcheck::config::ConfigError> {
    match path {
        Some(path) => Config::from_file(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Config::from_file(DEFAULT_CONFIG_FILE),
        None => Ok(Config::default()),
    }
}

fn print_json(outcomes: &[ScenarioOutcome]) {
    let results: Vec<_> = outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(report) => json!(report),
            Err(e) => json!({
                "scenario": outcome.scenario,
                "target": outcome.target,
                "error": e.to_string(),
            }),
        })
        .collect();
    match serde_json::to_string_pretty(&results) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to serialize results: {}", e),
    }
}

fn print_table(outcomes: &[ScenarioOutcome]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Target", "Check", "Subject", "Issuer", "Responder", "Status", "Reason",
        ]);

    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                let color = match report.verdict.status {
                    CertStatus::Good => Color::Green,
                    CertStatus::Unknown => Color::Yellow,
                    CertStatus::Revoked => Color::Red,
                };
                table.add_row(vec![
                    Cell::new(&report.target),
                    Cell::new(report.path),
                    Cell::new(&report.subject),
                    Cell::new(&report.issuer),
                    Cell::new(report.responder.as_deref().unwrap_or("-")),
                    Cell::new(report.verdict.status).fg(color),
                    Cell::new(report.reason.as_deref().unwrap_or("-")),
                ]);
            }
            Err(e) => {
                table.add_row(vec![
                    Cell::new(&outcome.target),
                    Cell::new(outcome.scenario),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("Error").fg(Color::Red),
                    Cell::new(e),
                ]);
            }
        }
    }

    println!("{table}");
}
