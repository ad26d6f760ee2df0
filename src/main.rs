//! Binary entry point for the Palisade CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use palisade::{
    AwsProvider, IpifyResolver, ProvisionError, Provisioner, ProvisionerConfig,
    ProvisioningResult, TeardownReport,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("address discovery error: {0}")]
    Address(String),
    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    let mut config = ProvisionerConfig::load_without_cli_args()
        .map_err(|err| CliError::Config(err.to_string()))?;
    if let Some(size_class) = cli.size_class {
        config.size_class = size_class;
    }
    if let Some(image_id) = cli.image_id {
        config.image_id = image_id;
    }

    let provider = AwsProvider::new(&config.region).await;
    let resolver = IpifyResolver::new(&config.ip_service_url)
        .map_err(|err| CliError::Address(err.to_string()))?;
    let provisioner = Provisioner::new(provider, resolver, config.key_store());

    if cli.cleanup {
        let report = provisioner.teardown(&config.as_teardown_request()).await;
        render_teardown(io::stdout(), &report);
        return Ok(i32::from(!report.is_clean()));
    }

    let request = config
        .as_request()
        .map_err(|err| CliError::Config(err.to_string()))?;
    let result = provisioner.provision(&request).await?;
    render_result(io::stdout(), &result);
    Ok(0)
}

fn render_result(mut target: impl Write, result: &ProvisioningResult) {
    writeln!(target, "instance id: {}", result.instance_id).ok();
    match result.public_address {
        Some(address) => {
            writeln!(target, "public address: {address}").ok();
        }
        None => {
            writeln!(target, "public address: none assigned").ok();
        }
    }
    writeln!(target, "key file: {}", result.key_path).ok();
}

fn render_teardown(mut target: impl Write, report: &TeardownReport) {
    for step in &report.steps {
        writeln!(target, "{}: {}", step.resource, step.outcome).ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use camino::Utf8PathBuf;
    use palisade::{StepOutcome, StepReport};

    use super::*;

    #[test]
    fn render_result_reports_missing_address() {
        let mut buf = Vec::new();
        let result = ProvisioningResult {
            instance_id: String::from("i-abc123"),
            public_address: None,
            key_path: Utf8PathBuf::from("keys/web-server-key.pem"),
        };
        render_result(&mut buf, &result);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(rendered.contains("public address: none assigned"), "rendered: {rendered}");
        assert!(rendered.contains("keys/web-server-key.pem"), "rendered: {rendered}");
    }

    #[test]
    fn render_result_reports_assigned_address() {
        let mut buf = Vec::new();
        let result = ProvisioningResult {
            instance_id: String::from("i-abc123"),
            public_address: Some(Ipv4Addr::new(198, 51, 100, 9)),
            key_path: Utf8PathBuf::from("keys/web-server-key.pem"),
        };
        render_result(&mut buf, &result);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(rendered.contains("public address: 198.51.100.9"), "rendered: {rendered}");
    }

    #[test]
    fn render_teardown_lists_every_step() {
        let mut buf = Vec::new();
        let report = TeardownReport {
            steps: vec![
                StepReport {
                    resource: String::from("credential 'web-server-key'"),
                    outcome: StepOutcome::Removed,
                },
                StepReport {
                    resource: String::from("firewall rule set 'web-server-sg'"),
                    outcome: StepOutcome::Failed {
                        message: String::from("still referenced"),
                    },
                },
            ],
        };
        render_teardown(&mut buf, &report);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(rendered.contains("removed"), "rendered: {rendered}");
        assert!(rendered.contains("failed: still referenced"), "rendered: {rendered}");
    }

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        let err = CliError::Config(String::from("missing image id"));
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(
            rendered.contains("configuration error: missing image id"),
            "rendered: {rendered}"
        );
    }
}
