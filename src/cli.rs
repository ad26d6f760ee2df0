//! Command-line interface definitions for the `palisade` binary.
//!
//! This module isolates the clap parser structures so the build script can
//! reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `palisade` binary.
#[derive(Debug, Parser)]
#[command(
    name = "palisade",
    about = "Provision a hardened web-server instance with a converging \
             firewall rule set and SSH credential"
)]
pub(crate) struct Cli {
    /// Tear down resources created by earlier runs instead of provisioning.
    #[arg(long)]
    pub(crate) cleanup: bool,
    /// Override the machine size class for this run.
    #[arg(long, value_name = "CLASS")]
    pub(crate) size_class: Option<String>,
    /// Override the boot image identifier for this run.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image_id: Option<String>,
}
