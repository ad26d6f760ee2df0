//! Core library for the Palisade provisioning tool.
//!
//! The crate exposes a provider abstraction for converging named compute
//! resources (firewall rule set, SSH credential) and launching an instance
//! behind them, an AWS implementation of that seam, and the symmetric
//! best-effort teardown. Repeated provisioning runs resolve to the same
//! named resources instead of duplicating them.

pub mod address;
pub mod aws;
pub mod config;
pub mod keystore;
pub mod provider;
pub mod provision;
pub mod rules;
pub mod storage;
pub mod teardown;
#[cfg(test)]
pub mod test_helpers;
pub mod test_support;
pub mod transform;

pub use address::{AddressError, AddressSource, IpifyResolver};
pub use aws::AwsProvider;
pub use config::{ConfigError, ProvisionerConfig};
pub use keystore::{KeyStore, KeyStoreError};
pub use provider::{
    CloudProvider, InstanceSnapshot, InstanceState, LaunchSpec, MANAGED_BY_TAG, MANAGED_BY_VALUE,
    ProviderError,
};
pub use provision::{
    ProvisionError, ProvisionRequest, Provisioner, ProvisioningResult, RequestError,
};
pub use rules::{IngressRule, host_cidr, web_server_rules};
pub use storage::{BucketClient, BucketCreation, ObjectStore, StorageError};
pub use teardown::{StepOutcome, StepReport, TeardownReport, TeardownRequest};
pub use transform::{TransformRequest, TransformResponse, handle_transform, output_key_for};
