//! Provider abstraction for compute resources used by the provisioning
//! workflow.
//!
//! The trait exposes exactly the operations the workflow consumes, so tests
//! can substitute a deterministic fake and the orchestrator never talks to
//! the provider SDK directly.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::rules::IngressRule;

/// Tag key applied to every instance this tool launches so created resources
/// stay identifiable for cleanup and auditing.
pub const MANAGED_BY_TAG: &str = "managed-by";

/// Tag value identifying resources created by this tool.
pub const MANAGED_BY_VALUE: &str = "palisade";

/// Parameters required to launch a new instance. Assembled by the
/// orchestrator once the firewall and credential steps have produced their
/// outputs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchSpec {
    /// Machine size class to request (for example `t2.micro`).
    pub size_class: String,
    /// Boot image identifier.
    pub image_id: String,
    /// Name of the SSH credential to install on the instance.
    pub credential_name: String,
    /// Identifier of the firewall rule set guarding the instance.
    pub firewall_id: String,
    /// Value of the `Name` tag applied at launch.
    pub instance_name: String,
}

/// Lifecycle state reported by the provider for an instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstanceState {
    /// Launch accepted, instance not yet running.
    Pending,
    /// Instance is running; its public address (if any) is assigned.
    Running,
    /// Instance is shutting down ahead of termination.
    ShuttingDown,
    /// Instance has been terminated.
    Terminated,
    /// Instance is stopping.
    Stopping,
    /// Instance is stopped.
    Stopped,
    /// State string this crate does not model.
    Other(String),
}

impl InstanceState {
    /// Returns true for states an instance cannot leave towards `Running`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ShuttingDown | Self::Terminated | Self::Stopping | Self::Stopped
        )
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Other(state) => state.as_str(),
        };
        f.write_str(label)
    }
}

/// Point-in-time view of an instance as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceSnapshot {
    /// Provider-assigned instance identifier.
    pub id: String,
    /// Lifecycle state at the time of the describe call.
    pub state: InstanceState,
    /// Public address, present only once assigned. May legitimately stay
    /// absent when the instance has no public addressing configured.
    pub public_address: Option<String>,
}

/// Errors raised by provider implementations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// Raised when a named resource already exists. For firewall rule sets
    /// the caller converges on the existing resource; for credentials this is
    /// fatal because the key material cannot be retrieved again.
    #[error("{resource} '{name}' already exists")]
    AlreadyExists {
        /// Resource kind (for example `firewall rule set`).
        resource: String,
        /// Human-chosen resource name.
        name: String,
    },
    /// Raised when a named resource does not exist. Deletion paths treat
    /// this as already-absent success.
    #[error("{resource} '{name}' not found")]
    NotFound {
        /// Resource kind.
        resource: String,
        /// Resource name or identifier.
        name: String,
    },
    /// Wrapper for any other provider API failure.
    #[error("provider request failed: {message}")]
    Request {
        /// Message returned by the provider SDK.
        message: String,
    },
}

impl ProviderError {
    /// Convenience constructor for [`ProviderError::AlreadyExists`].
    #[must_use]
    pub fn already_exists(resource: &str, name: &str) -> Self {
        Self::AlreadyExists {
            resource: resource.to_owned(),
            name: name.to_owned(),
        }
    }

    /// Convenience constructor for [`ProviderError::NotFound`].
    #[must_use]
    pub fn not_found(resource: &str, name: &str) -> Self {
        Self::NotFound {
            resource: resource.to_owned(),
            name: name.to_owned(),
        }
    }

    /// Convenience constructor for [`ProviderError::Request`].
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Interface implemented by cloud compute providers.
///
/// All identifiers the provider assigns are opaque strings; the provider is
/// the sole source of truth for resource state.
pub trait CloudProvider {
    /// Looks up a firewall rule set by name, returning its identifier when
    /// one exists.
    fn find_firewall_rule_set<'a>(&'a self, name: &'a str)
    -> ProviderFuture<'a, Option<String>>;

    /// Creates an empty firewall rule set and returns its identifier.
    ///
    /// A concurrent creator may win the check-then-create race; the provider
    /// reports that as [`ProviderError::AlreadyExists`].
    fn create_firewall_rule_set<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> ProviderFuture<'a, String>;

    /// Appends ingress rules to an existing firewall rule set.
    fn authorize_ingress<'a>(
        &'a self,
        firewall_id: &'a str,
        rules: &'a [IngressRule],
    ) -> ProviderFuture<'a, ()>;

    /// Deletes a firewall rule set by name.
    fn delete_firewall_rule_set<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, ()>;

    /// Creates an SSH credential and returns the private key material.
    ///
    /// The material is returned exactly once; the provider retains only the
    /// public half. An existing credential with the same name is reported as
    /// [`ProviderError::AlreadyExists`], never silently overwritten.
    fn create_credential<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, String>;

    /// Deletes an SSH credential by name.
    fn delete_credential<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, ()>;

    /// Submits exactly one instance launch and returns the assigned
    /// instance identifier.
    fn run_instance<'a>(&'a self, spec: &'a LaunchSpec) -> ProviderFuture<'a, String>;

    /// Reads back the current state of an instance.
    fn describe_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, InstanceSnapshot>;

    /// Requests termination of an instance.
    fn terminate_instance<'a>(&'a self, instance_id: &'a str) -> ProviderFuture<'a, ()>;

    /// Lists non-terminated instances carrying this tool's managed-by
    /// marker tag.
    fn list_managed_instances(&self) -> ProviderFuture<'_, Vec<String>>;
}
