//! Orchestrates the end-to-end provisioning workflow.
//!
//! The workflow resolves the caller's public address, converges the firewall
//! rule set and SSH credential by name, launches a single tagged instance,
//! and blocks (bounded poll) until the provider reports it running. Each
//! step's output is required input to the next; the run aborts on the first
//! failure with an error naming the step.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use thiserror::Error;
use tokio::time::sleep;

use crate::address::{AddressError, AddressSource};
use crate::keystore::{KeyStore, KeyStoreError};
use crate::provider::{CloudProvider, InstanceSnapshot, InstanceState, LaunchSpec, ProviderError};
use crate::rules::web_server_rules;

/// Delay between instance state polls.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Overall bound on the instance readiness wait.
const WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors raised while validating a provisioning request.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Inputs for a full provisioning run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionRequest {
    /// Human-chosen firewall rule set name, unique per account/region.
    pub firewall_name: String,
    /// Description recorded on the firewall rule set at creation.
    pub firewall_description: String,
    /// Human-chosen SSH credential name.
    pub credential_name: String,
    /// Machine size class for the instance.
    pub size_class: String,
    /// Boot image identifier for the instance.
    pub image_id: String,
    /// `Name` tag applied to the launched instance.
    pub instance_name: String,
}

impl ProvisionRequest {
    /// Starts a builder for a [`ProvisionRequest`].
    #[must_use]
    pub fn builder() -> ProvisionRequestBuilder {
        ProvisionRequestBuilder::new()
    }

    /// Validates the request, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when any field is empty.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.firewall_name.is_empty() {
            return Err(RequestError::Validation("firewall_name".to_owned()));
        }
        if self.firewall_description.is_empty() {
            return Err(RequestError::Validation("firewall_description".to_owned()));
        }
        if self.credential_name.is_empty() {
            return Err(RequestError::Validation("credential_name".to_owned()));
        }
        if self.size_class.is_empty() {
            return Err(RequestError::Validation("size_class".to_owned()));
        }
        if self.image_id.is_empty() {
            return Err(RequestError::Validation("image_id".to_owned()));
        }
        if self.instance_name.is_empty() {
            return Err(RequestError::Validation("instance_name".to_owned()));
        }
        Ok(())
    }
}

/// Builder for [`ProvisionRequest`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisionRequestBuilder {
    firewall_name: String,
    firewall_description: String,
    credential_name: String,
    size_class: String,
    image_id: String,
    instance_name: String,
}

impl ProvisionRequestBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the firewall rule set name.
    #[must_use]
    pub fn firewall_name(mut self, value: impl Into<String>) -> Self {
        self.firewall_name = value.into();
        self
    }

    /// Sets the firewall rule set description.
    #[must_use]
    pub fn firewall_description(mut self, value: impl Into<String>) -> Self {
        self.firewall_description = value.into();
        self
    }

    /// Sets the SSH credential name.
    #[must_use]
    pub fn credential_name(mut self, value: impl Into<String>) -> Self {
        self.credential_name = value.into();
        self
    }

    /// Sets the machine size class.
    #[must_use]
    pub fn size_class(mut self, value: impl Into<String>) -> Self {
        self.size_class = value.into();
        self
    }

    /// Sets the boot image identifier.
    #[must_use]
    pub fn image_id(mut self, value: impl Into<String>) -> Self {
        self.image_id = value.into();
        self
    }

    /// Sets the `Name` tag for the launched instance.
    #[must_use]
    pub fn instance_name(mut self, value: impl Into<String>) -> Self {
        self.instance_name = value.into();
        self
    }

    /// Builds and validates the [`ProvisionRequest`], trimming string
    /// inputs.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when any required field is empty.
    pub fn build(self) -> Result<ProvisionRequest, RequestError> {
        let request = ProvisionRequest {
            firewall_name: self.firewall_name.trim().to_owned(),
            firewall_description: self.firewall_description.trim().to_owned(),
            credential_name: self.credential_name.trim().to_owned(),
            size_class: self.size_class.trim().to_owned(),
            image_id: self.image_id.trim().to_owned(),
            instance_name: self.instance_name.trim().to_owned(),
        };
        request.validate()?;
        Ok(request)
    }
}

/// Terminal output of a successful provisioning run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisioningResult {
    /// Provider-assigned instance identifier.
    pub instance_id: String,
    /// Public address assigned to the instance. Absent when the instance
    /// has no public addressing configured; that is a valid success.
    pub public_address: Option<Ipv4Addr>,
    /// Local path holding the credential's private key material.
    pub key_path: Utf8PathBuf,
}

/// Errors surfaced while provisioning, one variant per workflow step.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Raised when caller address discovery fails. Nothing has been
    /// touched; proceeding would scope the SSH rule to a stale or absent
    /// source.
    #[error("caller address discovery failed: {0}")]
    NetworkUnavailable(#[source] AddressError),
    /// Raised when the request fails validation.
    #[error("invalid provisioning request: {0}")]
    Request(#[from] RequestError),
    /// Raised when the firewall rule set step fails at the provider.
    #[error("firewall rule set step failed: {0}")]
    Firewall(#[source] ProviderError),
    /// Raised when the rule set was created but its ingress rules were not.
    /// The partially created rule set is named so the operator can tear it
    /// down rather than retry blindly.
    #[error(
        "firewall rule set '{name}' ({firewall_id}) was created but adding \
         ingress rules failed: {source}"
    )]
    PartiallyCreatedResource {
        /// Name of the partially created rule set.
        name: String,
        /// Provider-assigned identifier of the partially created rule set.
        firewall_id: String,
        /// Provider error raised while appending rules.
        #[source]
        source: ProviderError,
    },
    /// Raised when a credential with this name already exists. Its private
    /// key material was returned once at creation and cannot be retrieved
    /// again, so reuse is never silent.
    #[error(
        "credential '{name}' already exists and its key material cannot be \
         retrieved; tear it down or choose another name"
    )]
    CredentialNotRetrievable {
        /// Name of the existing credential.
        name: String,
    },
    /// Raised when the credential step fails at the provider.
    #[error("credential step failed: {0}")]
    Credential(#[source] ProviderError),
    /// Raised when key material cannot be persisted locally.
    #[error("failed to persist key material: {0}")]
    KeyStore(#[from] KeyStoreError),
    /// Raised when the launch submission or a state read fails.
    #[error("instance launch failed: {0}")]
    Launch(#[source] ProviderError),
    /// Raised when the instance does not reach running within the bound.
    /// The instance may still exist in a non-running state.
    #[error("instance {instance_id} did not reach running within {waited_secs}s")]
    LaunchTimeout {
        /// Identifier of the instance still pending at the deadline.
        instance_id: String,
        /// Configured bound that was exceeded, in seconds.
        waited_secs: u64,
    },
    /// Raised when the provider reports a terminal state before running.
    #[error("instance {instance_id} entered terminal state '{state}' before running")]
    LaunchFailed {
        /// Identifier of the failed instance.
        instance_id: String,
        /// Terminal state the provider reported.
        state: InstanceState,
    },
}

/// Executes the provisioning workflow against an injected provider.
#[derive(Debug)]
pub struct Provisioner<P, A> {
    pub(crate) provider: P,
    pub(crate) address_source: A,
    pub(crate) keystore: KeyStore,
    pub(crate) poll_interval: Duration,
    pub(crate) wait_timeout: Duration,
}

impl<P, A> Provisioner<P, A>
where
    P: CloudProvider,
    A: AddressSource,
{
    /// Creates a provisioner with the default poll interval and wait bound.
    #[must_use]
    pub const fn new(provider: P, address_source: A, keystore: KeyStore) -> Self {
        Self {
            provider,
            address_source,
            keystore,
            poll_interval: POLL_INTERVAL,
            wait_timeout: WAIT_TIMEOUT,
        }
    }

    /// Overrides the instance state poll interval.
    ///
    /// This is primarily used by tests to keep timing scenarios fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the overall readiness wait bound.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Runs the full workflow and returns the connection details.
    ///
    /// Steps run strictly in order: address discovery, firewall rule set
    /// convergence, credential creation with local key persistence, launch,
    /// readiness wait. Repeated invocations converge on the same named
    /// resources instead of duplicating them.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] naming the step that failed; the workflow
    /// aborts on the first failure.
    pub async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisioningResult, ProvisionError> {
        request.validate()?;

        let caller_address = self
            .address_source
            .resolve()
            .await
            .map_err(ProvisionError::NetworkUnavailable)?;

        let firewall_id = self
            .ensure_firewall_rule_set(
                &request.firewall_name,
                &request.firewall_description,
                caller_address,
            )
            .await?;

        let key_path = self.ensure_ssh_credential(&request.credential_name).await?;

        let spec = LaunchSpec {
            size_class: request.size_class.clone(),
            image_id: request.image_id.clone(),
            credential_name: request.credential_name.clone(),
            firewall_id,
            instance_name: request.instance_name.clone(),
        };
        let (instance_id, public_address) = self.launch_instance(&spec).await?;

        Ok(ProvisioningResult {
            instance_id,
            public_address,
            key_path,
        })
    }

    /// Resolves or creates the named firewall rule set and returns its id.
    ///
    /// An existing rule set is returned unchanged; its rules are not
    /// re-applied, so drift from a changed caller address requires explicit
    /// teardown and re-provisioning. On creation, exactly three ingress
    /// rules are appended: SSH scoped to the caller's `/32`, HTTP and HTTPS
    /// open to all sources. A creation rejected as already-existing means a
    /// concurrent run won the check-then-create race; that converges on the
    /// winner's rule set.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Firewall`] on provider failures and
    /// [`ProvisionError::PartiallyCreatedResource`] when the rule set was
    /// created but appending its rules failed.
    pub async fn ensure_firewall_rule_set(
        &self,
        name: &str,
        description: &str,
        caller_address: Ipv4Addr,
    ) -> Result<String, ProvisionError> {
        if let Some(existing) = self
            .provider
            .find_firewall_rule_set(name)
            .await
            .map_err(ProvisionError::Firewall)?
        {
            return Ok(existing);
        }

        let firewall_id = match self.provider.create_firewall_rule_set(name, description).await {
            Ok(id) => id,
            Err(ProviderError::AlreadyExists { .. }) => {
                return self
                    .provider
                    .find_firewall_rule_set(name)
                    .await
                    .map_err(ProvisionError::Firewall)?
                    .ok_or_else(|| {
                        ProvisionError::Firewall(ProviderError::not_found(
                            "firewall rule set",
                            name,
                        ))
                    });
            }
            Err(err) => return Err(ProvisionError::Firewall(err)),
        };

        let rules = web_server_rules(caller_address);
        if let Err(err) = self.provider.authorize_ingress(&firewall_id, &rules).await {
            return Err(ProvisionError::PartiallyCreatedResource {
                name: name.to_owned(),
                firewall_id,
                source: err,
            });
        }

        Ok(firewall_id)
    }

    /// Creates the named SSH credential and persists its one-time key
    /// material, returning the stored path.
    ///
    /// An existing same-named credential is an error, never a silent reuse:
    /// the provider does not retain the private half, so a reused
    /// credential would be unusable.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::CredentialNotRetrievable`] when the name is
    /// taken, [`ProvisionError::Credential`] on other provider failures, and
    /// [`ProvisionError::KeyStore`] when the material cannot be persisted.
    pub async fn ensure_ssh_credential(
        &self,
        name: &str,
    ) -> Result<Utf8PathBuf, ProvisionError> {
        let material = match self.provider.create_credential(name).await {
            Ok(material) => material,
            Err(ProviderError::AlreadyExists { .. }) => {
                return Err(ProvisionError::CredentialNotRetrievable {
                    name: name.to_owned(),
                });
            }
            Err(err) => return Err(ProvisionError::Credential(err)),
        };

        let key_path = self.keystore.save(name, &material)?;
        Ok(key_path)
    }

    /// Submits a single instance launch and polls until the provider
    /// reports it running, within the configured bound.
    ///
    /// The first running snapshot decides the outcome: its public address
    /// is returned as-is, and an absent address is a valid success (no
    /// public addressing configured), not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Launch`] on submission or describe
    /// failures, [`ProvisionError::LaunchFailed`] when the instance reaches
    /// a terminal state first, and [`ProvisionError::LaunchTimeout`] at the
    /// configured bound.
    pub async fn launch_instance(
        &self,
        spec: &LaunchSpec,
    ) -> Result<(String, Option<Ipv4Addr>), ProvisionError> {
        let instance_id = self
            .provider
            .run_instance(spec)
            .await
            .map_err(ProvisionError::Launch)?;

        let deadline = Instant::now() + self.wait_timeout;
        while Instant::now() <= deadline {
            let InstanceSnapshot {
                state,
                public_address,
                ..
            } = self
                .provider
                .describe_instance(&instance_id)
                .await
                .map_err(ProvisionError::Launch)?;

            if state == InstanceState::Running {
                let address = public_address
                    .as_deref()
                    .and_then(|ip| ip.parse::<Ipv4Addr>().ok());
                return Ok((instance_id, address));
            }

            if state.is_terminal() {
                return Err(ProvisionError::LaunchFailed { instance_id, state });
            }

            sleep(self.poll_interval).await;
        }

        Err(ProvisionError::LaunchTimeout {
            instance_id,
            waited_secs: self.wait_timeout.as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_empty_fields() {
        let error = ProvisionRequest::builder()
            .build()
            .expect_err("validation should fail");
        assert_eq!(error, RequestError::Validation(String::from("firewall_name")));
    }

    #[test]
    fn build_trims_whitespace() {
        let request = ProvisionRequest::builder()
            .firewall_name("  web-server-sg  ")
            .firewall_description("Web server with SSH, HTTP, HTTPS")
            .credential_name("web-server-key")
            .size_class("t2.micro")
            .image_id("ami-0abcdef1234567890")
            .instance_name("web-server")
            .build()
            .expect("request should be valid");
        assert_eq!(request.firewall_name, "web-server-sg");
    }

    #[test]
    fn validate_rejects_each_missing_field() {
        let base = ProvisionRequest::builder()
            .firewall_name("web-server-sg")
            .firewall_description("Web server with SSH, HTTP, HTTPS")
            .credential_name("web-server-key")
            .size_class("t2.micro")
            .image_id("ami-0abcdef1234567890")
            .instance_name("web-server")
            .build()
            .expect("baseline request should be valid");

        let cases = [
            (
                "firewall_description",
                ProvisionRequest {
                    firewall_description: String::new(),
                    ..base.clone()
                },
            ),
            (
                "credential_name",
                ProvisionRequest {
                    credential_name: String::new(),
                    ..base.clone()
                },
            ),
            (
                "size_class",
                ProvisionRequest {
                    size_class: String::new(),
                    ..base.clone()
                },
            ),
            (
                "image_id",
                ProvisionRequest {
                    image_id: String::new(),
                    ..base.clone()
                },
            ),
            (
                "instance_name",
                ProvisionRequest {
                    instance_name: String::new(),
                    ..base.clone()
                },
            ),
        ];

        for (field, request) in cases {
            let error = request.validate().expect_err("field should be required");
            assert_eq!(error, RequestError::Validation(field.to_owned()));
        }
    }
}
