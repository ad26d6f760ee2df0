//! Best-effort teardown of resources created by provisioning.
//!
//! Teardown mirrors creation in reverse: marker-tagged instances first
//! (waiting, bounded, for them to disappear so the rule set is deletable),
//! then the credential, its local key file, and the firewall rule set.
//! Every step is attempted even when an earlier one fails; absence of a
//! resource is success, so a second teardown run is clean.

use std::time::Instant;

use tokio::time::sleep;

use crate::address::AddressSource;
use crate::provider::{CloudProvider, ProviderError};
use crate::provision::Provisioner;

/// Inputs for a teardown run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TeardownRequest {
    /// Name of the firewall rule set to delete.
    pub firewall_name: String,
    /// Name of the SSH credential to delete.
    pub credential_name: String,
}

/// Result of one teardown step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    /// The resource existed and was removed.
    Removed,
    /// The resource was already absent; counted as success.
    AlreadyAbsent,
    /// The step failed; remaining steps were still attempted.
    Failed {
        /// Human-readable description of the failure.
        message: String,
    },
}

impl StepOutcome {
    /// Returns true unless the step failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Removed => f.write_str("removed"),
            Self::AlreadyAbsent => f.write_str("already absent"),
            Self::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

/// Outcome of a single teardown step, named after the resource it covers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StepReport {
    /// Resource the step operated on.
    pub resource: String,
    /// What happened to it.
    pub outcome: StepOutcome,
}

/// Aggregate outcome of a teardown run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TeardownReport {
    /// Per-step outcomes in execution order.
    pub steps: Vec<StepReport>,
}

impl TeardownReport {
    /// Returns true when every step succeeded or found nothing to delete.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|step| step.outcome.is_success())
    }
}

fn deletion_outcome(result: Result<(), ProviderError>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::Removed,
        Err(ProviderError::NotFound { .. }) => StepOutcome::AlreadyAbsent,
        Err(err) => StepOutcome::Failed {
            message: err.to_string(),
        },
    }
}

impl<P, A> Provisioner<P, A>
where
    P: CloudProvider,
    A: AddressSource,
{
    /// Removes everything a provisioning run created, best-effort.
    ///
    /// Each deletion is independent: a failure is recorded in the report and
    /// the remaining steps still run. The report lists every step so the
    /// operator can see exactly what remains.
    pub async fn teardown(&self, request: &TeardownRequest) -> TeardownReport {
        let mut report = TeardownReport::default();

        report.steps.push(StepReport {
            resource: String::from("managed instances"),
            outcome: self.sweep_instances().await,
        });

        report.steps.push(StepReport {
            resource: format!("credential '{}'", request.credential_name),
            outcome: deletion_outcome(
                self.provider
                    .delete_credential(&request.credential_name)
                    .await,
            ),
        });

        report.steps.push(StepReport {
            resource: format!(
                "key file '{}'",
                self.keystore.key_path(&request.credential_name)
            ),
            outcome: match self.keystore.remove(&request.credential_name) {
                Ok(true) => StepOutcome::Removed,
                Ok(false) => StepOutcome::AlreadyAbsent,
                Err(err) => StepOutcome::Failed {
                    message: err.to_string(),
                },
            },
        });

        report.steps.push(StepReport {
            resource: format!("firewall rule set '{}'", request.firewall_name),
            outcome: deletion_outcome(
                self.provider
                    .delete_firewall_rule_set(&request.firewall_name)
                    .await,
            ),
        });

        report
    }

    /// Terminates every marker-tagged instance and waits, bounded, for the
    /// provider to stop listing them. The wait matters: the firewall rule
    /// set cannot be deleted while an instance still references it.
    async fn sweep_instances(&self) -> StepOutcome {
        let instance_ids = match self.provider.list_managed_instances().await {
            Ok(ids) => ids,
            Err(err) => {
                return StepOutcome::Failed {
                    message: err.to_string(),
                };
            }
        };

        if instance_ids.is_empty() {
            return StepOutcome::AlreadyAbsent;
        }

        let mut failures = Vec::new();
        for instance_id in &instance_ids {
            match self.provider.terminate_instance(instance_id).await {
                Ok(()) | Err(ProviderError::NotFound { .. }) => {}
                Err(err) => failures.push(format!("{instance_id}: {err}")),
            }
        }
        if !failures.is_empty() {
            return StepOutcome::Failed {
                message: failures.join("; "),
            };
        }

        let deadline = Instant::now() + self.wait_timeout;
        while Instant::now() <= deadline {
            match self.provider.list_managed_instances().await {
                Ok(remaining) if remaining.is_empty() => return StepOutcome::Removed,
                Ok(_) => sleep(self.poll_interval).await,
                Err(err) => {
                    return StepOutcome::Failed {
                        message: err.to_string(),
                    };
                }
            }
        }

        StepOutcome::Failed {
            message: format!(
                "instances still present {}s after termination",
                self.wait_timeout.as_secs()
            ),
        }
    }
}
