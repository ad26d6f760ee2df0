//! AWS implementation of the cloud provider seam.
//!
//! Security groups stand in for firewall rule sets and key pairs for SSH
//! credentials; both are the named, idempotent-by-lookup resources the
//! workflow converges on. Every instance launch carries the managed-by
//! marker tag so teardown can find what this tool created.

mod error;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2::types::{
    Filter, InstanceStateName, InstanceType, IpPermission, IpRange, ResourceType, Tag,
    TagSpecification,
};

use crate::provider::{
    CloudProvider, InstanceSnapshot, InstanceState, LaunchSpec, MANAGED_BY_TAG, MANAGED_BY_VALUE,
    ProviderError, ProviderFuture,
};
use crate::rules::IngressRule;

use error::classify;

/// Instance states the managed-instance listing includes; everything except
/// fully terminated, so teardown waits out the shutdown transition before
/// deleting the rule set they reference.
const ACTIVE_STATE_NAMES: &[&str] =
    &["pending", "running", "shutting-down", "stopping", "stopped"];

/// Provider backed by the AWS EC2 API.
#[derive(Clone, Debug)]
pub struct AwsProvider {
    client: aws_sdk_ec2::Client,
}

impl AwsProvider {
    /// Loads SDK configuration for the region (credentials resolve through
    /// the SDK's standard chain) and builds a provider.
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .load()
            .await;
        Self::from_sdk_config(&config)
    }

    /// Builds a provider from an already loaded SDK configuration.
    #[must_use]
    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ec2::Client::new(config),
        }
    }

    fn tag_spec(resource_type: ResourceType, name: &str) -> TagSpecification {
        TagSpecification::builder()
            .resource_type(resource_type)
            .tags(Tag::builder().key("Name").value(name).build())
            .tags(
                Tag::builder()
                    .key(MANAGED_BY_TAG)
                    .value(MANAGED_BY_VALUE)
                    .build(),
            )
            .build()
    }
}

fn instance_state_from(name: &InstanceStateName) -> InstanceState {
    match name {
        InstanceStateName::Pending => InstanceState::Pending,
        InstanceStateName::Running => InstanceState::Running,
        InstanceStateName::ShuttingDown => InstanceState::ShuttingDown,
        InstanceStateName::Terminated => InstanceState::Terminated,
        InstanceStateName::Stopping => InstanceState::Stopping,
        InstanceStateName::Stopped => InstanceState::Stopped,
        other => InstanceState::Other(other.as_str().to_owned()),
    }
}

impl CloudProvider for AwsProvider {
    fn find_firewall_rule_set<'a>(
        &'a self,
        name: &'a str,
    ) -> ProviderFuture<'a, Option<String>> {
        Box::pin(async move {
            let response = self
                .client
                .describe_security_groups()
                .filters(Filter::builder().name("group-name").values(name).build())
                .send()
                .await
                .map_err(|err| classify(&err, "firewall rule set", name))?;

            Ok(response
                .security_groups()
                .first()
                .and_then(|group| group.group_id())
                .map(str::to_owned))
        })
    }

    fn create_firewall_rule_set<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let created = self
                .client
                .create_security_group()
                .group_name(name)
                .description(description)
                .tag_specifications(Self::tag_spec(ResourceType::SecurityGroup, name))
                .send()
                .await
                .map_err(|err| classify(&err, "firewall rule set", name))?;

            created
                .group_id()
                .map(str::to_owned)
                .ok_or_else(|| ProviderError::request("no rule set identifier in response"))
        })
    }

    fn authorize_ingress<'a>(
        &'a self,
        firewall_id: &'a str,
        rules: &'a [IngressRule],
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let mut request = self
                .client
                .authorize_security_group_ingress()
                .group_id(firewall_id);
            for rule in rules {
                request = request.ip_permissions(
                    IpPermission::builder()
                        .ip_protocol(&rule.protocol)
                        .from_port(i32::from(rule.from_port))
                        .to_port(i32::from(rule.to_port))
                        .ip_ranges(IpRange::builder().cidr_ip(&rule.source_cidr).build())
                        .build(),
                );
            }

            request
                .send()
                .await
                .map_err(|err| classify(&err, "firewall rule set", firewall_id))?;
            Ok(())
        })
    }

    fn delete_firewall_rule_set<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .delete_security_group()
                .group_name(name)
                .send()
                .await
                .map_err(|err| classify(&err, "firewall rule set", name))?;
            Ok(())
        })
    }

    fn create_credential<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let created = self
                .client
                .create_key_pair()
                .key_name(name)
                .send()
                .await
                .map_err(|err| classify(&err, "credential", name))?;

            created
                .key_material()
                .map(str::to_owned)
                .ok_or_else(|| ProviderError::request("no key material in response"))
        })
    }

    fn delete_credential<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .delete_key_pair()
                .key_name(name)
                .send()
                .await
                .map_err(|err| classify(&err, "credential", name))?;
            Ok(())
        })
    }

    fn run_instance<'a>(&'a self, spec: &'a LaunchSpec) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let size_class = spec.size_class.parse::<InstanceType>().map_err(|_| {
                ProviderError::request(format!("invalid size class: {}", spec.size_class))
            })?;

            let response = self
                .client
                .run_instances()
                .image_id(&spec.image_id)
                .instance_type(size_class)
                .key_name(&spec.credential_name)
                .security_group_ids(&spec.firewall_id)
                .min_count(1)
                .max_count(1)
                .tag_specifications(Self::tag_spec(ResourceType::Instance, &spec.instance_name))
                .send()
                .await
                .map_err(|err| classify(&err, "instance", &spec.instance_name))?;

            response
                .instances()
                .first()
                .and_then(|instance| instance.instance_id())
                .map(str::to_owned)
                .ok_or_else(|| ProviderError::request("no instance in launch response"))
        })
    }

    fn describe_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, InstanceSnapshot> {
        Box::pin(async move {
            let response = self
                .client
                .describe_instances()
                .instance_ids(instance_id)
                .send()
                .await
                .map_err(|err| classify(&err, "instance", instance_id))?;

            let instance = response
                .reservations()
                .first()
                .and_then(|reservation| reservation.instances().first())
                .ok_or_else(|| ProviderError::not_found("instance", instance_id))?;

            let state = instance
                .state()
                .and_then(aws_sdk_ec2::types::InstanceState::name)
                .map_or(InstanceState::Pending, instance_state_from);

            Ok(InstanceSnapshot {
                id: instance_id.to_owned(),
                state,
                public_address: instance.public_ip_address().map(str::to_owned),
            })
        })
    }

    fn terminate_instance<'a>(&'a self, instance_id: &'a str) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .terminate_instances()
                .instance_ids(instance_id)
                .send()
                .await
                .map_err(|err| classify(&err, "instance", instance_id))?;
            Ok(())
        })
    }

    fn list_managed_instances(&self) -> ProviderFuture<'_, Vec<String>> {
        Box::pin(async move {
            let mut state_filter = Filter::builder().name("instance-state-name");
            for state_name in ACTIVE_STATE_NAMES {
                state_filter = state_filter.values(*state_name);
            }

            let response = self
                .client
                .describe_instances()
                .filters(
                    Filter::builder()
                        .name(format!("tag:{MANAGED_BY_TAG}"))
                        .values(MANAGED_BY_VALUE)
                        .build(),
                )
                .filters(state_filter.build())
                .send()
                .await
                .map_err(|err| classify(&err, "instance", MANAGED_BY_VALUE))?;

            Ok(response
                .reservations()
                .iter()
                .flat_map(aws_sdk_ec2::types::Reservation::instances)
                .filter_map(|instance| instance.instance_id().map(str::to_owned))
                .collect())
        })
    }
}
