//! Tests for the bounded instance readiness wait.

#[path = "common/fixtures.rs"]
mod fixtures;

use fixtures::fixture;
use palisade::{InstanceState, LaunchSpec, ProvisionError};

fn spec() -> LaunchSpec {
    LaunchSpec {
        size_class: String::from("t2.micro"),
        image_id: String::from("ami-0abcdef1234567890"),
        credential_name: String::from("test-key"),
        firewall_id: String::from("fw-0001"),
        instance_name: String::from("web-server"),
    }
}

#[tokio::test]
async fn wait_returns_after_the_transition_poll() {
    let fx = fixture();
    for _ in 0..4 {
        fx.provider.push_instance_state(InstanceState::Pending, None);
    }
    fx.provider
        .push_instance_state(InstanceState::Running, Some("198.51.100.9"));

    let (instance_id, address) = fx
        .provisioner
        .launch_instance(&spec())
        .await
        .expect("instance should become ready");

    assert_eq!(instance_id, "i-abc123");
    assert_eq!(address.map(|ip| ip.to_string()), Some(String::from("198.51.100.9")));
    assert_eq!(fx.provider.describe_calls(), 5, "one describe per poll");
}

#[tokio::test]
async fn wait_times_out_when_instance_never_runs() {
    let fx = fixture();

    let error = fx
        .provisioner
        .launch_instance(&spec())
        .await
        .expect_err("a forever-pending instance should time out");

    assert!(
        matches!(
            error,
            ProvisionError::LaunchTimeout { ref instance_id, .. } if instance_id == "i-abc123"
        ),
        "unexpected error: {error:?}"
    );
}

#[tokio::test]
async fn terminal_state_is_a_launch_failure() {
    let fx = fixture();
    fx.provider.push_instance_state(InstanceState::Pending, None);
    fx.provider
        .push_instance_state(InstanceState::Terminated, None);

    let error = fx
        .provisioner
        .launch_instance(&spec())
        .await
        .expect_err("termination before running should fail");

    assert!(
        matches!(
            error,
            ProvisionError::LaunchFailed { ref state, .. } if *state == InstanceState::Terminated
        ),
        "unexpected error: {error:?}"
    );
}

#[tokio::test]
async fn running_without_public_address_is_a_valid_success() {
    let fx = fixture();
    fx.provider.push_instance_state(InstanceState::Running, None);

    let (instance_id, address) = fx
        .provisioner
        .launch_instance(&spec())
        .await
        .expect("running without an address is success");

    assert_eq!(instance_id, "i-abc123");
    assert!(address.is_none());
}
