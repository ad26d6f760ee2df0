//! Shared fixtures for workflow integration tests.

use std::net::Ipv4Addr;
use std::time::Duration;

use camino::Utf8PathBuf;
use palisade::test_support::{FakeAddressSource, FakeProvider};
use palisade::{KeyStore, ProvisionRequest, Provisioner};

/// Caller address used across scenarios.
pub const CALLER_ADDRESS: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 5);

/// A provisioner wired to fakes, with handles kept for assertions.
pub struct Fixture {
    /// Shared handle onto the provider the provisioner talks to.
    pub provider: FakeProvider,
    /// Provisioner under test, with fast timings.
    pub provisioner: Provisioner<FakeProvider, FakeAddressSource>,
    /// Directory key material lands in.
    pub key_dir: Utf8PathBuf,
    _scratch: tempfile::TempDir,
}

/// Builds a fixture resolving the fixed caller address.
pub fn fixture() -> Fixture {
    fixture_with_address(FakeAddressSource::fixed(CALLER_ADDRESS))
}

/// Builds a fixture with a custom address source.
pub fn fixture_with_address(address_source: FakeAddressSource) -> Fixture {
    let scratch = tempfile::tempdir().expect("create temp dir");
    let key_dir =
        Utf8PathBuf::from_path_buf(scratch.path().join("keys")).expect("utf-8 temp path");
    let provider = FakeProvider::new();
    let provisioner = Provisioner::new(
        provider.clone(),
        address_source,
        KeyStore::new(key_dir.clone()),
    )
    .with_poll_interval(Duration::from_millis(1))
    .with_wait_timeout(Duration::from_millis(250));

    Fixture {
        provider,
        provisioner,
        key_dir,
        _scratch: scratch,
    }
}

/// Builds a valid provisioning request for the named resources.
pub fn request(firewall_name: &str, credential_name: &str) -> ProvisionRequest {
    ProvisionRequest::builder()
        .firewall_name(firewall_name)
        .firewall_description("Web server with SSH, HTTP, HTTPS")
        .credential_name(credential_name)
        .size_class("t2.micro")
        .image_id("ami-0abcdef1234567890")
        .instance_name("web-server")
        .build()
        .expect("request should be valid")
}
