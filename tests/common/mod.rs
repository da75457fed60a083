#![allow(dead_code)]

pub use shipyard_test_utils::{
    ConfigFileBuilder, FakeRemote, FakeRepository, LocalSession, ScriptedRunner, SimulatedHost,
    init_tracing,
};

use shipyard::config::ConfigFile;
use shipyard::deploy::Deployer;
use shipyard::release::ReleaseId;

pub const RELEASE: &str = "release-20250101120000-abcd123";
pub const COMMIT: &str = "abcd1234567890abcd1234567890abcd12345678";

pub fn release_id() -> ReleaseId {
    RELEASE.parse().expect("fixture identifier parses")
}

/// A remote that already carries the fixture release.
pub fn remote_with_release() -> FakeRemote {
    let remote = FakeRemote::new();
    remote.publish(RELEASE, COMMIT);
    remote
}

/// bob@10.0.0.5 with the fixture release published, and a deployer for it.
pub fn deploy_fixture(cfg: ConfigFile) -> (SimulatedHost, Deployer<SimulatedHost>) {
    let host = SimulatedHost::new("bob", "10.0.0.5", &cfg, remote_with_release());
    let deployer = Deployer::new(host.clone(), cfg);
    (host, deployer)
}
