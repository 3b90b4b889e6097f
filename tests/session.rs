mod common;

use common::{MockRemote, auth_failed};
use kamal_provision::provisioner::{ProvisioningOutcome, SkipReason, Stage};
use kamal_provision::session::{self, Session};
use kamal_provision::{DeployConfig, ProvisionConfig, ProvisionError};

fn config(yaml: &str) -> ProvisionConfig {
    ProvisionConfig::new(DeployConfig::from_yaml(yaml).unwrap()).unwrap()
}

#[test]
fn root_user_skips_everything() {
    let config = config(
        "servers:\n  - 10.0.0.1\n  - 10.0.0.2\n\
         ssh:\n  user: root\n\
         x-provision:\n  key_data:\n    - ssh-ed25519 AAAA\n",
    );
    let remote = MockRemote::ok();

    let outcomes = Session::new(&config, &remote).run().unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        outcomes[0],
        ProvisioningOutcome::Skipped(SkipReason::RootUser)
    ));
    assert_eq!(remote.call_count(), 0);
    assert!(!session::any_failed(&outcomes));
}

#[test]
fn default_user_is_root() {
    let config = config("servers:\n  - 10.0.0.1\n");
    let remote = MockRemote::ok();

    let outcomes = Session::new(&config, &remote).run().unwrap();

    assert!(matches!(outcomes[..], [ProvisioningOutcome::Skipped(_)]));
    assert_eq!(remote.call_count(), 0);
}

#[test]
fn every_host_is_provisioned_in_order() {
    let config = config(
        "servers:\n  web:\n    - 10.0.0.1\n  job:\n    hosts:\n      - 10.0.0.2\n\
         ssh:\n  user: deploy\n\
         x-provision:\n  key_data:\n    - ssh-ed25519 AAAA\n",
    );
    let remote = MockRemote::ok();

    let outcomes = Session::new(&config, &remote).run().unwrap();

    let hosts: Vec<_> = outcomes.iter().filter_map(ProvisioningOutcome::host).collect();
    assert_eq!(hosts, vec!["10.0.0.1", "10.0.0.2"]);
    assert!(!session::any_failed(&outcomes));
}

#[test]
fn failed_host_does_not_stop_the_rest() {
    let config = config(
        "servers:\n  - bad.example.com\n  - good.example.com\n\
         ssh:\n  user: deploy\n  port: 2222\n\
         x-provision:\n  key_data:\n    - ssh-ed25519 AAAA\n",
    );
    let remote = MockRemote::new(|conn, _| {
        if conn.host == "bad.example.com" {
            Err(auth_failed(conn))
        } else {
            Ok(String::new())
        }
    });

    let outcomes = Session::new(&config, &remote).run().unwrap();

    assert_eq!(outcomes.len(), 2);
    match &outcomes[0] {
        ProvisioningOutcome::Failed { host, failure } => {
            assert_eq!(host, "bad.example.com");
            assert_eq!(failure.stage, Stage::Connection);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(matches!(
        &outcomes[1],
        ProvisioningOutcome::Provisioned { host, .. } if host == "good.example.com"
    ));
    assert!(session::any_failed(&outcomes));
}

#[test]
fn missing_key_file_aborts_before_contacting_hosts() {
    let config = config(
        "servers:\n  - 10.0.0.1\n\
         ssh:\n  user: deploy\n\
         x-provision:\n  keys:\n    - /nonexistent/key.pub\n",
    );
    let remote = MockRemote::ok();

    let result = Session::new(&config, &remote).run();

    assert!(matches!(result, Err(ProvisionError::KeyFileNotFound(ref p)) if p == "/nonexistent/key.pub"));
    assert_eq!(remote.call_count(), 0);
}

#[test]
fn configured_port_is_tried_first() {
    let config = config(
        "servers:\n  - 10.0.0.1\n\
         ssh:\n  user: deploy\n  port: 2222\n\
         x-provision:\n  key_data:\n    - ssh-ed25519 AAAA\n",
    );
    let remote = MockRemote::ok();

    Session::new(&config, &remote).run().unwrap();

    assert_eq!(remote.connections()[0], "deploy@10.0.0.1:2222");
}
