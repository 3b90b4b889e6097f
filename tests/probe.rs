mod common;

use common::{MockRemote, auth_failed, refused};
use kamal_provision::ProvisionError;
use kamal_provision::probe::{self, Attempt, Candidate};

fn pairs(candidates: &[Candidate]) -> Vec<(&str, u16)> {
    candidates
        .iter()
        .map(|c| (c.user.as_str(), c.port))
        .collect()
}

#[test]
fn candidates_with_custom_port() {
    assert_eq!(
        pairs(&probe::candidates("deploy", 2222)),
        vec![
            ("deploy", 2222),
            ("deploy", 22),
            ("root", 2222),
            ("root", 22)
        ]
    );
}

#[test]
fn candidates_with_default_port() {
    assert_eq!(
        pairs(&probe::candidates("deploy", 22)),
        vec![("deploy", 22), ("root", 22)]
    );
}

#[test]
fn candidates_for_root_target_are_deduplicated() {
    assert_eq!(
        pairs(&probe::candidates("root", 2222)),
        vec![("root", 2222), ("root", 22)]
    );
}

#[test]
fn first_candidate_wins() {
    let remote = MockRemote::ok();
    let conn = probe::establish(&remote, "web1", "deploy", 2222).unwrap();

    assert_eq!(conn.user, "deploy");
    assert_eq!(conn.port, 2222);
    assert_eq!(remote.commands(), vec!["true"]);
}

#[test]
fn falls_back_through_candidates() {
    let remote = MockRemote::new(|conn, _| {
        if conn.user == "root" && conn.port == 22 {
            Ok(String::new())
        } else if conn.port == 2222 {
            Err(refused(conn))
        } else {
            Err(auth_failed(conn))
        }
    });

    let conn = probe::establish(&remote, "web1", "deploy", 2222).unwrap();

    assert_eq!(conn.to_string(), "root@web1:22");
    assert_eq!(
        remote.connections(),
        vec![
            "deploy@web1:2222",
            "deploy@web1:22",
            "root@web1:2222",
            "root@web1:22"
        ]
    );
}

#[test]
fn exhausted_candidates_fail_with_all_attempts() {
    let remote = MockRemote::new(|conn, _| Err(auth_failed(conn)));

    let err = probe::establish(&remote, "web1", "deploy", 2222).unwrap_err();

    match &err {
        ProvisionError::ConnectionFailed { host, attempts } => {
            assert_eq!(host, "web1");
            assert_eq!(
                attempts,
                &[
                    "deploy@web1:2222",
                    "deploy@web1:22",
                    "root@web1:2222",
                    "root@web1:22"
                ]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("root@web1:22"));
}

#[test]
fn unrelated_error_stops_immediately() {
    let remote = MockRemote::new(|conn, _| {
        Err(ProvisionError::Unreachable {
            destination: conn.to_string(),
            detail: "Could not resolve hostname web1".into(),
        })
    });

    let err = probe::establish(&remote, "web1", "deploy", 2222).unwrap_err();

    assert!(matches!(err, ProvisionError::Unreachable { .. }));
    assert_eq!(remote.call_count(), 1);
}

#[test]
fn unrelated_error_after_retryable_stops() {
    let remote = MockRemote::new(|conn, cmd| {
        if conn.port == 2222 {
            Err(auth_failed(conn))
        } else {
            Err(common::command_failed(conn, cmd))
        }
    });

    let err = probe::establish(&remote, "web1", "deploy", 2222).unwrap_err();

    assert!(matches!(err, ProvisionError::RemoteCommand { .. }));
    assert_eq!(remote.connections(), vec!["deploy@web1:2222", "deploy@web1:22"]);
}

#[test]
fn attempt_classifies_outcomes() {
    let ok = MockRemote::ok();
    assert!(matches!(
        probe::attempt(&ok, "h", &Candidate::new("deploy", 22)),
        Attempt::Connected(_)
    ));

    let denied = MockRemote::new(|conn, _| Err(auth_failed(conn)));
    assert!(matches!(
        probe::attempt(&denied, "h", &Candidate::new("deploy", 22)),
        Attempt::Retryable(_)
    ));

    let broken = MockRemote::new(|_, _| Err(ProvisionError::CommandNotFound("ssh".into())));
    assert!(matches!(
        probe::attempt(&broken, "h", &Candidate::new("deploy", 22)),
        Attempt::Fatal(_)
    ));
}
