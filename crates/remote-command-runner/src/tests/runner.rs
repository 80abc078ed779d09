//! CommandRunner behavior across a small fleet.

use super::harness::{ids, runner, Behavior, FakeFleet};
use crate::error::CommandError;
use crate::runner::{RunnerOptions, UnexpectedErrorPolicy};
use crate::types::CommandSpec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn spec() -> CommandSpec {
    CommandSpec::shell(["cat /etc/centos-release"])
}

fn denied() -> Behavior {
    Behavior::Rejects(CommandError::service("AccessDeniedException", "denied"))
}

fn options(concurrency: usize, policy: UnexpectedErrorPolicy) -> RunnerOptions {
    RunnerOptions {
        concurrency,
        on_unexpected_error: policy,
    }
}

#[tokio::test(start_paused = true)]
async fn every_instance_gets_a_result_string() {
    let fleet = Arc::new(
        FakeFleet::new()
            .instance("i-1", Behavior::prints("CentOS Linux release 7.9.2009 (Core)\n"))
            .instance(
                "i-2",
                Behavior::Fails {
                    stderr: "cat: /etc/centos-release: No such file".into(),
                },
            )
            .instance("i-3", Behavior::Unavailable)
            .instance("i-4", Behavior::prints("")),
    );

    let report = runner(fleet, RunnerOptions::default())
        .run_on_instances(
            &ids(&["i-1", "i-2", "i-3", "i-4"]),
            &spec(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let map = report.to_map();
    assert_eq!(map["i-1"], "CentOS Linux release 7.9.2009 (Core)");
    assert!(map["i-2"].starts_with("failed (Failed)"));
    assert!(map["i-2"].contains("No such file"));
    assert_eq!(map["i-3"], "unavailable");
    assert_eq!(map["i-4"], "N/A");
    assert_eq!(report.succeeded(), 2);

    let order: Vec<_> = report.results.iter().map(|r| r.instance_id.as_str()).collect();
    assert_eq!(order, vec!["i-1", "i-2", "i-3", "i-4"]);
}

#[tokio::test(start_paused = true)]
async fn unexpected_error_is_recorded_and_run_continues() {
    let fleet = Arc::new(
        FakeFleet::new()
            .instance("i-1", denied())
            .instance("i-2", Behavior::prints("ok")),
    );

    let report = runner(fleet, options(1, UnexpectedErrorPolicy::SkipInstance))
        .run_on_instances(&ids(&["i-1", "i-2"]), &spec(), &CancellationToken::new())
        .await
        .unwrap();

    let map = report.to_map();
    assert_eq!(map["i-1"], "error: AccessDeniedException: denied");
    assert_eq!(map["i-2"], "ok");
}

#[tokio::test(start_paused = true)]
async fn abort_policy_stops_the_run() {
    let fleet = Arc::new(
        FakeFleet::new()
            .instance("i-1", denied())
            .instance("i-2", Behavior::prints("ok")),
    );

    let err = runner(fleet.clone(), options(1, UnexpectedErrorPolicy::Abort))
        .run_on_instances(&ids(&["i-1", "i-2"]), &spec(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        CommandError::Aborted { instance_id, reason } => {
            assert_eq!(instance_id, "i-1");
            assert_eq!(reason.code(), "AccessDeniedException");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(fleet.submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn abort_is_not_held_back_by_a_stuck_instance() {
    let fleet = Arc::new(
        FakeFleet::new()
            .instance("i-1", Behavior::Hangs)
            .instance("i-2", denied()),
    );
    let started = Instant::now();

    let err = runner(fleet, options(2, UnexpectedErrorPolicy::Abort))
        .run_on_instances(&ids(&["i-1", "i-2"]), &spec(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    match err {
        CommandError::Aborted { instance_id, .. } => assert_eq!(instance_id, "i-2"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn results_keep_input_order_when_finishing_out_of_order() {
    let fleet = Arc::new(
        FakeFleet::new()
            .instance(
                "i-slow",
                Behavior::Prints {
                    stdout: "slow".into(),
                    polls: 4,
                },
            )
            .instance("i-fast", Behavior::prints("fast")),
    );

    let report = runner(fleet, options(2, UnexpectedErrorPolicy::SkipInstance))
        .run_on_instances(&ids(&["i-slow", "i-fast"]), &spec(), &CancellationToken::new())
        .await
        .unwrap();

    let order: Vec<_> = report.results.iter().map(|r| r.instance_id.as_str()).collect();
    assert_eq!(order, vec!["i-slow", "i-fast"]);
    assert_eq!(report.to_map()["i-slow"], "slow");
}

#[tokio::test(start_paused = true)]
async fn stuck_instance_times_out_without_blocking_others() {
    let fleet = Arc::new(
        FakeFleet::new()
            .instance("i-stuck", Behavior::Hangs)
            .instance("i-ok", Behavior::prints("done")),
    );

    let report = runner(fleet, options(2, UnexpectedErrorPolicy::SkipInstance))
        .run_on_instances(&ids(&["i-stuck", "i-ok"]), &spec(), &CancellationToken::new())
        .await
        .unwrap();

    let map = report.to_map();
    assert_eq!(map["i-stuck"], "timed out after 30s");
    assert_eq!(map["i-ok"], "done");
}

#[tokio::test(start_paused = true)]
async fn cancellation_marks_remaining_instances() {
    let fleet = Arc::new(
        FakeFleet::new()
            .instance("i-1", Behavior::Hangs)
            .instance("i-2", Behavior::Hangs)
            .instance("i-3", Behavior::prints("never")),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.cancel();
    });

    let report = runner(fleet.clone(), options(2, UnexpectedErrorPolicy::SkipInstance))
        .run_on_instances(&ids(&["i-1", "i-2", "i-3"]), &spec(), &cancel)
        .await
        .unwrap();

    assert!(report.results.iter().all(|r| r.result == "cancelled"));
    assert!(!fleet.submitted().contains(&"i-3".to_string()));
}

#[tokio::test(start_paused = true)]
async fn in_flight_commands_respect_concurrency() {
    let mut fleet = FakeFleet::new();
    let names: Vec<String> = (0..8).map(|n| format!("i-{n}")).collect();
    for name in &names {
        fleet = fleet.instance(
            name,
            Behavior::Prints {
                stdout: name.clone(),
                polls: 2,
            },
        );
    }
    let fleet = Arc::new(fleet);

    let report = runner(fleet.clone(), options(3, UnexpectedErrorPolicy::SkipInstance))
        .run_on_instances(&names, &spec(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 8);
    assert!(fleet.max_running() <= 3);
    assert_eq!(report.to_map()["i-5"], "i-5");
}
