//! Wall-time enforcement and process-tree teardown.

use std::time::Duration;

use jobexec_engine::KILLED_EXIT_CODE;
use jobexec_types::JobState;

use crate::common::{Workspace, executor};

#[tokio::test]
async fn overrunning_job_times_out_with_kill_status() {
    let ws = Workspace::new();
    let done = executor()
        .execute(vec![ws.job("slow", "sleep 30", 1)], 1)
        .await;

    let slow = &done[0];
    assert_eq!(slow.state(), JobState::Timeout);
    assert_eq!(slow.exit_code(), KILLED_EXIT_CODE);
    let run_time = slow.run_time().unwrap();
    assert!(run_time.num_milliseconds() >= 1000, "{run_time:?}");
    assert!(run_time.num_seconds() < 5, "{run_time:?}");
}

#[tokio::test]
async fn job_inside_its_wall_time_completes() {
    let ws = Workspace::new();
    let done = executor()
        .execute(vec![ws.job("quick", "sleep 0.2; exit 4", 2)], 1)
        .await;

    assert_eq!(done[0].state(), JobState::Completed);
    assert_eq!(done[0].exit_code(), 4);
}

#[tokio::test]
async fn timeout_does_not_disturb_siblings() {
    let ws = Workspace::new();
    let items = vec![ws.job("slow", "sleep 30", 1), ws.job("fine", "sleep 1.5", 10)];

    let done = executor().execute(items, 2).await;

    assert_eq!(done[0].state(), JobState::Timeout);
    assert_eq!(done[1].state(), JobState::Completed);
    assert_eq!(done[1].exit_code(), 0);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn timeout_kills_background_children() {
    use crate::common::wait_until_gone;

    let ws = Workspace::new();
    let command = format!(
        "sleep 30 & echo $! > {child}; echo $$ > {root}; wait",
        child = ws.file("child.pid").display(),
        root = ws.file("root.pid").display(),
    );

    let done = executor().execute(vec![ws.job("tree", &command, 1)], 1).await;
    assert_eq!(done[0].state(), JobState::Timeout);

    let child = ws.wait_for_pid("child.pid", Duration::from_secs(1)).unwrap();
    let root = ws.wait_for_pid("root.pid", Duration::from_secs(1)).unwrap();
    assert!(wait_until_gone(root, Duration::from_secs(2)), "root {root} survived");
    assert!(wait_until_gone(child, Duration::from_secs(2)), "child {child} survived");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn timeout_kills_children_that_left_the_process_group() {
    use std::path::Path;

    use crate::common::wait_until_gone;

    if !Path::new("/usr/bin/setsid").exists() && !Path::new("/bin/setsid").exists() {
        return;
    }
    let ws = Workspace::new();
    let command = format!(
        "setsid sleep 30 & echo $! > {child}; wait",
        child = ws.file("child.pid").display(),
    );

    let done = executor().execute(vec![ws.job("escaped", &command, 1)], 1).await;
    assert_eq!(done[0].state(), JobState::Timeout);

    let child = ws.wait_for_pid("child.pid", Duration::from_secs(1)).unwrap();
    assert!(wait_until_gone(child, Duration::from_secs(2)), "child {child} survived");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn dropping_a_running_batch_kills_children_in_other_sessions() {
    use std::path::Path;

    use crate::common::gone_within;

    if !Path::new("/usr/bin/setsid").exists() && !Path::new("/bin/setsid").exists() {
        return;
    }
    let ws = Workspace::new();
    let command = format!(
        "setsid sleep 30 & echo $! > {child}; echo $$ > {root}; wait",
        child = ws.file("child.pid").display(),
        root = ws.file("root.pid").display(),
    );

    let executor = executor();
    let batch = executor.execute(vec![ws.job("escaped", &command, 30)], 1);
    let abandoned = tokio::time::timeout(Duration::from_millis(1500), batch).await;
    assert!(abandoned.is_err(), "job finished before its batch was dropped");

    let child = ws.wait_for_pid("child.pid", Duration::from_secs(1)).unwrap();
    let root = ws.wait_for_pid("root.pid", Duration::from_secs(1)).unwrap();
    assert!(gone_within(child, Duration::from_secs(2)).await, "child {child} survived");
    assert!(gone_within(root, Duration::from_secs(2)).await, "root {root} survived");
}
