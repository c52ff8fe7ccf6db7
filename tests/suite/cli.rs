//! The `jobexec` binary: console output, dry runs, and exit status.

use std::process::{Command, Output};

use crate::common::Workspace;

const JOBS: &str = r"
global:
  threads: 2
  strategy: priority

pre_job_items:
  - job: setup
    command: echo ready

job_items:
  - job: low
    command: echo low
    priority: 1
  - job: high
    command: exit 2
    priority: 5

post_job_items:
  - job: teardown
    command: echo bye
";

fn jobexec(ws: &Workspace, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_jobexec"));
    cmd.current_dir(ws.path()).args(args).env_remove("RUST_LOG");
    cmd
}

fn run(ws: &Workspace, args: &[&str]) -> Output {
    jobexec(ws, args).output().expect("run jobexec")
}

#[test]
fn runs_all_phases_and_prints_progress() {
    let ws = Workspace::new();
    ws.write("jobs.yaml", JOBS);

    let output = run(&ws, &["--jobs", "jobs.yaml"]);
    let stdout = String::from_utf8(output.stdout).unwrap();

    assert!(output.status.success(), "{stdout}");
    let pre = stdout.find("Pre Job Items:").unwrap();
    let main = stdout.find("\nJob Items:").unwrap();
    let post = stdout.find("Post Job Items:").unwrap();
    assert!(pre < main && main < post);
    assert!(stdout.contains(
        "{job_state: EXECUTING, job: setup, command: echo ready > setup.out 2> setup.err}"
    ));
    assert!(stdout.contains(
        "{job_state: COMPLETED, job: high, exit_code: 2, run_time: 00:00:00}"
    ));
    assert_eq!(ws.read("setup.out"), "ready\n");
    assert_eq!(ws.read("teardown.out"), "bye\n");
    assert_eq!(ws.read("low.err"), "");
}

#[test]
fn dry_run_prints_schedule_without_running() {
    let ws = Workspace::new();
    ws.write("jobs.yaml", JOBS);

    let output = run(
        &ws,
        &["--jobs", "jobs.yaml", "--dry-run", "--strategy", "sequential"],
    );
    let stdout = String::from_utf8(output.stdout).unwrap();

    assert!(output.status.success());
    let low = stdout.find("Name:      low").unwrap();
    let high = stdout.find("Name:      high").unwrap();
    assert!(low < high, "sequential keeps document order:\n{stdout}");
    assert!(stdout.contains("Job State: CREATED"));
    assert!(!ws.file("setup.out").exists());
}

#[test]
fn dry_run_orders_main_by_priority() {
    let ws = Workspace::new();
    ws.write("jobs.yaml", JOBS);

    let stdout = String::from_utf8(run(&ws, &["-j", "jobs.yaml", "--dry-run"]).stdout).unwrap();

    let low = stdout.find("Name:      low").unwrap();
    let high = stdout.find("Name:      high").unwrap();
    assert!(high < low);
}

#[test]
fn missing_job_file_exits_with_failure() {
    let ws = Workspace::new();

    let output = run(&ws, &["--jobs", "absent.yaml"]);
    let stderr = String::from_utf8(output.stderr).unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("failed to load job file absent.yaml"), "{stderr}");
}

#[test]
fn invalid_job_file_runs_nothing() {
    let ws = Workspace::new();
    ws.write(
        "jobs.yaml",
        "job_items:\n  - job: a\n    command: echo a\n  - job: a\n    command: echo again\n",
    );

    let output = run(&ws, &["--jobs", "jobs.yaml"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stderr).unwrap().contains("duplicate job name"));
    assert!(!ws.file("a.out").exists());
}

#[cfg(target_os = "linux")]
#[test]
fn ctrl_c_kills_running_jobs_and_exits() {
    use std::process::Stdio;
    use std::time::Duration;

    use crate::common::wait_until_gone;

    let ws = Workspace::new();
    ws.write(
        "jobs.yaml",
        "job_items:\n  - job: hang\n    command: echo $$ > hang.pid; sleep 30\n",
    );
    let mut child = jobexec(&ws, &["--jobs", "jobs.yaml"])
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let job_pid = ws.wait_for_pid("hang.pid", Duration::from_secs(5)).unwrap();
    let pid = libc::pid_t::try_from(child.id()).unwrap();
    // SAFETY: signalling a child process this test spawned.
    assert_eq!(unsafe { libc::kill(pid, libc::SIGINT) }, 0);

    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("Break Requested ... exiting"), "{stdout}");
    assert!(wait_until_gone(job_pid, Duration::from_secs(2)));
}

#[cfg(target_os = "linux")]
#[test]
fn ctrl_c_kills_descendants_in_their_own_session() {
    use std::path::Path;
    use std::process::Stdio;
    use std::time::Duration;

    use crate::common::wait_until_gone;

    if !Path::new("/usr/bin/setsid").exists() && !Path::new("/bin/setsid").exists() {
        return;
    }
    let ws = Workspace::new();
    ws.write(
        "jobs.yaml",
        "job_items:\n  - job: hang\n    \
         command: setsid sleep 30 & echo $! > child.pid; echo $$ > hang.pid; wait\n",
    );
    let mut child = jobexec(&ws, &["--jobs", "jobs.yaml"])
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let job_pid = ws.wait_for_pid("hang.pid", Duration::from_secs(5)).unwrap();
    let escaped = ws.wait_for_pid("child.pid", Duration::from_secs(5)).unwrap();
    let pid = libc::pid_t::try_from(child.id()).unwrap();
    // SAFETY: signalling a child process this test spawned.
    assert_eq!(unsafe { libc::kill(pid, libc::SIGINT) }, 0);

    let output = child.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(wait_until_gone(escaped, Duration::from_secs(2)), "{escaped} survived");
    assert!(wait_until_gone(job_pid, Duration::from_secs(2)));
}
