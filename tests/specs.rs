//! Behavioral specifications for the `runner` CLI.
//!
//! Black-box: these invoke the built binary and assert on stdout, stderr,
//! and exit codes. Cases that need a task graph shell out to a fake `bd`
//! script placed first on `PATH` rather than the real tracker.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Output;

use assert_cmd::Command;

fn runner() -> Command {
    Command::cargo_bin("runner").expect("runner binary should build")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Writes an executable shell script named `bd` into `dir`.
fn fake_bd(dir: &Path, script_body: &str) {
    let path = dir.join("bd");
    let mut file = std::fs::File::create(&path).expect("create fake bd");
    writeln!(file, "#!/bin/sh\n{script_body}").expect("write fake bd");
    let mut perms = file.metadata().expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod fake bd");
}

fn prepend_path(dir: &Path) -> String {
    let existing = std::env::var("PATH").unwrap_or_default();
    format!("{}:{existing}", dir.display())
}

mod help {
    use super::*;

    #[test]
    fn top_level_help_lists_init_subcommand() {
        let output = runner().arg("--help").output().expect("run runner --help");
        assert!(output.status.success());
        assert!(stdout_of(&output).contains("init"));
    }

    #[test]
    fn missing_root_is_a_clear_error() {
        let repo = tempfile::tempdir().expect("tempdir");
        let output = runner()
            .arg("--repo")
            .arg(repo.path())
            .output()
            .expect("run runner");
        assert!(!output.status.success());
        assert!(stderr_of(&output).contains("--root is required"));
    }

    #[test]
    fn nonexistent_repo_is_a_clear_error() {
        let output = runner()
            .arg("--repo")
            .arg("/does/not/exist/at/all")
            .arg("--root")
            .arg("task-1")
            .output()
            .expect("run runner");
        assert!(!output.status.success());
        assert!(stderr_of(&output).contains("does not exist"));
    }
}

mod init {
    use super::*;

    #[test]
    fn scaffolds_the_agent_definition_file() {
        let repo = tempfile::tempdir().expect("tempdir");
        let output = runner()
            .arg("--repo")
            .arg(repo.path())
            .arg("init")
            .output()
            .expect("run runner init");
        assert!(output.status.success());
        assert!(stdout_of(&output).contains("created"));

        let agent_file = repo.path().join(".opencode/agent/yolo.md");
        assert!(agent_file.exists());
        let contents = std::fs::read_to_string(&agent_file).expect("read agent file");
        assert!(contents.contains("permission: allow"));
    }

    #[test]
    fn is_idempotent_across_repeated_invocations() {
        let repo = tempfile::tempdir().expect("tempdir");
        runner()
            .arg("--repo")
            .arg(repo.path())
            .arg("init")
            .output()
            .expect("first init");

        let output = runner()
            .arg("--repo")
            .arg(repo.path())
            .arg("init")
            .output()
            .expect("second init");
        assert!(output.status.success());
        assert!(stdout_of(&output).contains("already present"));
    }
}

mod dry_run {
    use super::*;

    #[test]
    fn prints_the_ready_set_without_spawning_an_agent() {
        let repo = tempfile::tempdir().expect("tempdir");
        let bin_dir = tempfile::tempdir().expect("tempdir");
        fake_bd(
            bin_dir.path(),
            r#"
if [ "$1" = "ready" ]; then
  echo '[{"id":"task-1","title":"Do the thing","body":"","status":"open","issue_type":"task","depends_on":[]}]'
  exit 0
fi
echo "unexpected invocation: $*" 1>&2
exit 1
"#,
        );

        let output = runner()
            .arg("--repo")
            .arg(repo.path())
            .arg("--root")
            .arg("epic-1")
            .arg("--dry-run")
            .env("PATH", prepend_path(bin_dir.path()))
            .output()
            .expect("run runner --dry-run");
        assert!(output.status.success());
        let stdout = stdout_of(&output);
        assert!(stdout.contains("ready: task-1"));
        assert!(stdout.contains("max_parallelism: 1"));
    }

    #[test]
    fn an_empty_ready_set_falls_back_to_the_root_issue_when_it_is_a_leaf() {
        let repo = tempfile::tempdir().expect("tempdir");
        let bin_dir = tempfile::tempdir().expect("tempdir");
        fake_bd(
            bin_dir.path(),
            r#"
case "$1 $2" in
  "ready --parent")
    echo '[]'
    ;;
  "show task-1")
    echo '{"id":"task-1","title":"Solo task","body":"","status":"open","issue_type":"task","depends_on":[]}'
    ;;
  *)
    echo "unexpected invocation: $*" 1>&2
    exit 1
    ;;
esac
"#,
        );

        let output = runner()
            .arg("--repo")
            .arg(repo.path())
            .arg("--root")
            .arg("task-1")
            .arg("--dry-run")
            .env("PATH", prepend_path(bin_dir.path()))
            .output()
            .expect("run runner --dry-run");
        assert!(output.status.success());
        assert!(stdout_of(&output).contains("ready: task-1"));
    }

    #[test]
    fn a_nonzero_bd_exit_is_surfaced_as_an_error() {
        let repo = tempfile::tempdir().expect("tempdir");
        let bin_dir = tempfile::tempdir().expect("tempdir");
        fake_bd(bin_dir.path(), "echo 'boom' 1>&2\nexit 3\n");

        let output = runner()
            .arg("--repo")
            .arg(repo.path())
            .arg("--root")
            .arg("task-1")
            .arg("--dry-run")
            .env("PATH", prepend_path(bin_dir.path()))
            .output()
            .expect("run runner --dry-run");
        assert!(!output.status.success());
        assert!(stderr_of(&output).contains("boom"));
    }
}
