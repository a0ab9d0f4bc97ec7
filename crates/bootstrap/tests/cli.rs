//! Black-box tests of the devstack binary
//!
//! A shell script stands in for the container runtime and records every
//! invocation, and `/bin/sh` stands in for the backend.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::TempDir;

// Writing an executable while another test thread forks can fail the later
// exec with ETXTBSY, so fixtures run one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

struct Fixture {
    dir: TempDir,
    _serial: MutexGuard<'static, ()>,
}

impl Fixture {
    /// Repo with a full dump, a backend dir and a fake runtime whose
    /// `version` exits with `version_exit`.
    fn new(version_exit: i32) -> Self {
        let serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().expect("create temp repo");
        let root = dir.path();

        std::fs::create_dir_all(root.join("sql")).unwrap();
        std::fs::write(root.join("sql/dml.sql"), "CREATE TABLE t (id INT);").unwrap();
        std::fs::create_dir_all(root.join("backend")).unwrap();

        let log = root.join("runtime.log");
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\nif [ \"$1\" = version ]; then exit {}; fi\nexit 0\n",
            log.display(),
            version_exit
        );
        let runtime = root.join("fake-runtime");
        std::fs::write(&runtime, script).unwrap();
        std::fs::set_permissions(&runtime, std::fs::Permissions::from_mode(0o755)).unwrap();

        Self { dir, _serial: serial }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn runtime(&self) -> PathBuf {
        self.root().join("fake-runtime")
    }

    fn runtime_log(&self) -> Vec<String> {
        std::fs::read_to_string(self.root().join("runtime.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Backend that records its datastore env and exits with `code`
    fn write_backend_config(&self, code: i32) {
        let script = format!(
            concat!(
                "echo \"PORT=$PORT DATABASE_HOST=$DATABASE_HOST ",
                "DATABASE_PORT=$DATABASE_PORT KEEP=$KEEP_ME\" > env.out; exit {}"
            ),
            code
        );
        self.write_backend_script(&script);
    }

    /// Run `script` with /bin/sh as the backend
    fn write_backend_script(&self, script: &str) {
        let config = format!(
            r#"
[readiness]
interval_ms = 10
timeout_secs = 5

[backend]
dir = "backend"
program = "/bin/sh"
args = ["-c", '''{script}''']
"#
        );
        std::fs::write(self.root().join("devstack.toml"), config).unwrap();
    }

    fn wait_for_file(&self, relative: &str) -> bool {
        let path = self.root().join(relative);
        let deadline = Instant::now() + Duration::from_secs(20);
        while Instant::now() < deadline {
            if path.exists() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_devstack"));
        command
            .arg("--repo-root")
            .arg(self.root())
            .arg("--runtime")
            .arg(self.runtime())
            .args(args)
            .env_remove("DEVSTACK_CONFIG")
            .env_remove("DEVSTACK_RUNTIME")
            .env_remove("DEVSTACK_REPO_ROOT")
            .env_remove("PORT")
            .env_remove("CACHE_MODE")
            .env_remove("GOOGLE_CLOUD_STORAGE")
            .env("KEEP_ME", "yes");
        command
    }

    fn devstack(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("run devstack")
    }
}

#[test]
fn runtime_unavailable_fails_before_any_container_command() {
    let fixture = Fixture::new(1);

    let output = fixture.devstack(&["up"]);

    assert!(!output.status.success());
    assert_eq!(fixture.runtime_log(), vec!["version"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Container runtime not available"), "{stderr}");
}

#[test]
fn up_provisions_then_runs_backend() {
    let fixture = Fixture::new(0);
    fixture.write_backend_config(0);

    let output = fixture.devstack(&["up"]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let log = fixture.runtime_log();
    let verbs: Vec<&str> = log.iter().map(|l| l.split(' ').next().unwrap_or("")).collect();
    assert_eq!(verbs, vec!["version", "ps", "rm", "run", "rm", "run", "exec", "cp", "exec"]);
    assert!(log[3].starts_with("run --name digibot-redis --rm -p 6379:6379 -d redis:7-alpine"));
    assert!(log[4].starts_with("rm -f digibot-mysql"));
    assert!(log[7].ends_with("digibot-mysql:/tmp/dml.sql"));

    let env_out = std::fs::read_to_string(fixture.root().join("backend/env.out")).unwrap();
    assert_eq!(
        env_out.trim(),
        "PORT=5050 DATABASE_HOST=127.0.0.1 DATABASE_PORT=3307 KEEP=yes"
    );
}

#[test]
fn up_exits_with_backend_code() {
    let fixture = Fixture::new(0);
    fixture.write_backend_config(5);

    let output = fixture.devstack(&["up"]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn sigterm_is_forwarded_to_backend() {
    let fixture = Fixture::new(0);
    fixture.write_backend_script(
        "trap \"echo term > got-term; exit 9\" TERM; echo up > ready; \
         while true; do sleep 0.1; done",
    );

    let mut child = fixture
        .command(&["up"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn devstack");

    if !fixture.wait_for_file("backend/ready") {
        let _ = child.kill();
        panic!("backend never started");
    }
    // handlers are installed right after the backend is spawned
    std::thread::sleep(Duration::from_millis(300));

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
    let status = child.wait().unwrap();

    assert_eq!(status.code(), Some(9));
    let received = std::fs::read_to_string(fixture.root().join("backend/got-term")).unwrap();
    assert_eq!(received.trim(), "term");
}

#[test]
fn explicit_missing_config_fails() {
    let fixture = Fixture::new(0);
    let missing = fixture.root().join("missing.toml");

    let output = fixture.devstack(&["--config", missing.to_str().unwrap(), "up"]);

    assert!(!output.status.success());
    assert!(fixture.runtime_log().is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.toml"), "{stderr}");
}

#[test]
fn provision_does_not_start_backend() {
    let fixture = Fixture::new(0);
    fixture.write_backend_config(0);

    let output = fixture.devstack(&["provision"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(!fixture.root().join("backend/env.out").exists());
}

#[test]
fn print_env_shows_overlay() {
    let fixture = Fixture::new(0);

    let output = Command::new(env!("CARGO_BIN_EXE_devstack"))
        .arg("--repo-root")
        .arg(fixture.root())
        .arg("print-env")
        .env_remove("DEVSTACK_CONFIG")
        .env_remove("RUST_LOG")
        .env_remove("PORT")
        .env("CACHE_MODE", "1")
        .env_remove("GOOGLE_CLOUD_STORAGE")
        .output()
        .expect("run devstack");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "PORT=5050",
            "DATABASE_HOST=127.0.0.1",
            "DATABASE_PORT=3307",
            "DATABASE_USER_NAME=root",
            "DATABASE_PASSWORD=root",
            "DATABASE_NAME=community_aid",
            "CACHE_MODE=1",
            "GOOGLE_CLOUD_STORAGE=0",
        ]
    );
}
