use kavi_core::Database;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(xdg_config.join("kavi")).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        fs::write(
            xdg_config.join("kavi/config.toml"),
            "[assistant]\nrng_seed = 42\n\n[context]\nhistory_replay = 0\n",
        )
        .expect("failed to write config");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("kavi/kavi.db")
    }
}

fn snapshot_fixture() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../kavi-core/tests/fixtures/device-snapshot.json")
        .to_string_lossy()
        .into_owned()
}

fn command_for(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> Command {
    let bin_path = match bin_name {
        "kavi" => PathBuf::from(assert_cmd::cargo::cargo_bin!("kavi")),
        "kavi-scan" => PathBuf::from(assert_cmd::cargo::cargo_bin!("kavi-scan")),
        _ => panic!("unsupported binary in test harness: {bin_name}"),
    };

    let mut command = Command::new(bin_path);
    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG");
    command
}

fn run_bin(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> Output {
    command_for(env, bin_name, args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute {bin_name}: {e}"))
}

fn run_bin_with_stdin(env: &CliTestEnv, bin_name: &str, args: &[&str], input: &str) -> Output {
    let mut child = command_for(env, bin_name, args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to spawn {bin_name}: {e}"));

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(input.as_bytes())
        .expect("failed to write stdin");

    child
        .wait_with_output()
        .unwrap_or_else(|e| panic!("failed to wait for {bin_name}: {e}"))
}

fn assert_success(bin_name: &str, args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "{bin_name} {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn single_command_speaks_acts_and_logs() {
    let env = CliTestEnv::new();
    let args = ["--command", "set volume to 30%"];

    let output = run_bin(&env, "kavi", &args);
    assert_success("kavi", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("kavi [neutral] Volume set to 30 percent"),
        "expected volume confirmation, got:\n{stdout}"
    );
    assert!(stdout.contains("  -> setting volume=30"));

    let db_path = env.db_path();
    assert!(
        db_path.exists(),
        "database file should exist at {}",
        db_path.display()
    );
    let db = Database::open(&db_path).expect("failed to open db");
    db.migrate().expect("failed to migrate db");

    let commands = db.recent_commands(10).expect("failed to read commands");
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].intent, "VOLUME_CONTROL");
    assert_eq!(commands[0].parameters.get("level").map(String::as_str), Some("30"));
}

#[test]
fn console_session_remembers_the_last_person() {
    let env = CliTestEnv::new();
    let args = ["--verbose"];
    let input = "call mom\ntext her\n:summary\n:quit\n";

    let output = run_bin_with_stdin(&env, "kavi", &args, input);
    assert_success("kavi", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("  -> call mom"), "got:\n{stdout}");
    assert!(stdout.contains("intent: SEND_MESSAGE"), "got:\n{stdout}");
    assert!(stdout.contains("  -> message mom"), "got:\n{stdout}");
    assert!(stdout.contains("Conversation turns: 2"));
    assert!(stdout.contains("Last person: mom"));
}

#[test]
fn voice_security_check_reads_snapshot() {
    let env = CliTestEnv::new();
    let snapshot = snapshot_fixture();
    let args = ["--snapshot", snapshot.as_str(), "--command", "run a security check"];

    let output = run_bin(&env, "kavi", &args);
    assert_success("kavi", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("kavi [serious] Running security diagnostics..."));
    assert!(
        stdout.contains("kavi [concerned] Security alert! Threat level is CRITICAL. I found 4 issues."),
        "got:\n{stdout}"
    );
}

#[test]
fn security_check_without_snapshot_says_so() {
    let env = CliTestEnv::new();
    let args = ["--command", "security scan"];

    let output = run_bin(&env, "kavi", &args);
    assert_success("kavi", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("kavi [concerned] Security module not initialized."));
}

#[test]
fn scan_reports_and_stores_history() {
    let env = CliTestEnv::new();
    let snapshot = snapshot_fixture();

    let args = [snapshot.as_str()];
    let output = run_bin(&env, "kavi-scan", &args);
    assert_success("kavi-scan", &args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Threat level: CRITICAL (score 95)"), "got:\n{stdout}");
    assert!(stdout.contains("package: com.spy.tracker"));

    let args = [snapshot.as_str(), "--format", "json", "--no-save"];
    let output = run_bin(&env, "kavi-scan", &args);
    assert_success("kavi-scan", &args, &output);
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("scan output should be JSON");
    assert_eq!(report["total_score"], 95);
    assert_eq!(report["threat_level"], "CRITICAL");
    assert_eq!(report["threats"].as_array().map(Vec::len), Some(4));

    let args = ["--history", "5"];
    let output = run_bin(&env, "kavi-scan", &args);
    assert_success("kavi-scan", &args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1, "only the saved scan is stored:\n{stdout}");
    assert!(stdout.contains("CRITICAL"));
}

#[test]
fn scan_lists_detectors() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, "kavi-scan", &["--list-detectors"]);
    assert_success("kavi-scan", &["--list-detectors"], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("security.accessibility"));
    assert!(stdout.contains("security.sideload"));
    assert!(!stdout.contains("security.system_settings"));

    let args = ["--list-detectors", "--extended"];
    let output = run_bin(&env, "kavi-scan", &args);
    assert_success("kavi-scan", &args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("security.system_settings"));
    assert!(stdout.contains("security.persistent_service"));
}
