use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread;
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    xdg_runtime: PathBuf,
    active: PathBuf,
    pending: PathBuf,
    config_path: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let xdg_runtime = base.join("xdg-runtime");

        for dir in [&home, &xdg_config, &xdg_state, &xdg_runtime] {
            fs::create_dir_all(dir).expect("failed to create test directory");
        }

        Self {
            active: base.join("var/lib/signalCounter/count"),
            pending: base.join("tmp/signalCounterCount.swp"),
            config_path: base.join("config.toml"),
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
            xdg_runtime,
        }
    }

    /// Write a config file pointing the queue into the temp dir.
    fn write_config(&self, extra: &str) {
        let identity = self.home.join("address");
        fs::write(&identity, "b8:27:eb:12:34:56\n").expect("failed to write identity");

        let contents = format!(
            r#"
[queue]
active_path = "{}"
pending_path = "{}"

[delivery]
identity_path = "{}"
timeout_secs = 5

{}
"#,
            self.active.display(),
            self.pending.display(),
            identity.display(),
            extra
        );
        fs::write(&self.config_path, contents).expect("failed to write config");
    }

    fn queue_events(&self, contents: &str) {
        fs::create_dir_all(self.active.parent().expect("missing active parent"))
            .expect("failed to create active dir");
        fs::write(&self.active, contents).expect("failed to seed active slot");
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("signal-counter"));

    let mut command = Command::new(bin_path);

    command
        .arg("--config")
        .arg(&env.config_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env("XDG_RUNTIME_DIR", &env.xdg_runtime)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute signal-counter: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
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
        "signal-counter {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

/// Accept one HTTP request, reply 200, and hand back the raw request text.
fn one_shot_collector() -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind collector");
    let url = format!(
        "http://{}/uk/box-form/record-signal-counter-csv",
        listener.local_addr().expect("no local addr")
    );
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("collector accept failed");
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).expect("collector read failed");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let l = l.to_ascii_lowercase();
                        l.strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }
        stream
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .expect("collector write failed");
        String::from_utf8_lossy(&request).into_owned()
    });
    (url, handle)
}

fn unused_local_url() -> String {
    let port = TcpListener::bind("127.0.0.1:0")
        .expect("failed to bind")
        .local_addr()
        .expect("no local addr")
        .port();
    format!("http://127.0.0.1:{port}/record")
}

#[test]
fn status_reports_queued_events() {
    let env = CliTestEnv::new();
    env.write_config("");
    env.queue_events("1700000000\n1700000100\n");

    let args = ["status"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Endpoint:        <not set>"));
    assert!(stdout.contains("(2 event(s))"));
    assert!(stdout.contains("Pending slot:"));
    let log_file = env.xdg_state.join("signal-counter").join("signal-counter.log");
    assert!(stdout.contains(&format!("Log file:        {}", log_file.display())));
    assert!(stdout.contains("Status: Not ready"));
}

#[test]
fn flush_with_empty_queue_is_a_noop() {
    let env = CliTestEnv::new();
    env.write_config("");

    let args = ["flush", "http://127.0.0.1:9/record"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    assert!(String::from_utf8_lossy(&output.stdout).contains("Nothing to deliver"));
    assert!(!env.active.exists());
    assert!(!env.pending.exists());
}

#[test]
fn flush_without_endpoint_fails() {
    let env = CliTestEnv::new();
    env.write_config("");

    let output = run_bin(&env, &["flush"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("endpoint_url is required"));
}

#[test]
fn flush_keeps_batch_when_collector_unreachable() {
    let env = CliTestEnv::new();
    env.write_config("");
    env.queue_events("1700000000\n");

    let url = unused_local_url();
    let args = ["flush", url.as_str()];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    assert!(String::from_utf8_lossy(&output.stdout).contains("kept for retry"));
    assert!(!env.active.exists());
    assert_eq!(
        fs::read_to_string(&env.pending).expect("pending slot missing"),
        "1700000000\n"
    );
}

#[test]
fn flush_delivers_and_clears_queue() {
    let env = CliTestEnv::new();
    env.write_config("");
    env.queue_events("1700000000\n1700000100\n");

    let (url, collector) = one_shot_collector();
    let args = ["flush", url.as_str()];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let request = collector.join().expect("collector thread panicked");
    assert!(request.starts_with("POST /uk/box-form/record-signal-counter-csv"));
    assert!(request.ends_with("macAddress=b8%3A27%3Aeb%3A12%3A34%3A56&csv=1700000000%0A1700000100"));

    assert!(String::from_utf8_lossy(&output.stdout).contains("Delivered 2 event(s) (HTTP 200)"));
    assert!(!env.active.exists());
    assert!(!env.pending.exists());
}

#[test]
fn run_exits_nonzero_without_gpio() {
    let env = CliTestEnv::new();
    let missing_gpio = env.home.join("no-gpio-here");
    env.write_config(&format!(
        "[capture]\ngpio_root = \"{}\"\n",
        missing_gpio.display()
    ));

    let output = run_bin(&env, &["run", "http://127.0.0.1:9/record"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("hardware initialization failed"));
}

#[test]
fn run_rejects_zero_trigger_interval() {
    let env = CliTestEnv::new();
    env.write_config("");

    let output = run_bin(
        &env,
        &["run", "http://127.0.0.1:9/record", "--trigger-interval-ms", "0"],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("trigger_interval_ms"));
}
