// concurrent_invocations.rs — Many `echo act` processes against one project.
//
// Each invocation loads `.echo/`, decides and saves. Run side by side they
// must behave as if run one after another: the hourly/daily cap holds across
// processes, every decision reaches the ledger, and no reader ever mistakes a
// state file for an empty one and drops the signed policy.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use echo_audit::ActivityLog;
use echo_authority::{EchoConfig, Session};
use tempfile::TempDir;

const PARALLEL: usize = 12;

fn echo(root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_echo"));
    cmd.arg("--project-root").arg(root);
    cmd
}

fn run(root: &Path, args: &[&str]) -> Output {
    let output = echo(root).args(args).output().unwrap();
    assert!(
        output.status.success(),
        "echo {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

#[test]
fn parallel_acts_share_one_ledger() {
    let project = TempDir::new().unwrap();
    let root = project.path();

    run(root, &["wallet", "connect", "--seed", "alice"]);
    // A daily cap of 3 holds even if the run straddles an hour boundary.
    run(
        root,
        &["policy", "sign", "--preset", "balanced", "--max-per-hour", "3", "--max-per-day", "3"],
    );

    let children: Vec<_> = (0..PARALLEL)
        .map(|_| {
            echo(root)
                .args([
                    "act",
                    "--purpose",
                    "sentiment.fetch",
                    "--target",
                    "genvox-sentiment",
                    "--amount",
                    "1",
                    "--json",
                ])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .unwrap()
        })
        .collect();

    let mut authorized = 0;
    for child in children {
        let output = child.wait_with_output().unwrap();
        assert!(
            output.status.success(),
            "act failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let event: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        match event["status"].as_str() {
            Some("authorized") => authorized += 1,
            Some("rejected") => assert_eq!(event["violatedRule"], "RateLimitExceeded"),
            other => panic!("unexpected status {:?}", other),
        }
    }
    assert_eq!(authorized, 3);

    // The signed policy survived and the saved counters match the decisions.
    let config = EchoConfig::load(root).unwrap();
    assert!(config.authority_file.exists());
    let status = run(root, &["wallet", "status"]);
    let status = String::from_utf8_lossy(&status.stdout);
    assert!(status.contains("Policy:   0x"), "{}", status);
    assert!(status.contains("3 / 3 actions"), "{}", status);

    let session = Session::load(&config.session_file).unwrap();
    let ledger = serde_json::to_value(&session.ledger).unwrap();
    let counters: Vec<_> = ledger["counters"].as_object().unwrap().values().collect();
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0]["dayCount"], 3);
    assert_eq!(counters[0]["daySpend"], "3");
    assert_eq!(counters[0]["inFlight"], 0);

    // connect + sign + one decision per process, chained without a gap.
    assert_eq!(ActivityLog::verify_chain(&config.activity_log).unwrap(), 2 + PARALLEL);
}
