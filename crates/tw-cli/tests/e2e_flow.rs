//! End-to-end tests driving the `tw` binary against a temporary database.
//!
//! Tests the full pipeline: import → track → history/stats → export

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn tw_binary() -> String {
    env!("CARGO_BIN_EXE_tw").to_string()
}

const BUNDLE: &str = r#"{
  "activities": [
    {
      "id": "a1",
      "label": "Writing",
      "category": "professional",
      "priority": "high",
      "cognitiveLoad": "intense",
      "dailyMax": 120,
      "sessionMax": 50
    },
    {
      "id": "a2",
      "label": "Gardening",
      "category": "personal",
      "priority": "low",
      "cognitiveLoad": "light",
      "archived": true
    }
  ],
  "logs": [
    {
      "id": "s1",
      "activityId": "a1",
      "sessionStart": 1721034000000,
      "sessionEnd": 1721035800000,
      "intervals": [
        { "start": 1721034000000, "end": 1721035800000, "duration": 1800 }
      ],
      "totalDuration": 1800,
      "autoStopped": false
    }
  ],
  "userConfig": { "weekStart": "monday" }
}"#;

/// Builds a `tw` command isolated in `temp`.
fn tw(temp: &Path) -> Command {
    let mut command = Command::new(tw_binary());
    command
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join("config"))
        .env("XDG_DATA_HOME", temp.join("data"))
        .env("TW_DATABASE_PATH", temp.join("tw.db"));
    command
}

fn run_ok(temp: &Path, args: &[&str]) -> String {
    let output = tw(temp).args(args).output().expect("failed to run tw");
    assert_success(&output, args);
    String::from_utf8(output.stdout).unwrap()
}

fn assert_success(output: &Output, args: &[&str]) {
    assert!(
        output.status.success(),
        "tw {} should succeed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn import_fixture(temp: &Path) {
    let file = temp.join("bundle.json");
    std::fs::write(&file, BUNDLE).unwrap();
    let stdout = run_ok(temp, &["import", file.to_str().unwrap()]);
    assert_eq!(stdout.trim(), "Imported 2 activities and 1 sessions");
}

#[test]
fn test_import_then_query() {
    let temp = TempDir::new().unwrap();
    import_fixture(temp.path());

    let history: serde_json::Value =
        serde_json::from_str(&run_ok(temp.path(), &["history", "--json"])).unwrap();
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["label"], "Writing");
    assert_eq!(entries[0]["totalDuration"], 1800);

    let stats: serde_json::Value =
        serde_json::from_str(&run_ok(temp.path(), &["stats", "weekly", "--json"])).unwrap();
    assert_eq!(stats["period"], "weekly");
    assert_eq!(stats["labels"].as_array().unwrap().len(), 8);

    let activities: serde_json::Value =
        serde_json::from_str(&run_ok(temp.path(), &["activities", "--json"])).unwrap();
    assert_eq!(activities.as_array().unwrap().len(), 2);

    let status = run_ok(temp.path(), &["status"]);
    assert!(status.contains("Activities: 2 (1 archived)"), "{status}");
    assert!(status.contains("Sessions: 1"), "{status}");
}

#[test]
fn test_export_round_trips_through_import() {
    let temp = TempDir::new().unwrap();
    import_fixture(temp.path());
    let exported = run_ok(temp.path(), &["export"]);

    let other = TempDir::new().unwrap();
    let mut child = tw(other.path())
        .args(["import", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(exported.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert_success(&output, &["import", "-"]);

    assert_eq!(run_ok(other.path(), &["export"]), exported);
}

#[test]
fn test_plan_and_csv_export() {
    let temp = TempDir::new().unwrap();
    import_fixture(temp.path());

    let plan: serde_json::Value =
        serde_json::from_str(&run_ok(temp.path(), &["plan", "2024-07-15", "--json"])).unwrap();
    assert_eq!(plan["structure"]["workWindowEnd"], "16:30");
    assert_eq!(plan["plannedMinutes"], 120);
    assert_eq!(plan["status"], "feasible");

    let csv = run_ok(temp.path(), &["export", "--csv"]);
    assert_eq!(
        csv,
        "\"Session ID\",\"Activity ID\",\"Start\",\"End\",\"Total Seconds\"\n\
         \"s1\",\"a1\",\"2024-07-15T09:00:00.000Z\",\"2024-07-15T09:30:00.000Z\",\"1800\"\n"
    );
}

#[test]
fn test_out_of_range_work_target_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("huge.json");
    std::fs::write(&file, r#"{"userConfig": {"dailyWorkTargets": {"monday": 1e300}}}"#).unwrap();
    let output = tw(temp.path())
        .args(["import", file.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    run_ok(temp.path(), &["stats", "weekly"]);
}

#[test]
fn test_invalid_bundle_leaves_data_untouched() {
    let temp = TempDir::new().unwrap();
    import_fixture(temp.path());

    let file = temp.path().join("bad.json");
    std::fs::write(&file, r#"{"activities": [{"id": "x"}]}"#).unwrap();
    let output = tw(temp.path())
        .args(["import", file.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let history: serde_json::Value =
        serde_json::from_str(&run_ok(temp.path(), &["history", "--json"])).unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[test]
fn test_track_stop_from_stdin() {
    let temp = TempDir::new().unwrap();
    import_fixture(temp.path());

    let mut child = tw(temp.path())
        .args(["track", "writing"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"s\n").unwrap();
    let output = child.wait_with_output().unwrap();
    assert_success(&output, &["track", "writing"]);

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Tracking Writing (limit 50m)\n"), "{stdout}");
    assert!(stdout.contains("Saved Writing: 00:00:0"), "{stdout}");

    let history: serde_json::Value =
        serde_json::from_str(&run_ok(temp.path(), &["history", "--json"])).unwrap();
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[test]
fn test_track_rejects_archived_and_unknown() {
    let temp = TempDir::new().unwrap();
    import_fixture(temp.path());

    for query in ["a2", "cooking"] {
        let output = tw(temp.path())
            .args(["track", query])
            .stdin(Stdio::null())
            .output()
            .unwrap();
        assert!(!output.status.success(), "track {query} should fail");
    }
}
