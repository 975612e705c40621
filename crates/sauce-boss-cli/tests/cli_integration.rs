use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};
use ulid::Ulid;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Ulid::new()));
    fs::create_dir_all(&dir)
        .unwrap_or_else(|err| panic!("failed to create temp dir {}: {err}", dir.display()));
    dir
}

fn run_sb<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_sb"))
        .args(args)
        .output()
        .unwrap_or_else(|err| panic!("failed to execute sb binary: {err}"))
}

fn run_json<I, S>(args: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = run_sb(args);
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "sb command failed (status={}):\nstdout:\n{}\nstderr:\n{}",
            output.status, stdout, stderr
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    serde_json::from_str(&stdout)
        .unwrap_or_else(|err| panic!("stdout is not valid JSON: {err}\nstdout:\n{stdout}"))
}

fn as_i64(value: &Value, key: &str) -> i64 {
    value
        .get(key)
        .and_then(Value::as_i64)
        .unwrap_or_else(|| panic!("missing integer field `{key}` in payload: {value}"))
}

fn as_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("missing string field `{key}` in payload: {value}"))
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap_or_else(|| panic!("path should be valid UTF-8: {}", path.display()))
}

fn write_request(dir: &Path, name: &str, envelope: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, envelope.to_string())
        .unwrap_or_else(|err| panic!("failed to write request {}: {err}", path.display()));
    path
}

fn launch_envelope(session_id: &str, locale: &str) -> Value {
    json!({
        "version": "1.0",
        "session": { "new": true, "sessionId": session_id },
        "request": { "type": "LaunchRequest", "requestId": "r1", "locale": locale }
    })
}

fn barbecue_envelope(session_id: &str) -> Value {
    json!({
        "version": "1.0",
        "session": { "new": false, "sessionId": session_id },
        "request": {
            "type": "IntentRequest",
            "requestId": "r2",
            "locale": "en-US",
            "intent": {
                "name": "RecipeIntent",
                "slots": {
                    "Item": {
                        "name": "Item",
                        "value": "barbecue",
                        "resolutions": { "resolutionsPerAuthority": [{
                            "authority": "amzn1.er-authority.echo-sdk.Item",
                            "status": { "code": "ER_SUCCESS_MATCH" },
                            "values": [{ "value": { "name": "barbecue", "id": "BBQ" } }]
                        }] }
                    }
                }
            }
        }
    })
}

#[test]
fn invoke_launch_prints_platform_envelope_with_session_attributes() {
    let dir = unique_temp_dir("sb-invoke");
    let request = write_request(&dir, "launch.json", &launch_envelope("cli-1", "en-US"));

    let response = run_json(["invoke", "--request", path_str(&request), "--seed", "7"]);
    assert_eq!(as_str(&response, "version"), "1.0");
    assert!(response.get("contract_version").is_none());

    let speech = response["response"]["outputSpeech"]["text"].as_str().unwrap_or_default();
    assert!(speech.starts_with("Welcome to Sauce Boss."), "unexpected speech: {speech}");
    assert_eq!(response["response"]["shouldEndSession"], false);
    assert!(response["sessionAttributes"]["actionable_history"].is_array());
}

#[test]
fn invoke_with_same_seed_is_reproducible() {
    let dir = unique_temp_dir("sb-seed");
    let request = write_request(&dir, "launch.json", &launch_envelope("cli-seed", "fr-FR"));

    let first = run_json(["invoke", "--request", path_str(&request), "--seed", "42"]);
    let second = run_json(["invoke", "--request", path_str(&request), "--seed", "42"]);
    assert_eq!(first, second);
}

#[test]
fn invoke_rejects_file_that_is_not_an_envelope() {
    let dir = unique_temp_dir("sb-bad-request");
    let request = write_request(&dir, "bad.json", &json!({ "hello": "world" }));

    let output = run_sb(["invoke", "--request", path_str(&request)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is not a request envelope"), "unexpected stderr: {stderr}");
}

#[test]
fn session_db_round_trip_persists_and_clears_state() {
    let dir = unique_temp_dir("sb-session");
    let db = dir.join("sessions.sqlite3");
    let launch = write_request(&dir, "launch.json", &launch_envelope("cli-2", "en-US"));
    let recipe = write_request(&dir, "recipe.json", &barbecue_envelope("cli-2"));

    let first = run_json([
        "--session-db",
        path_str(&db),
        "invoke",
        "--request",
        path_str(&launch),
    ]);
    assert!(first.get("sessionAttributes").is_none());

    let second = run_json([
        "--session-db",
        path_str(&db),
        "invoke",
        "--request",
        path_str(&recipe),
    ]);
    let speech = second["response"]["outputSpeech"]["text"].as_str().unwrap_or_default();
    assert!(speech.starts_with("Combine 1 cup of ketchup"), "unexpected speech: {speech}");
    assert_eq!(second["response"]["card"]["title"], "Sauce Boss - Recipe for Barbecue");

    let listed = run_json(["--session-db", path_str(&db), "session", "list"]);
    assert_eq!(as_str(&listed, "contract_version"), "cli.v1");
    assert_eq!(as_i64(&listed, "count"), 1);

    let shown =
        run_json(["--session-db", path_str(&db), "session", "show", "--session-id", "cli-2"]);
    assert_eq!(as_i64(&shown, "turn_count"), 2);
    let history = shown["state"]["actionable_history"].as_array().map(Vec::len);
    assert_eq!(history, Some(2));

    let cleared =
        run_json(["--session-db", path_str(&db), "session", "clear", "--session-id", "cli-2"]);
    assert_eq!(cleared["deleted"], true);

    let missing =
        run_sb(["--session-db", path_str(&db), "session", "show", "--session-id", "cli-2"]);
    assert!(!missing.status.success());
}

#[test]
fn session_purge_keeps_recently_active_sessions() {
    let dir = unique_temp_dir("sb-purge");
    let db = dir.join("sessions.sqlite3");
    let launch = write_request(&dir, "launch.json", &launch_envelope("cli-3", "de-DE"));
    run_json(["--session-db", path_str(&db), "invoke", "--request", path_str(&launch)]);

    let purged =
        run_json(["--session-db", path_str(&db), "session", "purge", "--idle-minutes", "60"]);
    assert_eq!(as_i64(&purged, "purged"), 0);

    let listed = run_json(["--session-db", path_str(&db), "session", "list"]);
    assert_eq!(as_i64(&listed, "count"), 1);
}

#[test]
fn session_commands_require_session_db() {
    let output = run_sb(["session", "list"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no session database configured"), "unexpected stderr: {stderr}");
}

#[test]
fn db_migrate_dry_run_then_apply() {
    let dir = unique_temp_dir("sb-db");
    let db = dir.join("sessions.sqlite3");

    let planned = run_json(["--session-db", path_str(&db), "db", "migrate", "--dry-run"]);
    assert_eq!(planned["dry_run"], true);
    assert_eq!(as_i64(&planned, "current_version"), 0);
    assert_eq!(planned["would_apply_versions"], json!([1]));

    let applied = run_json(["--session-db", path_str(&db), "db", "migrate"]);
    assert_eq!(as_i64(&applied, "after_version"), 1);
    assert_eq!(applied["up_to_date"], true);

    let status = run_json(["--session-db", path_str(&db), "db", "schema-version"]);
    assert_eq!(as_i64(&status, "current_version"), 1);
    assert_eq!(status["pending_versions"], json!([]));
    assert_eq!(status["up_to_date"], true);
}

#[test]
fn db_backup_writes_copy_of_session_database() {
    let dir = unique_temp_dir("sb-backup");
    let db = dir.join("sessions.sqlite3");
    let backup = dir.join("backup.sqlite3");
    let launch = write_request(&dir, "launch.json", &launch_envelope("cli-4", "en-GB"));
    run_json(["--session-db", path_str(&db), "invoke", "--request", path_str(&launch)]);

    let result =
        run_json(["--session-db", path_str(&db), "db", "backup", "--out", path_str(&backup)]);
    assert_eq!(as_str(&result, "status"), "ok");
    assert!(backup.exists());

    let listed = run_json(["--session-db", path_str(&backup), "session", "list"]);
    assert_eq!(as_i64(&listed, "count"), 1);
}

#[test]
fn recipes_lists_regional_bundle() {
    let listing = run_json(["recipes", "--locale", "fr-CA"]);
    assert_eq!(as_str(&listing, "contract_version"), "cli.v1");
    assert_eq!(as_str(&listing, "locale"), "fr-CA");
    let recipes = listing["recipes"].as_array().cloned().unwrap_or_default();
    assert_eq!(recipes.len(), 8);
    assert!(recipes.iter().all(|recipe| recipe["image_url"].is_string()));
}

#[test]
fn image_lookup_falls_back_to_default_for_unknown_codes() {
    let known = run_json(["image", "--id", "BBQ"]);
    assert_eq!(known["known"], true);
    assert_eq!(known["is_default"], false);
    assert!(as_str(&known, "image_url").ends_with("barbecue-sauce-500x500.png"));

    let unknown = run_json(["image", "--id", "KETCHUP"]);
    assert_eq!(unknown["known"], false);
    assert_eq!(unknown["is_default"], true);
    assert!(as_str(&unknown, "image_url").ends_with("secret-sauce-500x500.png"));
}
