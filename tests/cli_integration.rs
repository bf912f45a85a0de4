//! Integration tests for the `gl` CLI.
//!
//! Each test creates a temp project directory, runs `gl` as a subprocess,
//! and verifies stdout and/or file contents.

use std::fs;
use std::path::Path;
use std::process::Command;

use pretty_assertions::assert_eq;
use serde_json::Value;

/// Run `gl` with the given args in the given directory, returning (stdout, stderr, success).
fn run_gl(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_gl"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run gl");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `gl` expecting success, return stdout.
fn run_gl_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_gl(dir, args);
    if !success {
        panic!(
            "gl {:?} failed:\nstdout: {}\nstderr: {}",
            args, stdout, stderr
        );
    }
    stdout
}

/// Run `gl` expecting failure, return stderr.
fn run_gl_err(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_gl(dir, args);
    if success {
        panic!("gl {:?} unexpectedly succeeded:\nstdout: {}", args, stdout);
    }
    stderr
}

/// Run with --json and parse stdout
fn run_gl_json(dir: &Path, args: &[&str]) -> Value {
    let mut full = args.to_vec();
    full.push("--json");
    let out = run_gl_ok(dir, &full);
    serde_json::from_str(&out).unwrap()
}

/// `gl add` prints the new id on its own line
fn add(dir: &Path, args: &[&str]) -> String {
    let mut full = vec!["add"];
    full.extend_from_slice(args);
    run_gl_ok(dir, &full).trim().to_string()
}

fn new_project() -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().unwrap();
    run_gl_ok(tmp.path(), &["init"]);
    tmp
}

fn project_json(dir: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(dir.join("gantt.json")).unwrap()).unwrap()
}

fn task_json<'a>(project: &'a Value, id: &str) -> &'a Value {
    project["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == id)
        .unwrap_or_else(|| panic!("task {} missing", id))
}

fn parent_of(dir: &Path, id: &str) -> Option<String> {
    task_json(&project_json(dir), id)["parent"]
        .as_str()
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Project setup
// ---------------------------------------------------------------------------

#[test]
fn test_init_creates_files() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_gl_ok(tmp.path(), &["init"]);
    assert!(out.contains("Initialized"));
    assert!(tmp.path().join("gantt.json").exists());
    assert!(tmp.path().join("gantt.toml").exists());

    let err = run_gl_err(tmp.path(), &["init"]);
    assert!(err.starts_with("error: a project already exists"));
    run_gl_ok(tmp.path(), &["init", "--force"]);
}

#[test]
fn test_not_a_project() {
    let tmp = tempfile::TempDir::new().unwrap();
    let err = run_gl_err(tmp.path(), &["list"]);
    assert!(err.contains("error: not a gantt project"));
}

#[test]
fn test_project_dir_flag_and_discovery() {
    let tmp = new_project();
    let nested = tmp.path().join("docs").join("plans");
    fs::create_dir_all(&nested).unwrap();

    add(&nested, &["From below"]);
    let outside = tempfile::TempDir::new().unwrap();
    let dir = tmp.path().to_str().unwrap();
    let out = run_gl_ok(outside.path(), &["-C", dir, "list"]);
    assert!(out.contains("From below"));
}

#[test]
fn test_config_sets_default_color() {
    let tmp = new_project();
    fs::write(
        tmp.path().join("gantt.toml"),
        "[colors]\ntask = \"#123456\"\n",
    )
    .unwrap();
    let id = add(tmp.path(), &["Colored"]);
    assert_eq!(task_json(&project_json(tmp.path()), &id)["color"], "#123456");
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

#[test]
fn test_list_and_show() {
    let tmp = new_project();
    assert_eq!(run_gl_ok(tmp.path(), &["list"]).trim(), "no tasks");

    let phase = add(tmp.path(), &["Phase", "--type", "summary"]);
    let build = add(
        tmp.path(),
        &["Build", "--parent", &phase, "--start", "2025-03-03", "--end", "2025-03-07"],
    );

    let out = run_gl_ok(tmp.path(), &["list"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Phase"));
    assert!(lines[1].starts_with("  "));
    assert!(lines[1].contains("Build  2025-03-03 → 2025-03-07 (5d)"));

    // ids may be abbreviated
    let out = run_gl_ok(tmp.path(), &["show", &build[..8]]);
    assert!(out.contains("Build"));
    assert!(out.contains("parent:"));

    let detail = run_gl_json(tmp.path(), &["show", &phase]);
    assert_eq!(detail["type"], "summary");
    assert_eq!(detail["startDate"], "2025-03-03");
    assert_eq!(detail["children"], serde_json::json!([build]));
}

#[test]
fn test_list_json_levels() {
    let tmp = new_project();
    let phase = add(tmp.path(), &["Phase", "--type", "summary"]);
    add(tmp.path(), &["Child", "--parent", &phase]);

    let rows = run_gl_json(tmp.path(), &["list"]);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["level"], 0);
    assert_eq!(rows[1]["level"], 1);
    assert_eq!(rows[1]["parent"], phase.as_str());
}

#[test]
fn test_collapse_hides_children() {
    let tmp = new_project();
    let phase = add(tmp.path(), &["Phase", "--type", "summary"]);
    add(tmp.path(), &["Hidden child", "--parent", &phase]);

    let out = run_gl_ok(tmp.path(), &["collapse", &phase]);
    assert!(out.starts_with("collapsed"));
    assert!(!run_gl_ok(tmp.path(), &["list"]).contains("Hidden child"));
    assert!(run_gl_ok(tmp.path(), &["list", "--all"]).contains("Hidden child"));

    run_gl_ok(tmp.path(), &["collapse", &phase, "--open"]);
    assert!(run_gl_ok(tmp.path(), &["list"]).contains("Hidden child"));
    // view state is not undoable
    let history = run_gl_json(tmp.path(), &["history"]);
    assert_eq!(history["undo"].as_array().unwrap().len(), 2);
}

#[test]
fn test_show_not_found() {
    let tmp = new_project();
    let err = run_gl_err(tmp.path(), &["show", "nope"]);
    assert!(err.contains("task not found: nope"));
}

#[test]
fn test_check_reports_hand_edited_problems() {
    let tmp = new_project();
    let report = run_gl_json(tmp.path(), &["check"]);
    assert_eq!(report["valid"], true);

    fs::write(
        tmp.path().join("gantt.json"),
        r#"{
  "tasks": [
    { "id": "m", "name": "Gate", "type": "milestone", "startDate": "2025-01-01", "endDate": "2025-01-01", "order": 0 },
    { "id": "c", "name": "Under gate", "parent": "m", "order": 1 },
    { "id": "d", "name": "Lost", "parent": "gone", "order": 2 }
  ]
}"#,
    )
    .unwrap();

    let report = run_gl_json(tmp.path(), &["check"]);
    assert_eq!(report["valid"], false);
    let kinds: Vec<&str> = report["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"milestone_parent"));
    assert!(kinds.contains(&"dangling_parent"));

    let out = run_gl_ok(tmp.path(), &["check"]);
    assert!(out.contains("✗ chart has errors"));
}

// ---------------------------------------------------------------------------
// Write commands and undo across invocations
// ---------------------------------------------------------------------------

#[test]
fn test_update_cascades_to_summary() {
    let tmp = new_project();
    let s = add(tmp.path(), &["S", "--type", "summary"]);
    add(
        tmp.path(),
        &["C1", "--parent", &s, "--start", "2025-01-01", "--end", "2025-01-03"],
    );
    let c2 = add(
        tmp.path(),
        &["C2", "--parent", &s, "--start", "2025-01-10", "--end", "2025-01-12"],
    );

    let out = run_gl_ok(tmp.path(), &["update", &c2, "--end", "2025-01-15"]);
    assert_eq!(out.trim(), "Update task \"C2\"");
    let project = project_json(tmp.path());
    assert_eq!(task_json(&project, &s)["endDate"], "2025-01-15");
    assert_eq!(task_json(&project, &s)["duration"], 15);

    run_gl_ok(tmp.path(), &["undo"]);
    let project = project_json(tmp.path());
    assert_eq!(task_json(&project, &s)["endDate"], "2025-01-12");
    assert_eq!(task_json(&project, &c2)["endDate"], "2025-01-12");
}

#[test]
fn test_update_rejects_inverted_dates() {
    let tmp = new_project();
    let a = add(
        tmp.path(),
        &["A", "--start", "2025-01-05", "--end", "2025-01-06"],
    );
    let before = fs::read_to_string(tmp.path().join("gantt.json")).unwrap();
    let err = run_gl_err(tmp.path(), &["update", &a, "--end", "2025-01-01"]);
    assert!(err.contains("is before start date"));
    assert_eq!(fs::read_to_string(tmp.path().join("gantt.json")).unwrap(), before);

    let err = run_gl_err(tmp.path(), &["update", &a]);
    assert!(err.contains("nothing to update"));
}

#[test]
fn test_indent_outdent_round_trip() {
    let tmp = new_project();
    let a = add(
        tmp.path(),
        &["A", "--start", "2025-01-01", "--end", "2025-01-05"],
    );
    let b = add(
        tmp.path(),
        &["B", "--start", "2025-01-06", "--end", "2025-01-10"],
    );
    let initial = project_json(tmp.path());

    run_gl_ok(tmp.path(), &["indent", &b]);
    assert_eq!(parent_of(tmp.path(), &b), Some(a.clone()));

    run_gl_ok(tmp.path(), &["outdent", &b]);
    assert_eq!(parent_of(tmp.path(), &b), None);

    run_gl_ok(tmp.path(), &["undo"]);
    assert_eq!(parent_of(tmp.path(), &b), Some(a.clone()));
    run_gl_ok(tmp.path(), &["undo"]);
    assert_eq!(project_json(tmp.path())["tasks"], initial["tasks"]);

    let out = run_gl_ok(tmp.path(), &["redo"]);
    assert_eq!(out.trim(), "redo: Indent task \"B\"");
    assert_eq!(parent_of(tmp.path(), &b), Some(a));
}

#[test]
fn test_indent_past_max_depth_is_rejected() {
    let tmp = new_project();
    let top = add(tmp.path(), &["Top", "--type", "summary"]);
    let mid = add(tmp.path(), &["Mid", "--type", "summary", "--parent", &top]);
    add(tmp.path(), &["Leaf one", "--parent", &mid]);
    let leaf = add(tmp.path(), &["Leaf two", "--parent", &mid]);

    let history_before = run_gl_json(tmp.path(), &["history"]);
    let err = run_gl_err(tmp.path(), &["indent", &leaf]);
    assert!(err.starts_with("error: "));
    assert_eq!(run_gl_json(tmp.path(), &["history"]), history_before);
    assert_eq!(parent_of(tmp.path(), &leaf), Some(mid));
}

#[test]
fn test_group_and_ungroup() {
    let tmp = new_project();
    let a = add(
        tmp.path(),
        &["A", "--start", "2025-01-01", "--end", "2025-01-05"],
    );
    let b = add(
        tmp.path(),
        &["B", "--start", "2025-01-06", "--end", "2025-01-10"],
    );

    let group = run_gl_ok(tmp.path(), &["group", &a, &b]).trim().to_string();
    let project = project_json(tmp.path());
    let g = task_json(&project, &group);
    assert_eq!(g["type"], "summary");
    assert_eq!(g["name"], "New Group");
    assert_eq!(g["startDate"], "2025-01-01");
    assert_eq!(g["endDate"], "2025-01-10");
    assert_eq!(parent_of(tmp.path(), &a), Some(group.clone()));
    assert_eq!(parent_of(tmp.path(), &b), Some(group.clone()));

    run_gl_ok(tmp.path(), &["ungroup", &group]);
    let project = project_json(tmp.path());
    assert_eq!(project["tasks"].as_array().unwrap().len(), 2);
    assert_eq!(parent_of(tmp.path(), &a), None);
    assert_eq!(parent_of(tmp.path(), &b), None);

    let err = run_gl_err(tmp.path(), &["ungroup", &a]);
    assert!(err.contains("no summary tasks with children"));
}

#[test]
fn test_group_with_mixed_parents_is_rejected() {
    let tmp = new_project();
    let s = add(tmp.path(), &["S", "--type", "summary"]);
    let inner = add(tmp.path(), &["Inner", "--parent", &s]);
    let outer = add(tmp.path(), &["Outer"]);

    let err = run_gl_err(tmp.path(), &["group", &inner, &outer]);
    assert!(err.contains("must share the same parent"));
}

#[test]
fn test_ungroup_removes_links_and_undo_restores_them() {
    let tmp = new_project();
    let a = add(tmp.path(), &["A"]);
    let b = add(tmp.path(), &["B"]);
    let other = add(tmp.path(), &["Other"]);
    let group = run_gl_ok(tmp.path(), &["group", &a, &b]).trim().to_string();

    run_gl_ok(tmp.path(), &["link", &group, &other, "--kind", "ss"]);
    let project = project_json(tmp.path());
    assert_eq!(project["dependencies"].as_array().unwrap().len(), 1);
    assert_eq!(project["dependencies"][0]["kind"], "start_to_start");

    run_gl_ok(tmp.path(), &["ungroup", &group]);
    assert!(project_json(tmp.path())["dependencies"].as_array().unwrap().is_empty());

    run_gl_ok(tmp.path(), &["undo"]);
    let project = project_json(tmp.path());
    assert_eq!(project["dependencies"].as_array().unwrap().len(), 1);
    assert_eq!(parent_of(tmp.path(), &a), Some(group));
}

#[test]
fn test_link_and_unlink() {
    let tmp = new_project();
    let a = add(tmp.path(), &["A"]);
    let b = add(tmp.path(), &["B"]);

    let err = run_gl_err(tmp.path(), &["link", &a, &a]);
    assert!(err.contains("cannot be linked to itself"));

    let link = run_gl_ok(tmp.path(), &["link", &a, &b]).trim().to_string();
    assert!(run_gl_ok(tmp.path(), &["show", &a]).contains("FS A → B"));
    run_gl_ok(tmp.path(), &["unlink", &link[..8]]);
    assert!(project_json(tmp.path())["dependencies"].as_array().unwrap().is_empty());
}

#[test]
fn test_cascade_delete_and_undo() {
    let tmp = new_project();
    let p = add(tmp.path(), &["Parent", "--type", "summary"]);
    let c1 = add(tmp.path(), &["C1", "--type", "summary", "--parent", &p]);
    add(tmp.path(), &["C2", "--parent", &p]);
    add(tmp.path(), &["G", "--parent", &c1]);
    let keep = add(tmp.path(), &["Keep"]);
    let before = project_json(tmp.path());

    let out = run_gl_ok(tmp.path(), &["delete", &p, "--cascade"]);
    assert_eq!(out.trim(), "Delete \"Parent\" and 3 subtasks");
    let project = project_json(tmp.path());
    let ids: Vec<&str> = project["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![keep.as_str()]);

    run_gl_ok(tmp.path(), &["undo"]);
    assert_eq!(project_json(tmp.path())["tasks"], before["tasks"]);
}

#[test]
fn test_delete_without_cascade_promotes_children() {
    let tmp = new_project();
    let p = add(tmp.path(), &["Parent", "--type", "summary"]);
    let c = add(tmp.path(), &["Child", "--parent", &p]);

    run_gl_ok(tmp.path(), &["delete", &p]);
    assert_eq!(parent_of(tmp.path(), &c), None);
}

#[test]
fn test_move_reorders() {
    let tmp = new_project();
    let a = add(tmp.path(), &["A"]);
    add(tmp.path(), &["B"]);
    let c = add(tmp.path(), &["C"]);

    run_gl_ok(tmp.path(), &["move", &c, &a]);
    let rows = run_gl_json(tmp.path(), &["list"]);
    let names: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["C", "A", "B"]);
}

#[test]
fn test_insert_above_and_below() {
    let tmp = new_project();
    let r = add(
        tmp.path(),
        &["Ref", "--start", "2025-02-10", "--end", "2025-02-12"],
    );

    let above = run_gl_ok(tmp.path(), &["insert", "above", &r, "--count", "2"]);
    let above: Vec<&str> = above.lines().collect();
    assert_eq!(above.len(), 2);
    let below = run_gl_ok(tmp.path(), &["insert", "below", &r]).trim().to_string();

    let project = project_json(tmp.path());
    assert_eq!(task_json(&project, above[1])["endDate"], "2025-02-09");
    assert_eq!(task_json(&project, &below)["startDate"], "2025-02-13");

    let rows = run_gl_json(tmp.path(), &["list"]);
    let ids: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![above[0], above[1], r.as_str(), below.as_str()]);

    let err = run_gl_err(tmp.path(), &["insert", "below", &r, "--count", "3"]);
    assert!(err.contains("only supported with `insert above`"));
}

#[test]
fn test_drag_shifts_dates_as_one_command() {
    let tmp = new_project();
    let a = add(
        tmp.path(),
        &["A", "--start", "2025-01-01", "--end", "2025-01-02"],
    );
    let b = add(
        tmp.path(),
        &["B", "--start", "2025-01-05", "--end", "2025-01-06"],
    );

    let out = run_gl_ok(tmp.path(), &["drag", &a, &b, "--days", "-2"]);
    assert_eq!(out.trim(), "Move 2 tasks");
    let project = project_json(tmp.path());
    assert_eq!(task_json(&project, &a)["startDate"], "2024-12-30");
    assert_eq!(task_json(&project, &b)["endDate"], "2025-01-04");

    run_gl_ok(tmp.path(), &["undo"]);
    let project = project_json(tmp.path());
    assert_eq!(task_json(&project, &a)["startDate"], "2025-01-01");
    assert_eq!(task_json(&project, &b)["endDate"], "2025-01-06");

    let undated = add(tmp.path(), &["Undated"]);
    let err = run_gl_err(tmp.path(), &["drag", &undated, "--days", "1"]);
    assert!(err.contains("has no dates to shift"));
}

#[test]
fn test_history_and_empty_undo() {
    let tmp = new_project();
    assert_eq!(run_gl_ok(tmp.path(), &["undo"]).trim(), "nothing to undo");
    assert_eq!(run_gl_ok(tmp.path(), &["history"]).trim(), "no history");

    add(tmp.path(), &["First"]);
    add(tmp.path(), &["Second"]);
    run_gl_ok(tmp.path(), &["undo"]);

    let history = run_gl_json(tmp.path(), &["history"]);
    assert_eq!(history["undo"][0]["description"], "Add task \"First\"");
    assert_eq!(history["undo"][0]["kind"], "ADD_TASK");
    assert_eq!(history["redo"][0]["description"], "Add task \"Second\"");

    // a new change drops the redo branch
    add(tmp.path(), &["Third"]);
    let history = run_gl_json(tmp.path(), &["history"]);
    assert!(history["redo"].as_array().unwrap().is_empty());
    assert_eq!(run_gl_ok(tmp.path(), &["redo"]).trim(), "nothing to redo");
}

#[test]
fn test_add_under_milestone_is_rejected() {
    let tmp = new_project();
    let m = add(
        tmp.path(),
        &["Gate", "--type", "milestone", "--start", "2025-04-01"],
    );
    let err = run_gl_err(tmp.path(), &["add", "Child", "--parent", &m]);
    assert!(err.contains("cannot have children"));

    let project = project_json(tmp.path());
    assert_eq!(task_json(&project, &m)["endDate"], "2025-04-01");
    assert_eq!(task_json(&project, &m)["duration"], 0);
}
