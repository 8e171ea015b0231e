use std::process::Command;

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_agentcore-cli"))
        .args(args)
        .output()
        .expect("failed to run agentcore-cli binary")
}

#[test]
fn cli_help_succeeds() {
    let out = run_cli(&["--help"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("agentcore-cli"));
    assert!(stdout.contains("tool"));
}

#[test]
fn cli_tool_list_succeeds() {
    let out = run_cli(&["tool", "list"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(!stdout.trim().is_empty());
    assert!(stdout.lines().count() > 0);
}

#[test]
fn cli_tool_show_existing_succeeds() {
    let list_out = run_cli(&["tool", "list"]);
    assert!(list_out.status.success());
    let stdout = String::from_utf8_lossy(&list_out.stdout);
    let first_name = stdout
        .lines()
        .next()
        .and_then(|line| line.split('\t').next())
        .expect("tool list should print at least one tool");

    let out = run_cli(&["tool", "show", first_name]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("\"name\""));
    assert!(stdout.contains(first_name));
}

#[test]
fn cli_tool_show_missing_fails() {
    let out = run_cli(&["tool", "show", "no_such_tool"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("tool not found"));
}

#[test]
fn cli_chat_mock_prints_canned_response() {
    let out = run_cli(&["chat", "--mock", "hello there"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("mock response"));
}
