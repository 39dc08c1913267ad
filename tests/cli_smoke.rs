use std::process::Command;

#[test]
fn help_displays_overview() {
    let binary = env!("CARGO_BIN_EXE_pairs-analytics");
    let output = Command::new(binary)
        .arg("--help")
        .output()
        .expect("invoke pairs-analytics --help");

    assert!(output.status.success(), "help command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Real-time pairs trading analytics"),
        "expected overview text in help output"
    );
    for command in ["run", "simulate", "stats", "tail", "chart", "export"] {
        assert!(stdout.contains(command), "expected `{command}` in help output");
    }
}

#[test]
fn invalid_window_is_reported() {
    let binary = env!("CARGO_BIN_EXE_pairs-analytics");
    let store = std::env::temp_dir().join(format!("pairs-cli-smoke-{}.ndjson", std::process::id()));
    let output = Command::new(binary)
        .args(["--store"])
        .arg(&store)
        .args(["stats", "--window", "1"])
        .output()
        .expect("invoke pairs-analytics stats");

    assert!(!output.status.success(), "window below range must fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rolling window 1 outside [5, 100]"), "stderr: {stderr}");
    let _ = std::fs::remove_file(&store);
}
