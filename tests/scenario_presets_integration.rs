//! Runs the binary's in-process demo for each shipped scenario file.

use std::process::Command;

fn run_demo(args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_microgrid-sim"))
        .args(["demo", "--ticks", "150", "--start", "2024-06-03T10:00:00"])
        .args(args)
        .output()
        .expect("microgrid-sim process should run");

    assert!(
        output.status.success(),
        "demo failed for {args:?}: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout should be valid UTF-8")
}

#[test]
fn scenario_files_load_and_produce_reports() {
    for path in [
        "scenarios/baseline.toml",
        "scenarios/high_solar.toml",
        "scenarios/small_battery.toml",
    ] {
        let stdout = run_demo(&["--scenario", path]);
        assert!(stdout.contains("Data points analyzed:    150"), "{path}: {stdout}");
    }
}

#[test]
fn presets_change_the_outcome() {
    let baseline = run_demo(&["--preset", "baseline"]);
    let high_solar = run_demo(&["--preset", "high_solar"]);
    assert_ne!(baseline, high_solar);
}

#[test]
fn invalid_scenario_exits_non_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_microgrid-sim"))
        .args(["demo", "--scenario", "scenarios/does-not-exist.toml"])
        .output()
        .expect("microgrid-sim process should run");
    assert!(!output.status.success());
}
