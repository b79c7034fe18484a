use std::process::{Command, Output};

fn run_simulation(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "--quiet", "--"])
        .args(args)
        .env("RUST_LOG", "warn,intersection_sim=info")
        .output()
        .expect("Failed to execute simulation")
}

/// Pull the number following `label` out of a log line
fn parse_stat(stderr: &str, label: &str) -> f32 {
    let line = stderr
        .lines()
        .find(|line| line.contains(label))
        .unwrap_or_else(|| panic!("Could not find '{}' line", label));

    // Format: "[2025-11-17T17:10:52Z INFO  intersection_sim] Average wait: 1.25s"
    let parts: Vec<&str> = line.split(label).collect();
    parts
        .get(1)
        .map(|s| s.trim().trim_end_matches('s'))
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("Could not parse '{}' from line: {}", label, line))
}

/// Test that the simulation runs headless without crashing
#[test]
fn test_headless_simulation_runs() {
    let output = run_simulation(&["--ticks", "600", "--seed", "7", "--report-every", "0"]);

    assert!(
        output.status.success(),
        "Simulation failed to run. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
}

/// Test that the final statistics are logged
#[test]
fn test_simulation_statistics_logged() {
    let output = run_simulation(&["--ticks", "600", "--seed", "7", "--report-every", "0"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    for label in [
        "Elapsed time:",
        "Total vehicles spawned:",
        "Throughput (total):",
        "Throughput (per min):",
        "Average wait:",
        "Vehicles on road:",
        "Longest unserved:",
    ] {
        assert!(stderr.contains(label), "Missing '{}' statistic", label);
    }

    let spawned = parse_stat(&stderr, "Total vehicles spawned:");
    assert!(spawned > 0.0, "No vehicles were spawned during simulation");

    let elapsed = parse_stat(&stderr, "Elapsed time:");
    assert!((elapsed - 10.0).abs() < 0.1, "Unexpected elapsed time {}", elapsed);
}

/// Test that a manual emergency command preempts the signals
#[test]
fn test_manual_emergency_preempts() {
    let output = run_simulation(&[
        "--ticks",
        "600",
        "--spawn-chance",
        "0",
        "--emergency-at",
        "2.0",
        "--report-every",
        "0",
    ]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Emergency preemption"),
        "No preemption logged. stderr: {}",
        stderr
    );
    assert_eq!(parse_stat(&stderr, "Total vehicles spawned:"), 1.0);
}

/// Test that an invalid configuration is refused
#[test]
fn test_invalid_config_rejected() {
    let output = run_simulation(&["--ticks", "10", "--min-green", "40", "--max-green", "30"]);

    assert!(!output.status.success(), "Invalid config was accepted");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("min_green"),
        "Error does not name the bad option. stderr: {}",
        stderr
    );
}

/// Test that out-of-range durations are reported instead of panicking
#[test]
fn test_oversized_durations_rejected() {
    let output = run_simulation(&[
        "--ticks",
        "10",
        "--siren-rate",
        "0.5",
        "--siren-cooldown",
        "1e30",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "Oversized cooldown was accepted");
    assert!(!stderr.contains("panicked"), "Simulation panicked. stderr: {}", stderr);
    assert!(
        stderr.contains("--siren-cooldown"),
        "Error does not name the bad option. stderr: {}",
        stderr
    );

    let output = run_simulation(&["--ticks", "10", "--realtime", "--delta", "1e30"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "Oversized realtime delta was accepted");
    assert!(!stderr.contains("panicked"), "Simulation panicked. stderr: {}", stderr);
    assert!(
        stderr.contains("--delta"),
        "Error does not name the bad option. stderr: {}",
        stderr
    );
}

/// Test that prespawned vehicles show up in the spawn count
#[test]
fn test_prespawn_counts_as_spawned() {
    let output = run_simulation(&[
        "--ticks",
        "1",
        "--spawn-chance",
        "0",
        "--prespawn",
        "12",
        "--seed",
        "3",
        "--report-every",
        "0",
    ]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let spawned = parse_stat(&stderr, "Total vehicles spawned:");
    assert!(
        (1.0..=4.0).contains(&spawned),
        "Prespawn placed {} vehicles, expected one per free edge",
        spawned
    );
}
