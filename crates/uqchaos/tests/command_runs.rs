//! End-to-end runs of a shell-script model through a run file

#![cfg(unix)]

use std::fs;
use std::path::Path;

use clap::Parser;
use tempfile::TempDir;
use uqchaos::{Args, YamlStore, execute};

/// Answers `U = [1, k]` on `t = [0, 1]`
const RUN_FILE: &str = r#"
name: ramp
model:
  name: ramp
  program: sh
  args:
    - "-c"
    - "sed 's/^{\"k\":\\([^,}]*\\).*$/{\"t\": [0, 1], \"U\": [1.0, \\1]}/'"
parameters:
  - name: k
    value: 1.0
    distribution: { type: Uniform, min: 0.5, max: 1.5 }
  - name: offset
    value: 2.0
features: [final_value]
analysis:
  mc_samples: 200
  pc_mc_samples: 2000
  seed: 3
"#;

fn write_run_file(dir: &Path) -> String {
    let path = dir.join("ramp.yaml");
    fs::write(&path, RUN_FILE).unwrap();
    path.display().to_string()
}

#[test]
fn test_polynomial_chaos_run_is_saved() {
    let dir = TempDir::new().unwrap();
    let run_file = write_run_file(dir.path());
    let out = dir.path().join("out");
    let args = Args::try_parse_from([
        "uqchaos",
        run_file.as_str(),
        "--output-dir",
        out.to_str().unwrap(),
        "--cpus",
        "2",
        "--quiet",
    ])
    .unwrap();

    let summary = execute(&args, dir.path()).unwrap();
    assert_eq!(summary.completed, vec!["ramp"]);
    assert!(summary.aborted.is_empty());

    let stored = YamlStore::new(&out).load("ramp").unwrap();
    assert_eq!(stored.uncertain_parameters, vec!["k"]);

    let direct = &stored.groups["direct_comparison"];
    assert_eq!(direct.t, Some(vec![0.0, 1.0]));
    assert!((direct.mean[0] - 1.0).abs() < 1e-9);
    assert!((direct.mean[1] - 1.0).abs() < 1e-6);
    assert!((direct.variance[1] - 1.0 / 12.0).abs() < 1e-6);

    let last = &stored.groups["final_value"];
    assert!((last.mean[0] - 1.0).abs() < 1e-6);
}

#[test]
fn test_single_parameter_monte_carlo_run() {
    let dir = TempDir::new().unwrap();
    let run_file = write_run_file(dir.path());
    let args = Args::try_parse_from([
        "uqchaos",
        run_file.as_str(),
        "--method",
        "mc",
        "--target",
        "single",
        "--quiet",
    ])
    .unwrap();

    let summary = execute(&args, dir.path()).unwrap();
    assert_eq!(summary.completed, vec!["ramp_single-parameter-k"]);

    let stored = YamlStore::new(dir.path().join("results"))
        .load("ramp_single-parameter-k")
        .unwrap();
    assert!(stored.sensitivity_ranking.is_empty());
    assert!(stored.groups["direct_comparison"].sensitivity.is_none());
}

#[test]
fn test_unknown_feature_fails_before_running() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, RUN_FILE.replace("[final_value]", "[curvature]")).unwrap();
    let args = Args::try_parse_from(["uqchaos", path.to_str().unwrap(), "--quiet"]).unwrap();

    assert!(execute(&args, dir.path()).is_err());
    assert!(!dir.path().join("results").exists());
}
