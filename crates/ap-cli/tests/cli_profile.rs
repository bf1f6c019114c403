use std::path::PathBuf;
use std::process::{Command, Output};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_astroprof"))
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn run_json(args: &[&str]) -> serde_json::Value {
    let out = run(args);
    assert!(
        out.status.success(),
        "{:?} should succeed, stderr={}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON")
}

#[test]
fn profile_contract() {
    let input = fixture_path("gas_cells.json");
    assert!(input.exists(), "missing fixture: {}", input.display());

    let v = run_json(&[
        "profile",
        "--input",
        input.to_string_lossy().as_ref(),
        "--x",
        "radius",
        "--y",
        "density",
        "pressure",
        "--n-bins",
        "6",
        "--range",
        "0",
        "1",
    ]);

    assert_eq!(v["schema_version"], "astroprof_profile_plot_v1");
    let panels = v["panels"].as_array().expect("panels should be array");
    assert_eq!(panels.len(), 2);
    for panel in panels {
        let series = panel["series"].as_array().unwrap();
        assert_eq!(series.len(), 1);
        let x = series[0]["x"].as_array().unwrap();
        assert_eq!(x.len(), 6);
        assert_eq!(x[0].as_f64(), Some(0.0));
        assert_eq!(panel["x_field"], "radius");
    }
}

#[test]
fn profile_is_deterministic() {
    let input = fixture_path("gas_cells.json");
    let args = [
        "profile",
        "--input",
        input.to_str().unwrap(),
        "--x",
        "density",
        "--y",
        "temperature",
        "--accumulation",
        "--chunk-size",
        "5",
    ];
    let mut a = run_json(&args);
    let mut b = run_json(&args);
    a.as_object_mut().unwrap().remove("meta");
    b.as_object_mut().unwrap().remove("meta");
    assert_eq!(a, b);

    let y = a["panels"][0]["series"][0]["y"].as_array().unwrap();
    let y: Vec<f64> = y.iter().map(|v| v.as_f64().unwrap()).collect();
    assert!(y.windows(2).all(|w| w[0] <= w[1]), "accumulated values must not decrease");
    assert_eq!(a["panels"][0]["x_scale"], "log");
}

#[test]
fn profile_from_config_writes_phase_artifact() {
    let input = fixture_path("gas_cells.json");
    let config = fixture_path("phase_request.json");
    let dir = std::env::temp_dir().join(format!("astroprof_cli_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let output = dir.join("phase.json");

    let out = run(&[
        "profile",
        "--input",
        input.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());

    let v: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&output).unwrap()).expect("output JSON");
    assert_eq!(v["schema_version"], "astroprof_phase_plot_v1");
    assert_eq!(v["x_edges"].as_array().unwrap().len(), 5);
    assert_eq!(v["y_edges"].as_array().unwrap().len(), 4);
    assert_eq!(v["panels"][0]["cmap"], "algae");
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn profile_errors_exit_non_zero() {
    let input = fixture_path("gas_cells.json");
    let out = run(&["profile", "--input", input.to_str().unwrap(), "--x", "radius", "--y", "nope"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("field not found: nope"));

    let out = run(&[
        "profile",
        "--input",
        input.to_str().unwrap(),
        "--x",
        "radius",
        "--y",
        "density",
        "--n-bins",
        "0",
    ]);
    assert!(!out.status.success());
}
