mod common;

use std::fs;
use std::process::Command;

fn validation() -> Command {
    Command::new(env!("CARGO_BIN_EXE_validation"))
}

#[test]
fn test_no_arguments_prints_usage() {
    let output = validation().output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr was: {}", stderr);
    assert!(output.stdout.is_empty());
}

#[test]
fn test_too_many_arguments_prints_usage() {
    let output = validation()
        .args(["gtsrb", "results.txt", "extra"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr was: {}", stderr);
}

#[test]
fn test_missing_data_directory_fails() {
    let dir = common::create_temp_dir("cli_missing");

    let output = validation()
        .arg(dir.join("does-not-exist"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_results_are_written_to_output_file() {
    let dir = common::create_temp_dir("cli_output");
    let data = dir.join("gtsrb");
    common::write_sign_folder(&data, 3, 4);
    let results = dir.join("results.txt");

    let output = validation()
        .arg(&data)
        .arg(&results)
        .args(["--epochs", "1"])
        .env_remove("GTSRB_TEST_SIZE")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr was: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty());

    let text = fs::read_to_string(&results).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 16);
    assert_eq!(lines[0], "Evaluating Model 1");
    assert!(lines[1].starts_with("Accuracy for Model 1: "));
    assert_eq!(lines[14], "Evaluating Model 8");
    assert!(lines[15].starts_with("Accuracy for Model 8: "));

    fs::remove_dir_all(&dir).ok();
}

#[test]
#[ignore = "trains all eight architectures for the default epoch count, run with --release"]
fn test_default_run_prints_every_accuracy_to_stdout() {
    let dir = common::create_temp_dir("cli_stdout");
    let data = dir.join("gtsrb");
    common::write_sign_folder(&data, 5, 20);

    let output = validation()
        .arg(&data)
        .env_remove("GTSRB_EPOCHS")
        .env_remove("GTSRB_TEST_SIZE")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr was: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 16, "stdout was: {}", stdout);
    for (i, pair) in lines.chunks(2).enumerate() {
        let name = format!("Model {}", i + 1);
        assert_eq!(pair[0], format!("Evaluating {}", name));
        let accuracy: f32 = pair[1]
            .strip_prefix(&format!("Accuracy for {}: ", name))
            .unwrap()
            .parse()
            .unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
    }

    fs::remove_dir_all(&dir).ok();
}
