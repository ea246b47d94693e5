//! Checks that run the real binary against a throwaway config, covering
//! behavior that lives in `main` rather than the library.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn write_config(dir: &Path, base_url: &str) -> PathBuf {
    let config_path = dir.join("config.yaml");
    let data_dir = dir.join("data");
    fs::write(
        &config_path,
        format!(
            "app:\n  data_dir: \"{}\"\n  page_size: 10\n\ncatalog:\n  base_url: \"{}\"\n",
            data_dir.display(),
            base_url
        ),
    )
    .unwrap();
    config_path
}

fn stockroom(config: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stockroom"));
    cmd.arg("--config").arg(config);
    cmd.env_remove("DATABASE_URL").env_remove("RUST_LOG");
    cmd
}

#[test]
fn failed_list_prints_a_retry_banner() {
    let dir = tempfile::tempdir().unwrap();
    // Nothing listens on port 1, so the fetch fails immediately.
    let config = write_config(dir.path(), "http://127.0.0.1:1");

    let output = stockroom(&config).arg("list").output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error loading products"), "stderr: {stderr}");
    assert!(stderr.contains("rerun the command"), "stderr: {stderr}");
    assert!(stderr.contains("failed to fetch products"), "stderr: {stderr}");
}

#[test]
fn rm_refuses_without_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "http://127.0.0.1:1");

    let output = stockroom(&config).args(["rm", "5"]).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--yes"), "stderr: {stderr}");
}
