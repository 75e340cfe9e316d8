#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const LAB: &str = r#"
lab_name: cli-lab
subnet: 10.0.0.0/24
ipa_deployments:
  - name: d1
    domain: d1.test
    cluster:
      servers:
        - name: s1
          capabilities: [DNS]
      clients:
        - name: c1
"#;

fn write_lab(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("lab.yaml");
    fs::write(&path, contents).unwrap();
    path
}

fn ipalab() -> Command {
    let mut cmd = Command::cargo_bin("ipalab-config").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("IPALAB_DISTRO");
    cmd
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    ipalab()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("FreeIPA lab"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--playbook"))
        .stdout(predicate::str::contains("--distro"))
        .stdout(predicate::str::contains("--mount-varlog"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    ipalab()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ipalab-config"));
}

/// 設定ファイルがない場合はエラー終了する
#[test]
fn test_missing_config() {
    ipalab()
        .arg("/nonexistent/lab.yaml")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("Configuration file not found"));
}

/// 出力ディレクトリに全ファイルが書き出される
#[test]
fn test_generate_lab() {
    let work = TempDir::new().unwrap();
    let config = write_lab(work.path(), LAB);
    let out = work.path().join("out");

    ipalab()
        .arg(&config)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Lab configuration written to"));

    for file in [
        "compose.yml",
        "inventory.yml",
        "requirements.yml",
        "hosts",
        "containerfiles/fedora",
        "playbooks/install-cluster.yml",
    ] {
        assert!(out.join(file).is_file(), "missing {}", file);
    }

    let compose = fs::read_to_string(out.join("compose.yml")).unwrap();
    assert!(compose.starts_with("name: cli-lab\n"));
    assert!(compose.contains("ipv4_address: 10.0.0.2"));

    let inventory = fs::read_to_string(out.join("inventory.yml")).unwrap();
    assert!(inventory.starts_with("cli_lab:\n"));
    assert!(inventory.contains("ipaserver_setup_dns: true"));

    let hosts = fs::read_to_string(out.join("hosts")).unwrap();
    assert!(hosts.contains("s1.d1.test"));
    assert!(hosts.contains("c1.d1.test"));
}

/// 重複したデプロイメント名はエラーになり、何も書き出さない
#[test]
fn test_duplicate_deployment() {
    let work = TempDir::new().unwrap();
    let config = write_lab(
        work.path(),
        r#"
lab_name: dup
ipa_deployments:
  - name: d1
    cluster: {servers: [{name: a}]}
  - name: d1
    cluster: {servers: [{name: b}]}
"#,
    );
    let out = work.path().join("out");

    ipalab()
        .arg(&config)
        .arg("-o")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Deployment names must be unique"));
    assert!(!out.exists());
}

/// -p で指定したディレクトリのプレイブックが追加される
#[test]
fn test_playbook_directory() {
    let work = TempDir::new().unwrap();
    let config = write_lab(work.path(), LAB);
    let plays = work.path().join("plays");
    fs::create_dir_all(plays.join("nested")).unwrap();
    fs::write(plays.join("site.yml"), "---\n").unwrap();
    fs::write(plays.join("nested/extra.yaml"), "---\n").unwrap();
    let out = work.path().join("out");

    ipalab()
        .arg(&config)
        .arg("-o")
        .arg(&out)
        .arg("-p")
        .arg(&plays)
        .assert()
        .success();

    assert!(out.join("playbooks/site.yml").is_file());
    assert!(out.join("playbooks/extra.yaml").is_file());
}

/// -f で指定した Containerfile が containerfiles/ に追加される
#[test]
fn test_extra_containerfile() {
    let work = TempDir::new().unwrap();
    let config = write_lab(work.path(), LAB);
    let containerfile = work.path().join("rocky");
    fs::write(&containerfile, "FROM rockylinux:9\n").unwrap();
    let out = work.path().join("out");

    ipalab()
        .arg(&config)
        .arg("-o")
        .arg(&out)
        .arg("-f")
        .arg(&containerfile)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(out.join("containerfiles/rocky")).unwrap(),
        "FROM rockylinux:9\n"
    );
}

/// -d はラボ記述に distro がない場合の既定値になる
#[test]
fn test_distro_default() {
    let work = TempDir::new().unwrap();
    let config = write_lab(work.path(), LAB);
    let out = work.path().join("out");

    ipalab()
        .arg(&config)
        .arg("-o")
        .arg(&out)
        .arg("-d")
        .arg("c10s:stream")
        .assert()
        .success();

    let compose = fs::read_to_string(out.join("compose.yml")).unwrap();
    assert!(compose.contains("dockerfile: c10s"));
    assert!(compose.contains("tag: stream"));
}

/// 不正な distro 指定はエラーになる
#[test]
fn test_invalid_distro() {
    let work = TempDir::new().unwrap();
    let config = write_lab(work.path(), LAB);

    ipalab()
        .arg(&config)
        .arg("-o")
        .arg(work.path().join("out"))
        .arg("-d")
        .arg("fedora/rawhide")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid distro"));
}

/// -l で全ノードのログディレクトリが作成される
#[test]
fn test_mount_varlog() {
    let work = TempDir::new().unwrap();
    let config = write_lab(work.path(), LAB);
    let out = work.path().join("out");

    ipalab()
        .arg(&config)
        .arg("-o")
        .arg(&out)
        .arg("-l")
        .assert()
        .success();

    assert!(out.join("logs/s1").is_dir());
    assert!(out.join("logs/c1").is_dir());
    let compose = fs::read_to_string(out.join("compose.yml")).unwrap();
    assert!(compose.contains("/var/log"));
}
