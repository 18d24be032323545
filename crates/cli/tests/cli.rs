use assert_cmd::Command;

fn bookindex() -> Command {
    let mut cmd = Command::cargo_bin("bookindex").unwrap();
    cmd.env_remove("RUST_LOG").env("BOOKINDEX_ENV", "local");
    cmd
}

fn config_dir(name: &str, base: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("bookindex-cli-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("base.toml"), base).unwrap();
    dir
}

#[test]
fn help_lists_subcommands() {
    let output = bookindex().arg("--help").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["serve", "verify", "search"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn verify_passes_in_embedded_mode() {
    let dir = config_dir("verify", "[telemetry]\nfilter = \"warn\"\n");
    let output = bookindex()
        .env("BOOKINDEX_CONFIG_DIR", &dir)
        .args(["verify", "--embedded"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("found 2 by author"));
}

#[test]
fn unreachable_collaborator_fails() {
    let dir = config_dir(
        "unreachable",
        "[search]\nhost = \"127.0.0.1\"\nport = 1\nrequest_timeout_ms = 2000\n",
    );
    bookindex()
        .env("BOOKINDEX_CONFIG_DIR", &dir)
        .args(["search", "--author", "Douglas"])
        .assert()
        .failure();
}

#[test]
fn search_requires_author() {
    bookindex().arg("search").assert().failure();
}
