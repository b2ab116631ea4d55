// whois-lookup/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread;
use tempfile::TempDir;

const REGISTERED: &str = "Domain Name: EXAMPLE.COM\r\nCreation Date: 1995-08-14T04:00:00Z\r\n\r\nNOTICE: terms\r\n";

/// Serve a fixed WHOIS answer on a background thread.
fn spawn_registry() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fixture");
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { return };
            let mut line = String::new();
            if BufReader::new(&stream).read_line(&mut line).is_err() {
                continue;
            }
            let body = if line.trim().eq_ignore_ascii_case("example.com") {
                REGISTERED.to_string()
            } else {
                format!("No match for \"{}\".\r\n", line.trim().to_uppercase())
            };
            let _ = stream.write_all(body.as_bytes());
        }
    });

    addr
}

/// Command isolated from the user's config files and WL_* variables.
fn whois_lookup(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("whois-lookup").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("RUST_LOG");
    for var in ["WL_TIMEOUT", "WL_RETRIES", "WL_ENCODING", "WL_CONCURRENCY", "WL_TLDS"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_flags() {
    let home = TempDir::new().unwrap();
    whois_lookup(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--tld"))
        .stdout(predicate::str::contains("--server"))
        .stdout(predicate::str::contains("--raw"))
        .stdout(predicate::str::contains("--encoding"));
}

#[test]
fn test_missing_domain_fails() {
    let home = TempDir::new().unwrap();
    whois_lookup(&home).assert().failure();
}

#[test]
fn test_conflicting_output_flags() {
    let home = TempDir::new().unwrap();
    whois_lookup(&home)
        .args(["example.com", "--raw", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot specify both --raw and --json"));
}

#[test]
fn test_invalid_server_flag() {
    let home = TempDir::new().unwrap();
    whois_lookup(&home)
        .args(["example.com", "--server", "whois.verisign-grs.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Use TLD=HOST"));
}

#[test]
fn test_invalid_config_file() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("broken.toml");
    std::fs::write(&path, "[batch]\nconcurrency = 500\n").unwrap();

    whois_lookup(&home)
        .args(["example.com", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config file"));
}

#[test]
fn test_single_lookup_json() {
    let home = TempDir::new().unwrap();
    let registry = spawn_registry();

    whois_lookup(&home)
        .args(["example.com", "--json", "--retries", "0", "--server"])
        .arg(format!("com={}", registry))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"registered\": true"))
        .stdout(predicate::str::contains("\"server\": \"127.0.0.1\""))
        .stdout(predicate::str::contains("1995-08-14T04:00:00Z"));
}

#[test]
fn test_direct_host_raw() {
    let home = TempDir::new().unwrap();
    let registry = spawn_registry();

    whois_lookup(&home)
        .args(["example.com", "--raw", "--host"])
        .arg(registry.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("NOTICE: terms"));
}

#[test]
fn test_batch_lookup_text() {
    let home = TempDir::new().unwrap();
    let registry = spawn_registry();

    whois_lookup(&home)
        .args(["example", "-t", "com,net", "--retries", "0"])
        .arg("--server")
        .arg(format!("com={}", registry))
        .arg("--server")
        .arg(format!("net={}", registry))
        .assert()
        .success()
        .stdout(predicate::str::contains("example.com"))
        .stdout(predicate::str::contains("example.net"))
        .stdout(predicate::str::contains("[2/2]"))
        .stdout(predicate::str::contains("1 registered"))
        .stdout(predicate::str::contains("1 not registered"));
}

#[test]
fn test_default_tlds_from_config() {
    let home = TempDir::new().unwrap();
    let registry = spawn_registry();
    std::fs::write(
        home.path().join("whois-lookup.toml"),
        format!(
            "[batch]\ntlds = [\"com\", \"org\"]\n\n[servers]\ncom = \"{0}\"\norg = \"{0}\"\n",
            registry
        ),
    )
    .unwrap();

    whois_lookup(&home)
        .args(["example", "--json", "--retries", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"domain_name\": \"example.org\""))
        .stdout(predicate::str::contains("\"status\": \"success\""));
}
