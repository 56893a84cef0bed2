// tests/config.rs

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use symwatch::cli::CliArgs;
use symwatch::config::{ConfigFile, RawConfigFile, WatcherSection, load_and_validate};
use symwatch::{WatchError, WatcherOptions, effective_options};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn parse(toml_src: &str) -> Result<ConfigFile, WatchError> {
    let raw: RawConfigFile = toml::from_str(toml_src)?;
    ConfigFile::try_from(raw)
}

#[test]
fn empty_file_uses_defaults() -> TestResult {
    let cfg = parse("")?;

    assert!(cfg.paths.is_empty());
    assert_eq!(cfg.watcher, WatcherSection::default());
    assert_eq!(cfg.options(), WatcherOptions::default());
    Ok(())
}

#[test]
fn full_file_is_parsed() -> TestResult {
    let cfg = parse(
        r#"
        paths = ["/etc/app/config.yaml", "secrets/token"]

        [watcher]
        callback_threads = 8
        shutdown_timeout_secs = 3
        poll_interval_ms = 250
        "#,
    )?;

    assert_eq!(
        cfg.paths,
        vec![
            PathBuf::from("/etc/app/config.yaml"),
            PathBuf::from("secrets/token")
        ]
    );
    let options = cfg.options();
    assert_eq!(options.callback_threads, 8);
    assert_eq!(options.shutdown_timeout, Duration::from_secs(3));
    assert_eq!(options.poll_interval, Duration::from_millis(250));
    Ok(())
}

#[test]
fn zero_values_are_rejected() {
    for (src, needle) in [
        ("[watcher]\ncallback_threads = 0", "callback_threads"),
        ("[watcher]\nshutdown_timeout_secs = 0", "shutdown_timeout_secs"),
        ("[watcher]\npoll_interval_ms = 0", "poll_interval_ms"),
    ] {
        match parse(src) {
            Err(WatchError::ConfigError(msg)) => assert!(msg.contains(needle), "{msg}"),
            other => panic!("expected config error for {src:?}, got {other:?}"),
        }
    }
}

#[test]
fn blank_path_is_rejected() {
    let err = parse(r#"paths = ["/ok", "  "]"#).unwrap_err();
    assert!(matches!(err, WatchError::ConfigError(ref msg) if msg.contains("paths[1]")));
}

#[test]
fn unknown_keys_are_rejected() {
    let err = parse("[watcher]\nthreads = 2").unwrap_err();
    assert!(matches!(err, WatchError::TomlError(_)));
}

#[test]
fn load_and_validate_reads_from_disk() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("Symwatch.toml");
    fs::write(&path, "paths = [\"/etc/hosts\"]\n[watcher]\ncallback_threads = 2\n")?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.paths, vec![PathBuf::from("/etc/hosts")]);
    assert_eq!(cfg.watcher.callback_threads, 2);
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here/Symwatch.toml").unwrap_err();
    assert!(matches!(err, WatchError::IoError(_)));
}

#[test]
fn cli_flags_override_the_config_file() -> TestResult {
    let cfg = parse("[watcher]\ncallback_threads = 8\nshutdown_timeout_secs = 30")?;
    let args = CliArgs::try_parse_from([
        "symwatch",
        "--callback-threads",
        "3",
        "--log-level",
        "debug",
        "/tmp/a",
    ])?;

    let options = effective_options(Some(&cfg), &args)?;

    assert_eq!(options.callback_threads, 3);
    assert_eq!(options.shutdown_timeout, Duration::from_secs(30));
    assert_eq!(args.paths, vec![PathBuf::from("/tmp/a")]);
    Ok(())
}

#[test]
fn zero_cli_threads_is_rejected() -> TestResult {
    let args = CliArgs::try_parse_from(["symwatch", "--callback-threads", "0", "/tmp/a"])?;
    assert!(effective_options(None, &args).is_err());
    Ok(())
}
