//! Loading fails fast when a configuration layer is malformed.

use std::ffi::OsString;
use std::fs;

use rstest::rstest;
use tempfile::TempDir;

use notedown_config::Config;
use ortho_config::OrthoConfig;

fn load_with_file(contents: &str) -> Result<Config, String> {
    let temp_dir = match TempDir::new() {
        Ok(dir) => dir,
        Err(error) => panic!("failed to create temporary directory: {error}"),
    };
    let path = temp_dir.path().join("notedown.toml");
    if let Err(error) = fs::write(&path, contents) {
        panic!("failed to write configuration: {error}");
    }

    let args = vec![
        OsString::from("notedown-client"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];
    Config::load_from_iter(args).map_err(|error| error.to_string())
}

#[rstest]
#[case::unterminated_table("[broken\n")]
#[case::wrong_type("request_timeout_ms = \"soon\"\n")]
#[case::unknown_log_format("log_format = \"xml\"\n")]
fn malformed_file_is_rejected(#[case] contents: &str) {
    assert!(load_with_file(contents).is_err());
}

#[rstest]
fn well_formed_file_loads() {
    let config = match load_with_file("server_command = \"notedown-dev\"\nlog_format = \"json\"\n") {
        Ok(config) => config,
        Err(error) => panic!("configuration should load: {error}"),
    };

    assert_eq!(config.server_command(), "notedown-dev");
    assert_eq!(config.log_format(), notedown_config::LogFormat::Json);
}

#[rstest]
fn loaded_zero_timeout_fails_validation() {
    let config = match load_with_file("request_timeout_ms = 0\n") {
        Ok(config) => config,
        Err(error) => panic!("configuration should load: {error}"),
    };

    assert!(config.validate().is_err());
}
