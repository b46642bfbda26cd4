use super::{load_settings_from, Settings};

use std::fs;

#[test]
fn missing_settings_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(&dir.path().join("absent.toml")).expect("settings");
    assert_eq!(settings.log_filter, Settings::default().log_filter);
}

#[test]
fn settings_file_overrides_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("server.toml");
    fs::write(
        &path,
        "bind_addr = \"0.0.0.0:9000\"\nlog_filter = \"debug,sqlx=warn\"\n",
    )
    .expect("write settings");

    let settings = load_settings_from(&path).expect("settings");
    assert_eq!(settings.bind_addr, "0.0.0.0:9000");
    assert_eq!(settings.log_filter, "debug,sqlx=warn");
}

#[test]
fn default_database_url_is_shared_with_storage() {
    assert_eq!(Settings::default().database_url, storage::DEFAULT_DATABASE_URL);
}
