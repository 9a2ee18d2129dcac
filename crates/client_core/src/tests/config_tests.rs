use super::*;

use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings =
        load_settings_from(&dir.path().join(CONFIG_FILE), env_from(&[])).expect("settings");
    assert_eq!(settings, ClientSettings::default());
}

#[test]
fn file_values_are_overridden_by_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);
    fs::write(
        &path,
        "api_base_url = \"http://search.internal:9000/\"\ntop_k = 8\nalpha = 0.25\n",
    )
    .expect("write config");

    let from_file = load_settings_from(&path, env_from(&[])).expect("settings");
    assert_eq!(from_file.api_base_url, "http://search.internal:9000");
    assert_eq!(from_file.top_k, Some(8));
    assert_eq!(from_file.alpha, Some(0.25));

    let overridden = load_settings_from(
        &path,
        env_from(&[
            ("API_BASE_URL", "http://ignored:1"),
            ("APP__API_BASE_URL", "https://rag.example.com/api/"),
            ("APP__TOP_K", "3"),
        ]),
    )
    .expect("settings");
    assert_eq!(overridden.api_base_url, "https://rag.example.com/api");
    assert_eq!(overridden.top_k, Some(3));
    assert_eq!(overridden.alpha, Some(0.25));
}

#[test]
fn unparseable_numeric_env_values_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(
        &dir.path().join(CONFIG_FILE),
        env_from(&[("APP__TOP_K", "many"), ("APP__ALPHA", "half")]),
    )
    .expect("settings");
    assert_eq!(settings.top_k, None);
    assert_eq!(settings.alpha, None);
}

#[test]
fn malformed_config_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, "api_base_url = [").expect("write config");

    let err = load_settings_from(&path, env_from(&[])).expect_err("must fail");
    assert!(err.to_string().contains("failed to parse"));
}

#[test]
fn normalize_base_url_rejects_non_http_schemes() {
    assert!(matches!(
        normalize_base_url("ftp://files.example.com"),
        Err(ConfigError::InvalidBaseUrl { .. })
    ));
    assert!(normalize_base_url("not a url").is_err());
    assert_eq!(
        normalize_base_url("   ").expect("empty falls back"),
        DEFAULT_API_BASE_URL
    );
}

#[test]
fn query_options_mirror_settings() {
    let settings = ClientSettings {
        top_k: Some(10),
        alpha: Some(0.7),
        ..ClientSettings::default()
    };
    let options = settings.query_options();
    assert_eq!(options.top_k, Some(10));
    assert_eq!(options.alpha, Some(0.7));
}
