use barbershop::config::{Config, DEFAULT_MAX_LINE_BYTES};
use std::net::SocketAddr;

// Env-var tests share process state, so they run in one test body.
#[test]
fn config_from_env_applies_overrides_over_defaults() {
    unsafe {
        std::env::remove_var("BARBERSHOP_BIND");
        std::env::remove_var("BARBERSHOP_MAX_LINE_BYTES");
    }
    let defaults = Config::from_env().unwrap();
    assert_eq!(defaults.bind, "0.0.0.0:8002".parse::<SocketAddr>().unwrap());
    assert_eq!(defaults.max_line_bytes, DEFAULT_MAX_LINE_BYTES);

    unsafe {
        std::env::set_var("BARBERSHOP_BIND", "127.0.0.1:9100");
        std::env::set_var("BARBERSHOP_MAX_LINE_BYTES", "512");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.bind, "127.0.0.1:9100".parse::<SocketAddr>().unwrap());
    assert_eq!(config.max_line_bytes, 512);

    unsafe {
        std::env::set_var("BARBERSHOP_MAX_LINE_BYTES", "lots");
    }
    assert!(Config::from_env().is_err());

    // Clean up
    unsafe {
        std::env::remove_var("BARBERSHOP_BIND");
        std::env::remove_var("BARBERSHOP_MAX_LINE_BYTES");
    }
}

#[test]
fn config_from_toml_fills_missing_keys_with_defaults() {
    let config = Config::from_toml("bind = \"127.0.0.1:7000\"\n").unwrap();
    assert_eq!(config.bind, "127.0.0.1:7000".parse::<SocketAddr>().unwrap());
    assert_eq!(config.max_line_bytes, DEFAULT_MAX_LINE_BYTES);
    assert_eq!(config.log_level, "info");
    assert_eq!(config.otel_endpoint, None);
}

#[test]
fn config_from_toml_rejects_unknown_keys_and_bad_values() {
    assert!(Config::from_toml("port = 8002\n").is_err());
    assert!(Config::from_toml("bind = \"not an address\"\n").is_err());
    assert!(Config::from_toml("max_line_bytes = 1\n").is_err());
}

#[test]
fn config_from_file_reads_toml() {
    let path = std::env::temp_dir().join(format!("barbershop-config-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "max_line_bytes = 1024\nlog_level = \"debug\"\notel_endpoint = \"http://localhost:4317\"\n",
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.max_line_bytes, 1024);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));

    std::fs::remove_file(&path).ok();
    assert!(Config::from_file(&path).is_err());
}
