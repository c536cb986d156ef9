//! Load config from file and environment.

use std::path::PathBuf;

use anyhow::Context;
use loc_core::{AdapterConfig, EventMask};
use serde::Deserialize;

use crate::logging::LoggingConfig;

/// Daemon configuration. File: ~/.config/locd/config.toml or /etc/locd/config.toml.
/// Env overrides: LOCD_BRIDGE_ADDR, LOCD_EVENT_MASK, LOCD_SYNC_TIMEOUT_MS, LOCD_LOG.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Bridge socket: `unix:/path` or `host:port` (default `unix:/run/locd/bridge.sock`).
    #[serde(default = "default_bridge_addr")]
    pub bridge_addr: String,
    /// Event classes requested on open.
    #[serde(default = "default_event_mask")]
    pub event_mask: EventMask,
    /// XTRA servers tried after the ones the engine reports.
    #[serde(default)]
    pub xtra_urls_fallback: Vec<String>,
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_bridge_addr() -> String {
    "unix:/run/locd/bridge.sock".to_string()
}
fn default_event_mask() -> EventMask {
    EventMask::PARSED_POSITION_REPORT
        | EventMask::SATELLITE_REPORT
        | EventMask::STATUS_REPORT
        | EventMask::NI_NOTIFY_VERIFY_REQUEST
        | EventMask::LOCATION_SERVER_REQUEST
        | EventMask::ASSISTANCE_DATA_REQUEST
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_addr: default_bridge_addr(),
            event_mask: default_event_mask(),
            xtra_urls_fallback: Vec::new(),
            adapter: AdapterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Load config: default, then the first config file found, then env vars.
pub fn load() -> anyhow::Result<Config> {
    let mut c = load_file()?.unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    Ok(c)
}

/// Apply `LOCD_*` overrides. Values that do not parse are ignored.
pub fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(addr) = var("LOCD_BRIDGE_ADDR") {
        c.bridge_addr = addr;
    }
    if let Some(bits) = var("LOCD_EVENT_MASK").and_then(|s| parse_u64(&s)) {
        c.event_mask = EventMask::from_bits_truncate(bits);
    }
    if let Some(ms) = var("LOCD_SYNC_TIMEOUT_MS").and_then(|s| s.parse::<u64>().ok()) {
        c.adapter.sync_timeout_ms = ms;
    }
    if let Some(level) = var("LOCD_LOG") {
        c.logging.level = level;
    }
}

fn parse_u64(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/locd/config.toml"));
    }
    out.push(PathBuf::from("/etc/locd/config.toml"));
    out
}

fn load_file() -> anyhow::Result<Option<Config>> {
    let Some(path) = config_paths().into_iter().find(|p| p.exists()) else {
        return Ok(None);
    };
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let c = parse(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(c))
}

pub fn parse(s: &str) -> anyhow::Result<Config> {
    Ok(toml::from_str::<Config>(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::collections::HashMap;

    #[test]
    fn empty_file_is_default() {
        let c = parse("").unwrap();
        assert_eq!(c.bridge_addr, "unix:/run/locd/bridge.sock");
        assert_eq!(c.event_mask, default_event_mask());
        assert!(c.xtra_urls_fallback.is_empty());
        assert_eq!(c.adapter, AdapterConfig::default());
    }

    #[test]
    fn sections_are_read() {
        let c = parse(
            r#"
bridge_addr = "127.0.0.1:7100"
event_mask = "PARSED_POSITION_REPORT | NMEA_1HZ_REPORT"
xtra_urls_fallback = ["https://xtra.example/xtra3grc.bin"]

[adapter]
sync_timeout_ms = 2500
xtra_part_len = 512

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(c.bridge_addr, "127.0.0.1:7100");
        assert_eq!(
            c.event_mask,
            EventMask::PARSED_POSITION_REPORT | EventMask::NMEA_1HZ_REPORT
        );
        assert_eq!(c.xtra_urls_fallback.len(), 1);
        assert_eq!(c.adapter.sync_timeout_ms, 2500);
        assert_eq!(c.adapter.part_len(), 512);
        assert_eq!(c.logging.level, "debug");
        assert_eq!(c.logging.format, LogFormat::Json);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse("proxy_port = 3128").is_err());
        assert!(parse("[adapter]\nretries = 3").is_err());
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LOCD_BRIDGE_ADDR", "unix:/tmp/bridge.sock"),
            ("LOCD_EVENT_MASK", "0x3"),
            ("LOCD_SYNC_TIMEOUT_MS", "not a number"),
            ("LOCD_LOG", "trace"),
        ]
        .into_iter()
        .collect();
        let mut c = Config::default();
        apply_env(&mut c, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.bridge_addr, "unix:/tmp/bridge.sock");
        assert_eq!(
            c.event_mask,
            EventMask::PARSED_POSITION_REPORT | EventMask::SATELLITE_REPORT
        );
        assert_eq!(c.adapter.sync_timeout_ms, 1000);
        assert_eq!(c.logging.level, "trace");
    }

    #[test]
    fn mask_accepts_decimal_and_hex() {
        assert_eq!(parse_u64("17"), Some(17));
        assert_eq!(parse_u64(" 0X1f "), Some(31));
        assert_eq!(parse_u64("x1f"), None);
    }
}
