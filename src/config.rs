use crate::types::*;
use chrono::Local;
use std::{
  env,
  fs,
  io::Write,
  path::{Path, PathBuf},
  time::{SystemTime, UNIX_EPOCH},
};

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  match env_default("CONFIG_PATH") {
    Some(raw) => resolve_repo_path(&raw),
    None => repo_root().join("config.json"),
  }
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn env_flag_true(key: &str) -> bool {
  match env::var(key) {
    Ok(value) => {
      let value = value.trim().to_ascii_lowercase();
      matches!(value.as_str(), "1" | "true" | "yes" | "on")
    }
    Err(_) => false,
  }
}

pub fn apply_env_defaults(mut config: AppConfig) -> AppConfig {
  if config.startgg_token.trim().is_empty() {
    if let Some(value) = env_default("STARTGG_TOKEN") {
      config.startgg_token = value;
    }
  }
  if let Some(value) = env_default("STARTGG_BIND_ADDR") {
    config.bind_addr = value;
  }
  config
}

pub fn parse_config(data: &str) -> Result<AppConfig, String> {
  serde_json::from_str::<AppConfig>(data).map_err(|e| e.to_string())
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, String> {
  if !path.is_file() {
    return Ok(apply_env_defaults(AppConfig::default()));
  }
  let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config = parse_config(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  Ok(apply_env_defaults(config))
}

pub fn load_env_file() {
  let env_path = repo_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

pub fn now_secs() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs() as i64
}

pub fn startgg_log_path() -> PathBuf {
  repo_root().join("logs").join("startgg_api.log")
}

/// Raw request/response log, only written when `STARTGG_API_LOG` is set.
pub fn append_startgg_log(label: &str, payload: &str) {
  if !env_flag_true("STARTGG_API_LOG") {
    return;
  }
  let dir = repo_root().join("logs");
  if fs::create_dir_all(&dir).is_err() {
    return;
  }
  let path = startgg_log_path();
  let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
  let entry = format!("[{timestamp}] {label}\n{payload}\n\n");
  if let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(&path) {
    let _ = file.write_all(entry.as_bytes());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_editor_config_format() {
    let raw = r#"{
      "scrollSpeed": 1.5,
      "refreshIntervalMs": 5000,
      "event_slugs": {
        "Tekken": "tournament/tournament-template-3/event/tekken-singles",
        "Strive": "tournament/tournament-template-3/event/strive-singles"
      },
      "rotation": { "enabled": true, "intervalSeconds": 20, "order": ["Strive", "Tekken"] }
    }"#;
    let config = parse_config(raw).unwrap();
    assert_eq!(config.scroll_speed, 1.5);
    assert_eq!(config.refresh_interval_ms, 5000);
    assert_eq!(config.event_slugs.len(), 2);
    assert_eq!(
      config.event_slugs.get("Tekken").map(String::as_str),
      Some("tournament/tournament-template-3/event/tekken-singles")
    );
    assert!(config.rotation.enabled);
    assert_eq!(config.rotation.order, vec!["Strive", "Tekken"]);
    assert_eq!(config.per_page, STARTGG_SETS_PER_PAGE);
    assert_eq!(config.page_delay_ms, STARTGG_PAGE_DELAY_MS);
    assert_eq!(config.complexity_markers.len(), 2);
  }

  #[test]
  fn zero_max_pages_means_unbounded() {
    let config = parse_config(r#"{ "maxPages": 0, "perPage": 0 }"#).unwrap();
    let options = config.fetch_options();
    assert_eq!(options.max_pages, None);
    assert_eq!(options.per_page, 1);

    let config = parse_config(r#"{ "maxPages": 3, "forceLight": true }"#).unwrap();
    let options = config.fetch_options();
    assert_eq!(options.max_pages, Some(3));
    assert!(options.force_light);
  }

  #[test]
  fn malformed_config_is_an_error() {
    assert!(parse_config(r#"{ "refreshIntervalMs": "soon" }"#).is_err());
  }

  #[test]
  fn env_lines() {
    assert_eq!(
      parse_env_line("export STARTGG_TOKEN=\"abc\""),
      Some(("STARTGG_TOKEN".to_string(), "abc".to_string()))
    );
    assert_eq!(
      parse_env_line("STARTGG_BIND_ADDR=0.0.0.0:5000 # lan"),
      Some(("STARTGG_BIND_ADDR".to_string(), "0.0.0.0:5000".to_string()))
    );
    assert_eq!(parse_env_line("# comment"), None);
    assert_eq!(parse_env_line("=value"), None);
  }
}
