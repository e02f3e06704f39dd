use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{env_subst::substitute_env, schema::StethoConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["stetho.toml", "stetho.yaml", "stetho.yml", "stetho.json"];

/// Load config from the given path (any supported format), then apply env overrides.
pub fn load_config(path: &Path) -> anyhow::Result<StethoConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut config = parse_config(&raw, path)?;
    apply_env_overrides(&mut config, |k| std::env::var(k).ok());
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./stetho.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/stetho/stetho.{toml,yaml,yml,json}` (user-global)
///
/// Without a config file the defaults are used, still subject to env overrides,
/// so a bare `STETHO_EMAIL` + `STETHO_CLIENT_ID` environment is enough.
pub fn discover_and_load() -> anyhow::Result<StethoConfig> {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        return load_config(&path);
    }
    debug!("no config file found, using defaults");
    let mut config = StethoConfig::default();
    apply_env_overrides(&mut config, |k| std::env::var(k).ok());
    Ok(config)
}

fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/stetho/
    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: `~/.config/stetho/` on all platforms.
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".config").join("stetho"))
}

/// Default location of the persisted credentials.
pub fn default_store_path() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from(".stetho"))
        .join("credentials.json")
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

/// Override individual fields from `STETHO_*` variables.
fn apply_env_overrides(config: &mut StethoConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("STETHO_EMAIL") {
        config.account.email = v;
    }
    if let Some(v) = lookup("STETHO_CLIENT_ID") {
        config.account.client_id = v;
    }
    if let Some(v) = lookup("STETHO_BASE_URL") {
        config.api.base_url = v;
    }
    if let Some(v) = lookup("STETHO_MAC_ADDRESSES") {
        config.account.mac_addresses = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<StethoConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
