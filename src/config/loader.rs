//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{ProxyConfig, RouteConfig};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value:?}")]
    Env { name: String, value: String },
}

/// Load configuration: built-in defaults, then the optional TOML file,
/// then environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Recognized variables:
/// - `<NAME>_TARGET_URL` for every route (`ANIME_TARGET_URL`, `MOVIES_TARGET_URL`, ...)
/// - `DEFAULT_TARGET_URL` for the default route
/// - `PUBLIC_ORIGIN`
/// - `PORT` (replaces the port of the bind address)
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for route in config.routes.iter_mut() {
        override_upstream(route, &lookup);
    }
    if let Some(url) = lookup("DEFAULT_TARGET_URL").filter(|v| !v.is_empty()) {
        config.default_route.upstream = url;
    }

    if let Some(origin) = lookup("PUBLIC_ORIGIN").filter(|v| !v.is_empty()) {
        config.public_origin = Some(origin);
    }

    if let Some(port) = lookup("PORT") {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            name: "PORT".to_string(),
            value: port.clone(),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    Ok(())
}

fn override_upstream<F>(route: &mut RouteConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = env_var_name(&route.name);
    if let Some(url) = lookup(&var).filter(|v| !v.is_empty()) {
        tracing::debug!(route = %route.name, var = %var, "Upstream overridden from environment");
        route.upstream = url;
    }
}

/// `movies` -> `MOVIES_TARGET_URL`, `tv-shows` -> `TV_SHOWS_TARGET_URL`.
pub fn env_var_name(route_name: &str) -> String {
    let stem: String = route_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}_TARGET_URL", stem)
}
