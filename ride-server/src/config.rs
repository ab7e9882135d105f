//! Server configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::refresh::RefreshConfig;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;

/// Errors reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set (or set RIDE_MOCK_DATA to run against fixtures)")]
    Missing(&'static str),

    #[error("invalid {name}={value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSource {
    /// The hosted backend
    Live {
        url: String,
        api_key: String,
        timeout_secs: u64,
        /// Overrides the client's default checkout function path
        checkout_path: Option<String>,
    },
    /// JSON fixtures in a directory
    Mock(PathBuf),
}

/// Everything `main` needs to start the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub backend: BackendSource,
    pub bind_addr: SocketAddr,

    /// Externally visible base URL, used for checkout return links
    pub public_url: String,

    pub static_dir: PathBuf,
    pub refresh: RefreshConfig,
}

impl ServerConfig {
    /// Read configuration from process environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `SUPABASE_URL`, `SUPABASE_ANON_KEY` | required unless `RIDE_MOCK_DATA` is set |
    /// | `RIDE_MOCK_DATA` | unset (use the live backend) |
    /// | `RIDE_BIND_ADDR` | `127.0.0.1:3000` |
    /// | `RIDE_PUBLIC_URL` | `http://` + bind address |
    /// | `RIDE_REFRESH_SECS` | `60` |
    /// | `RIDE_STATIC_DIR` | `static` |
    /// | `RIDE_BACKEND_TIMEOUT_SECS` | `30` |
    /// | `RIDE_CHECKOUT_PATH` | the client's default |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match var("RIDE_MOCK_DATA") {
            Some(dir) => BackendSource::Mock(PathBuf::from(dir)),
            None => BackendSource::Live {
                url: var("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                api_key: var("SUPABASE_ANON_KEY").ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?,
                timeout_secs: match var("RIDE_BACKEND_TIMEOUT_SECS") {
                    Some(secs) => positive_secs("RIDE_BACKEND_TIMEOUT_SECS", secs)?,
                    None => DEFAULT_BACKEND_TIMEOUT_SECS,
                },
                checkout_path: var("RIDE_CHECKOUT_PATH"),
            },
        };

        let bind = var("RIDE_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            name: "RIDE_BIND_ADDR",
            value: bind.clone(),
            reason: e.to_string(),
        })?;

        let public_url = var("RIDE_PUBLIC_URL").unwrap_or_else(|| format!("http://{bind_addr}"));

        let mut refresh = RefreshConfig::default();
        if let Some(secs) = var("RIDE_REFRESH_SECS") {
            let secs = positive_secs("RIDE_REFRESH_SECS", secs)?;
            refresh = refresh.with_interval(Duration::from_secs(secs));
        }

        let static_dir = PathBuf::from(var("RIDE_STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()));

        Ok(Self {
            backend,
            bind_addr,
            public_url,
            static_dir,
            refresh,
        })
    }
}

fn positive_secs(name: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected a positive number of seconds".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_with_live_backend() {
        let cfg = config(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
        ])
        .unwrap();
        assert_eq!(
            cfg.backend,
            BackendSource::Live {
                url: "https://abc.supabase.co".into(),
                api_key: "anon".into(),
                timeout_secs: 30,
                checkout_path: None,
            }
        );
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(cfg.public_url, "http://127.0.0.1:3000");
        assert_eq!(cfg.refresh.interval, Duration::from_secs(60));
        assert_eq!(cfg.static_dir, PathBuf::from("static"));
    }

    #[test]
    fn mock_data_needs_no_credentials() {
        let cfg = config(&[("RIDE_MOCK_DATA", "data"), ("RIDE_REFRESH_SECS", "5")]).unwrap();
        assert_eq!(cfg.backend, BackendSource::Mock(PathBuf::from("data")));
        assert_eq!(cfg.refresh.interval, Duration::from_secs(5));
    }

    #[test]
    fn live_backend_overrides() {
        let cfg = config(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("RIDE_BACKEND_TIMEOUT_SECS", "5"),
            ("RIDE_CHECKOUT_PATH", "functions/v1/subscribe"),
        ])
        .unwrap();
        let BackendSource::Live {
            timeout_secs,
            checkout_path,
            ..
        } = cfg.backend
        else {
            panic!("expected the live backend");
        };
        assert_eq!(timeout_secs, 5);
        assert_eq!(checkout_path.as_deref(), Some("functions/v1/subscribe"));

        let err = config(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("RIDE_BACKEND_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RIDE_BACKEND_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn missing_credentials() {
        let err = config(&[("SUPABASE_URL", "https://abc.supabase.co"), ("SUPABASE_ANON_KEY", " ")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SUPABASE_ANON_KEY")));
    }

    #[test]
    fn invalid_values() {
        let err = config(&[("RIDE_MOCK_DATA", "data"), ("RIDE_BIND_ADDR", "localhost")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RIDE_BIND_ADDR", .. }));

        let err = config(&[("RIDE_MOCK_DATA", "data"), ("RIDE_REFRESH_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RIDE_REFRESH_SECS", .. }));
    }
}
