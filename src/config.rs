use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// When unset the access gate is disabled.
    pub access_password: Option<String>,
    pub auth_delay: Duration,
    pub font_dir: Option<PathBuf>,
    pub font_family: Option<String>,
    pub logo_path: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5002,
            access_password: None,
            auth_delay: Duration::from_millis(2000),
            font_dir: None,
            font_family: None,
            logo_path: PathBuf::from("static/logo.png"),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port: u16 = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| format!("PORT must be a port number, got {raw:?}"))?,
            None => defaults.port,
        };

        let access_password = lookup("ACCESS_PASSWORD").filter(|p| !p.is_empty());

        let auth_delay = lookup("AUTH_DELAY_MS")
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.auth_delay);

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let font_dir = lookup("FONT_DIR").map(PathBuf::from);
        let font_family = lookup("FONT_FAMILY").filter(|f| !f.is_empty());
        let logo_path = base_dir.join(
            lookup("LOGO_PATH").unwrap_or_else(|| "static/logo.png".to_string()),
        );

        let max_upload_bytes = lookup("MAX_UPLOAD_MB")
            .and_then(|raw| raw.parse::<usize>().ok())
            .and_then(|mb| mb.checked_mul(1024 * 1024))
            .unwrap_or(defaults.max_upload_bytes);

        Ok(Self {
            host,
            port,
            access_password,
            auth_delay,
            font_dir,
            font_family,
            logo_path,
            max_upload_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5002);
        assert!(config.access_password.is_none());
        assert_eq!(config.auth_delay, Duration::from_millis(2000));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.logo_path.ends_with("static/logo.png"));
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("ACCESS_PASSWORD", "letmein"),
            ("AUTH_DELAY_MS", "0"),
            ("FONT_DIR", "/opt/fonts"),
            ("MAX_UPLOAD_MB", "2"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.access_password.as_deref(), Some("letmein"));
        assert_eq!(config.auth_delay, Duration::ZERO);
        assert_eq!(config.font_dir, Some(PathBuf::from("/opt/fonts")));
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn empty_password_disables_gate() {
        let config = Config::from_lookup(lookup_from(&[("ACCESS_PASSWORD", "")])).unwrap();
        assert!(config.access_password.is_none());
    }

    #[test]
    fn oversized_upload_limit_falls_back_to_default() {
        let absurd = usize::MAX.to_string();
        let config = Config::from_lookup(lookup_from(&[("MAX_UPLOAD_MB", absurd.as_str())])).unwrap();
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);

        let config = Config::from_lookup(lookup_from(&[("MAX_UPLOAD_MB", "lots")])).unwrap();
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn invalid_port_is_an_error() {
        assert!(Config::from_lookup(lookup_from(&[("PORT", "not-a-port")])).is_err());
    }
}
