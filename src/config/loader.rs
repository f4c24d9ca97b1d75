use crate::config::schema::CrawlerConfig;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use validator::Validate;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<CrawlerConfig> {
        let path = path.as_ref();
        let config = Self::load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<CrawlerConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content, path.extension().and_then(|ext| ext.to_str()))
            .map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
                other => other,
            })
    }

    /// Parses configuration text in the format named by `extension`.
    pub fn parse(content: &str, extension: Option<&str>) -> Result<CrawlerConfig> {
        match extension {
            Some("json") => Ok(serde_json::from_str(content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(content)?),
            Some("toml") => Ok(toml::from_str(content)?),
            Some(other) => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                other
            ))),
            None => Err(Error::Config("Missing file extension".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Mode;
    use std::io::Write;

    fn write_config(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn yaml_config_fills_defaults() {
        let file = write_config(
            ".yaml",
            "mode: both\nbackend:\n  base_url: http://localhost\n",
        );
        let config = ConfigLoader::load(file.path()).unwrap();

        assert_eq!(config.mode, Mode::Both);
        assert_eq!(config.full.max_categories, 6);
        assert_eq!(config.lite.max_categories, 2);
        assert_eq!(config.full.poll_delay_ms, 100);
        assert_eq!(config.full.idle_wait_secs, 600);
        assert_eq!(config.marketplace.base_url, "https://buff.163.com");
        assert!(config.full.reset_accounts_on_start);
    }

    #[test]
    fn toml_and_json_are_accepted() {
        let toml = write_config(
            ".toml",
            "mode = \"lite\"\n[backend]\nbase_url = \"http://backend:8080\"\n[lite]\nproxies = [\"http://p:1\"]\n",
        );
        let config = ConfigLoader::load(toml.path()).unwrap();
        assert_eq!(config.mode, Mode::Lite);
        assert_eq!(config.lite.proxies, vec!["http://p:1".to_string()]);

        let json = write_config(
            ".json",
            r#"{"backend": {"base_url": "http://backend"}, "full": {"max_in_flight": 4}}"#,
        );
        let config = ConfigLoader::load(json.path()).unwrap();
        assert_eq!(config.mode, Mode::Full);
        assert_eq!(config.full.max_in_flight, 4);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let file = write_config(
            ".yaml",
            "backend:\n  base_url: not a url\nfull:\n  max_in_flight: 0\n",
        );
        let err = ConfigLoader::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = write_config(".ini", "backend = x");
        let err = ConfigLoader::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn explicit_token_wins_over_env() {
        let config = ConfigLoader::parse(
            "backend:\n  base_url: http://localhost\n  token: abc\n  token_env: MARKET_CRAWLER_TEST_UNSET\n",
            Some("yaml"),
        )
        .unwrap();
        assert_eq!(config.backend.resolve_token().as_deref(), Some("abc"));
    }
}
