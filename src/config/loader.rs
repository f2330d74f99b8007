use std::path::Path;

use config::{Config, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::GatewayConfig;

/// Load configuration from a file using the config crate.
/// Supports multiple formats: TOML, YAML, JSON.
pub fn load_config(config_path: &str) -> Result<GatewayConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        _ => FileFormat::Toml,
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let gateway_config: GatewayConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(gateway_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_load_toml_config() {
        let toml_content = r#"
listen_addr = "127.0.0.1:8072"

[[routes]]
pattern = "/bank/accounts/(?<segment>.*)"
rewrite = "/${segment}"
service = "ACCOUNTS"

[services.ACCOUNTS]
base_url = "http://accounts:8080"

[breaker]
failure_threshold = 3
open_duration = "10s"

[rate_limits.sayHello]
requests = 2
period = "5s"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8072");
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].service, "ACCOUNTS");
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.rate_limits["sayHello"].requests, 2);
        // Defaults fill in whatever the file omits.
        assert_eq!(config.client.timeout, "2s");
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn test_load_yaml_config() {
        let yaml_content = r#"
listen_addr: "127.0.0.1:8072"
routes:
  - pattern: "/bank/loans/(?<segment>.*)"
    rewrite: "/${segment}"
    service: "LOANS"
services:
  LOANS:
    base_url: "http://loans:8080"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.services["LOANS"].base_url, "http://loans:8080");
        assert_eq!(config.breaker.failure_threshold, 5);
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(load_config("/nonexistent/bankgate.toml").is_err());
    }
}
