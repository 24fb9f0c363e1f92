//! Configuration validation rules.

use super::schema::Config;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["text", "json"];

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    let url = config.backend.api_server_url.trim();
    if url.is_empty() {
        errors.push("backend.api_server_url must not be empty".to_string());
    } else if !url.starts_with("http://") && !url.starts_with("https://") {
        errors.push("backend.api_server_url must start with http:// or https://".to_string());
    }
    if config.backend.request_timeout_secs == 0 {
        errors.push("backend.request_timeout_secs must be > 0".to_string());
    }
    if config.backend.status_timeout_secs == 0 {
        errors.push("backend.status_timeout_secs must be > 0".to_string());
    }

    if config.widget.welcome_message.trim().is_empty() {
        errors.push("widget.welcome_message must not be empty".to_string());
    }

    if config.site.origin.trim().is_empty() {
        errors.push("site.origin must not be empty".to_string());
    }

    if config.storage.dir.trim().is_empty() {
        errors.push("storage.dir must not be empty".to_string());
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(format!(
            "logging.level must be one of {}",
            LOG_LEVELS.join(", ")
        ));
    }
    if !LOG_FORMATS.contains(&config.logging.format.to_lowercase().as_str()) {
        errors.push("logging.format must be text or json".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_config(&Config::default()).unwrap();
    }

    #[test]
    fn test_validate_rejects_non_http_backend() {
        let mut config = Config::default();
        config.backend.api_server_url = "ftp://aida.example.com".to_string();

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("backend.api_server_url"));
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut config = Config::default();
        config.backend.request_timeout_secs = 0;
        config.site.origin = " ".to_string();
        config.logging.format = "xml".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("backend.request_timeout_secs"));
        assert!(err.contains("site.origin"));
        assert!(err.contains("logging.format"));
    }
}
