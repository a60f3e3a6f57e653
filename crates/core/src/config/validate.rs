use super::{types::Config, ConfigError};

/// Hard ceiling for a batch's worker pool.
const CONCURRENCY_CEILING: usize = 100;

/// Longest status record lifetime accepted (30 days).
const TTL_CEILING_SECS: u64 = 30 * 24 * 3600;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.controller.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "controller.base_url cannot be empty".to_string(),
        ));
    }

    let dispatcher = &config.dispatcher;
    if dispatcher.max_concurrency == 0 || dispatcher.max_concurrency > CONCURRENCY_CEILING {
        return Err(ConfigError::ValidationError(format!(
            "dispatcher.max_concurrency must be between 1 and {}",
            CONCURRENCY_CEILING
        )));
    }
    if dispatcher.default_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher.default_concurrency cannot be 0".to_string(),
        ));
    }

    if config.automation.max_scroll_iterations == 0 {
        return Err(ConfigError::ValidationError(
            "automation.max_scroll_iterations cannot be 0".to_string(),
        ));
    }
    if config.automation.step_deadline_ms == 0 {
        return Err(ConfigError::ValidationError(
            "automation.step_deadline_ms cannot be 0".to_string(),
        ));
    }
    if config.webdriver.command_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "webdriver.command_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.automation.default_target_count == 0 {
        return Err(ConfigError::ValidationError(
            "automation.default_target_count cannot be 0".to_string(),
        ));
    }

    if config.status.ttl_secs == 0 || config.status.ttl_secs > TTL_CEILING_SECS {
        return Err(ConfigError::ValidationError(format!(
            "status.ttl_secs must be between 1 and {}",
            TTL_CEILING_SECS
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_concurrency_bounds() {
        let mut config = Config::default();
        config.dispatcher.max_concurrency = 101;
        assert!(validate_config(&config).is_err());

        config.dispatcher.max_concurrency = 0;
        assert!(validate_config(&config).is_err());

        config.dispatcher.max_concurrency = 100;
        config.dispatcher.default_concurrency = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_automation_limits() {
        let mut config = Config::default();
        config.automation.max_scroll_iterations = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.automation.default_target_count = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.automation.step_deadline_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.webdriver.command_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_ttl_bounds() {
        let mut config = Config::default();
        config.status.ttl_secs = 0;
        assert!(validate_config(&config).is_err());

        config.status.ttl_secs = u64::MAX;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("status.ttl_secs"));

        config.status.ttl_secs = TTL_CEILING_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_controller_url() {
        let mut config = Config::default();
        config.controller.base_url = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("controller.base_url"));
    }
}
