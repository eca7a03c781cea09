use super::{types::Config, ConfigError};
use crate::partition::PartitionCode;
use crate::CandidateKey;

/// Validate configuration.
///
/// Rejects option values that would make the harvest loop ill-defined
/// (zero concurrency, zero batch size, zero threshold, missing per-fetch
/// timeout) and malformed partition codes or probe keys.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let options = config.harvest.options();

    if options.concurrency == 0 {
        return Err(invalid("harvest.concurrency must be at least 1"));
    }
    if options.batch_size == 0 {
        return Err(invalid("harvest.batch_size must be at least 1"));
    }
    if options.failure_threshold == 0 {
        return Err(invalid("harvest.failure_threshold must be at least 1"));
    }
    if options.flush_every == 0 {
        return Err(invalid("harvest.flush_every must be at least 1"));
    }
    if options.per_fetch_timeout.is_zero() {
        return Err(invalid("harvest.per_fetch_timeout_ms cannot be 0"));
    }
    if options.retry_attempts == 0 {
        return Err(invalid("harvest.retry_attempts must be at least 1"));
    }
    if config.harvest.dry_run_keys == Some(0) {
        return Err(invalid("harvest.dry_run_keys cannot be 0"));
    }

    if let Some(codes) = &config.harvest.partitions {
        if codes.is_empty() {
            return Err(invalid("harvest.partitions cannot be empty"));
        }
        for code in codes {
            PartitionCode::new(code)
                .map_err(|e| ConfigError::ValidationError(format!("harvest.partitions: {}", e)))?;
        }
    }

    if let Some(key) = &config.harvest.probe_key {
        key.parse::<CandidateKey>()
            .map_err(|e| ConfigError::ValidationError(format!("harvest.probe_key: {}", e)))?;
    }

    if config.server.enabled && config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HarvestConfig, ServerConfig};

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let config = Config {
            harvest: HarvestConfig {
                concurrency: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let config = Config {
            harvest: HarvestConfig {
                per_fetch_timeout_ms: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("per_fetch_timeout_ms"));
    }

    #[test]
    fn test_validate_bad_partition_code_fails() {
        let config = Config {
            harvest: HarvestConfig {
                partitions: Some(vec!["01".to_string(), "66".to_string()]),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("66"));
    }

    #[test]
    fn test_validate_bad_probe_key_fails() {
        let config = Config {
            harvest: HarvestConfig {
                probe_key: Some("1000001".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_enabled_server_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                enabled: true,
                port: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
