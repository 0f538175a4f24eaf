//! 配置模块：聚合限流、熔断与流桥接配置，支持 YAML 与环境变量覆盖。
//!
//! # Configuration
//!
//! [`ResilienceConfig`] bundles the settings of all three guards. Sources, in
//! increasing precedence:
//!
//! 1. Built-in defaults (20 rpm, burst 5, threshold 5, 30 s recovery, 60 s chunk timeout, queue 64)
//! 2. A YAML document ([`ResilienceConfig::from_yaml_str`] / [`from_yaml_file`](ResilienceConfig::from_yaml_file))
//! 3. Environment variables ([`ResilienceConfig::apply_env_overrides`])
//!
//! | Variable | Field |
//! |----------|-------|
//! | `NT_RATE_LIMIT_RPM` | `rate_limit.requests_per_minute` |
//! | `NT_RATE_LIMIT_BURST` | `rate_limit.burst_size` |
//! | `NT_BREAKER_FAILURE_THRESHOLD` | `circuit_breaker.failure_threshold` |
//! | `NT_BREAKER_RECOVERY_SECS` | `circuit_breaker.recovery_timeout` |
//! | `NT_STREAM_CHUNK_TIMEOUT_MS` | `bridge.chunk_timeout` |
//! | `NT_STREAM_QUEUE_CAPACITY` | `bridge.queue_capacity` |
//!
//! ```yaml
//! rate_limit:
//!   requests_per_minute: 20
//!   burst_size: 5
//! circuit_breaker:
//!   failure_threshold: 5
//!   recovery_timeout: 30      # seconds
//! bridge:
//!   queue_capacity: 64
//!   chunk_timeout: 60         # seconds
//! ```

use crate::bridge::BridgeConfig;
use crate::resilience::{CircuitBreakerConfig, RateLimitConfig};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_RATE_LIMIT_RPM: &str = "NT_RATE_LIMIT_RPM";
pub const ENV_RATE_LIMIT_BURST: &str = "NT_RATE_LIMIT_BURST";
pub const ENV_BREAKER_FAILURE_THRESHOLD: &str = "NT_BREAKER_FAILURE_THRESHOLD";
pub const ENV_BREAKER_RECOVERY_SECS: &str = "NT_BREAKER_RECOVERY_SECS";
pub const ENV_STREAM_CHUNK_TIMEOUT_MS: &str = "NT_STREAM_CHUNK_TIMEOUT_MS";
pub const ENV_STREAM_QUEUE_CAPACITY: &str = "NT_STREAM_QUEUE_CAPACITY";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub bridge: BridgeConfig,
}

impl ResilienceConfig {
    /// Parse and validate a YAML document. Missing sections keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(yaml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                "failed to read configuration file",
                ErrorContext::new()
                    .with_details(format!("{}: {}", path.display(), e))
                    .with_source("config"),
            )
        })?;
        Self::from_yaml_str(&text)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    /// Overlay `NT_*` environment variables, then validate.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup, then validate.
    ///
    /// Unset keys are skipped; a set but unparseable value is an error.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var::<u32>(&lookup, ENV_RATE_LIMIT_RPM)? {
            self.rate_limit.requests_per_minute = v;
        }
        if let Some(v) = parse_var::<u32>(&lookup, ENV_RATE_LIMIT_BURST)? {
            self.rate_limit.burst_size = v;
        }
        if let Some(v) = parse_var::<u32>(&lookup, ENV_BREAKER_FAILURE_THRESHOLD)? {
            self.circuit_breaker.failure_threshold = v;
        }
        if let Some(v) = parse_var::<u64>(&lookup, ENV_BREAKER_RECOVERY_SECS)? {
            self.circuit_breaker.recovery_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, ENV_STREAM_CHUNK_TIMEOUT_MS)? {
            self.bridge.chunk_timeout = Duration::from_millis(v);
        }
        if let Some(v) = parse_var::<usize>(&lookup, ENV_STREAM_QUEUE_CAPACITY)? {
            self.bridge.queue_capacity = v;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        self.rate_limit.validate()?;
        self.circuit_breaker.validate()?;
        self.bridge.validate()
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>().map(Some).map_err(|_| {
        Error::configuration_with_context(
            format!("invalid value for {}", key),
            ErrorContext::new()
                .with_field_path(key)
                .with_details(format!("could not parse {:?}", raw))
                .with_source("config"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = ResilienceConfig::default();
        assert_eq!(cfg.rate_limit.requests_per_minute, 20);
        assert_eq!(cfg.rate_limit.burst_size, 5);
        assert_eq!(cfg.circuit_breaker.failure_threshold, 5);
        assert_eq!(cfg.circuit_breaker.recovery_timeout, Duration::from_secs(30));
        assert_eq!(cfg.bridge.chunk_timeout, Duration::from_secs(60));
        assert_eq!(cfg.bridge.queue_capacity, 64);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = ResilienceConfig::from_yaml_str(
            r#"
rate_limit:
  requests_per_minute: 120
circuit_breaker:
  recovery_timeout: 2.5
"#,
        )
        .unwrap();
        assert_eq!(cfg.rate_limit.requests_per_minute, 120);
        assert_eq!(cfg.rate_limit.burst_size, 5);
        assert_eq!(cfg.circuit_breaker.recovery_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.bridge, BridgeConfig::default());
    }

    #[test]
    fn test_yaml_validation_fails_fast() {
        let err = ResilienceConfig::from_yaml_str("rate_limit:\n  burst_size: 0\n").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("rate_limit.burst_size")
        );

        let err = ResilienceConfig::from_yaml_str("rate_limit: [1, 2]").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_overrides_apply() {
        let mut cfg = ResilienceConfig::default();
        cfg.apply_overrides(lookup(&[
            (ENV_RATE_LIMIT_RPM, "60"),
            (ENV_RATE_LIMIT_BURST, " 2 "),
            (ENV_BREAKER_FAILURE_THRESHOLD, "3"),
            (ENV_BREAKER_RECOVERY_SECS, "10"),
            (ENV_STREAM_CHUNK_TIMEOUT_MS, "1500"),
            (ENV_STREAM_QUEUE_CAPACITY, ""),
        ]))
        .unwrap();
        assert_eq!(cfg.rate_limit.requests_per_minute, 60);
        assert_eq!(cfg.rate_limit.burst_size, 2);
        assert_eq!(cfg.circuit_breaker.failure_threshold, 3);
        assert_eq!(cfg.circuit_breaker.recovery_timeout, Duration::from_secs(10));
        assert_eq!(cfg.bridge.chunk_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.bridge.queue_capacity, 64);
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut cfg = ResilienceConfig::default();
        let err = cfg
            .apply_overrides(lookup(&[(ENV_RATE_LIMIT_RPM, "fast")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_RATE_LIMIT_RPM));

        let mut cfg = ResilienceConfig::default();
        let err = cfg
            .apply_overrides(lookup(&[(ENV_BREAKER_FAILURE_THRESHOLD, "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("failure_threshold"));
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let cfg = ResilienceConfig::default();
        let path = std::env::temp_dir().join(format!("nt-config-{}.yaml", uuid::Uuid::new_v4()));
        std::fs::write(&path, serde_yaml::to_string(&cfg).unwrap()).unwrap();
        let loaded = ResilienceConfig::from_yaml_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, cfg);

        assert!(ResilienceConfig::from_yaml_file("/nonexistent/nt.yaml").is_err());
    }
}
