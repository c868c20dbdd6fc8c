//! Typed configuration loaded from the environment (§3.1). Missing or
//! unparseable required values fail fast at startup; only non-credential
//! fields get documented defaults.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub bind_port: u16,
    pub distributed_store_url: String,

    pub connection_pool_capacity: usize,
    pub outbound_queue_capacity: usize,

    pub tts_cache_maxsize: u64,
    pub tts_cache_ttl: Duration,
    pub tts_chunk_timeout: Duration,

    pub heartbeat_interval: Duration,
    pub session_idle_timeout: Duration,

    pub asr_provider: ProviderConfig,
    pub tts_provider: ProviderConfig,
    pub llm_provider: ProviderConfig,
    pub llm_lite_model: String,
    pub llm_think_model: String,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional_with_default(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("could not parse `{raw}`"),
        }),
        Err(_) => Ok(default),
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: optional_with_default("VCE_BIND_ADDR", "0.0.0.0"),
            bind_port: optional_parsed("VCE_BIND_PORT", 8080u16)?,
            distributed_store_url: required("VCE_REDIS_URL")?,

            connection_pool_capacity: optional_parsed("VCE_CONNECTION_POOL_CAPACITY", 1000usize)?,
            outbound_queue_capacity: optional_parsed("VCE_OUTBOUND_QUEUE_CAPACITY", 1000usize)?,

            tts_cache_maxsize: optional_parsed("VCE_TTS_CACHE_MAXSIZE", 10u64)?,
            tts_cache_ttl: Duration::from_secs(optional_parsed("VCE_TTS_CACHE_TTL_SECS", 3600u64)?),
            tts_chunk_timeout: Duration::from_secs(optional_parsed(
                "VCE_TTS_CHUNK_TIMEOUT_SECS",
                30u64,
            )?),

            heartbeat_interval: Duration::from_secs(optional_parsed(
                "VCE_HEARTBEAT_INTERVAL_SECS",
                30u64,
            )?),
            session_idle_timeout: Duration::from_secs(optional_parsed(
                "VCE_SESSION_IDLE_TIMEOUT_SECS",
                3600u64,
            )?),

            asr_provider: ProviderConfig {
                base_url: required("VCE_ASR_BASE_URL")?,
                api_key: required("VCE_ASR_API_KEY")?,
            },
            tts_provider: ProviderConfig {
                base_url: required("VCE_TTS_BASE_URL")?,
                api_key: required("VCE_TTS_API_KEY")?,
            },
            llm_provider: ProviderConfig {
                base_url: required("VCE_LLM_BASE_URL")?,
                api_key: required("VCE_LLM_API_KEY")?,
            },
            llm_lite_model: optional_with_default("VCE_LLM_LITE_MODEL", "lite"),
            llm_think_model: optional_with_default("VCE_LLM_THINK_MODEL", "think"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_with_default_falls_back_when_unset() {
        env::remove_var("VCE_TEST_UNSET_STRING");
        assert_eq!(optional_with_default("VCE_TEST_UNSET_STRING", "fallback"), "fallback");
    }

    #[test]
    fn optional_with_default_uses_set_value() {
        env::set_var("VCE_TEST_SET_STRING", "custom");
        assert_eq!(optional_with_default("VCE_TEST_SET_STRING", "fallback"), "custom");
        env::remove_var("VCE_TEST_SET_STRING");
    }

    #[test]
    fn optional_parsed_rejects_unparseable_value() {
        env::set_var("VCE_TEST_BAD_NUMBER", "not-a-number");
        let err = optional_parsed::<u16>("VCE_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        env::remove_var("VCE_TEST_BAD_NUMBER");
    }

    #[test]
    fn required_reports_missing_name() {
        env::remove_var("VCE_TEST_REQUIRED_MISSING");
        let err = required("VCE_TEST_REQUIRED_MISSING").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("VCE_TEST_REQUIRED_MISSING")));
    }
}
