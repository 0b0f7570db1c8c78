use anyhow::{Context, Result};
use std::collections::HashMap;

/// Environment-driven configuration for completion adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: String,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
}

impl LlmSettings {
    const PROVIDER_ENV: &'static str = "TRADE_GUARD_PROVIDER";
    const API_KEY_ENV: &'static str = "TRADE_GUARD_API_KEY";
    const ENDPOINT_ENV: &'static str = "TRADE_GUARD_ENDPOINT";
    const MODEL_ENV: &'static str = "TRADE_GUARD_MODEL";
    const TIMEOUT_ENV: &'static str = "TRADE_GUARD_TIMEOUT_SECS";
    const RETRIES_ENV: &'static str = "TRADE_GUARD_MAX_RETRIES";

    /// Load settings from environment variables.
    ///
    /// * `TRADE_GUARD_PROVIDER`: provider identifier (default: `openai`).
    /// * `TRADE_GUARD_API_KEY`: API key/token (required except `noop`).
    /// * `TRADE_GUARD_ENDPOINT`: optional custom base URL.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build settings from an explicit variable map. Lets callers overlay
    /// file-based configuration on top of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let provider = vars
            .get(Self::PROVIDER_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "openai".to_string())
            .trim()
            .to_string();
        let api_key = match provider.to_lowercase().as_str() {
            "noop" => vars.get(Self::API_KEY_ENV).cloned().unwrap_or_default(),
            _ => vars
                .get(Self::API_KEY_ENV)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .with_context(|| {
                    format!(
                        "environment variable {} must be set when model-backed workers are enabled",
                        Self::API_KEY_ENV
                    )
                })?,
        };
        let endpoint = vars
            .get(Self::ENDPOINT_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty());
        let model = vars
            .get(Self::MODEL_ENV)
            .cloned()
            .filter(|v| !v.trim().is_empty());
        let timeout_secs = vars
            .get(Self::TIMEOUT_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok());
        let max_retries = vars
            .get(Self::RETRIES_ENV)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(2);

        Ok(Self {
            provider,
            api_key,
            endpoint,
            model,
            timeout_secs,
            max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_openai_provider() {
        let settings =
            LlmSettings::from_vars(vars(&[("TRADE_GUARD_API_KEY", "secret")])).unwrap();
        assert_eq!(settings.provider, "openai");
        assert_eq!(settings.api_key, "secret");
        assert!(settings.endpoint.is_none());
        assert_eq!(settings.max_retries, 2);
    }

    #[test]
    fn errors_when_api_key_missing() {
        let err = LlmSettings::from_vars(vars(&[("TRADE_GUARD_PROVIDER", "openai")])).unwrap_err();
        assert!(err.to_string().contains("TRADE_GUARD_API_KEY"));
    }

    #[test]
    fn noop_provider_allows_missing_key() {
        let settings = LlmSettings::from_vars(vars(&[("TRADE_GUARD_PROVIDER", "noop")])).unwrap();
        assert_eq!(settings.provider, "noop");
        assert!(settings.api_key.is_empty());
    }

    #[test]
    fn parses_timeout_and_retries() {
        let settings = LlmSettings::from_vars(vars(&[
            ("TRADE_GUARD_PROVIDER", "openai"),
            ("TRADE_GUARD_API_KEY", "secret"),
            ("TRADE_GUARD_TIMEOUT_SECS", "45"),
            ("TRADE_GUARD_MAX_RETRIES", "5"),
        ]))
        .unwrap();
        assert_eq!(settings.timeout_secs, Some(45));
        assert_eq!(settings.max_retries, 5);
    }
}
