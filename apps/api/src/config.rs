use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::evaluation::EvaluatorSettings;
use crate::llm_client::GatewaySettings;

/// Highest sampling temperature allowed for either model call.
pub const MAX_TEMPERATURE: f32 = 0.5;

/// Application configuration loaded from environment variables.
/// Every variable has a default; invalid values abort startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub questions_path: String,
    pub cors_origin: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_timeout_secs: u64,
    pub llm_max_retries: u32,
    pub rubric_temperature: f32,
    pub synthesis_temperature: f32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Config {
            port: var("PORT", "8000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: var("RUST_LOG", "info"),
            questions_path: var("QUESTIONS_PATH", "questions.json"),
            cors_origin: var("CORS_ORIGIN", "http://localhost:3000"),
            llm_base_url: var("LLM_BASE_URL", "http://localhost:11434/v1"),
            llm_model: var("LLM_MODEL", "phi3"),
            llm_api_key: lookup("LLM_API_KEY").filter(|k| !k.trim().is_empty()),
            llm_timeout_secs: var("LLM_TIMEOUT_SECS", "120")
                .parse::<u64>()
                .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?,
            llm_max_retries: var("LLM_MAX_RETRIES", "0")
                .parse::<u32>()
                .context("LLM_MAX_RETRIES must be a non-negative integer")?,
            rubric_temperature: parse_temperature("RUBRIC_TEMPERATURE", &var("RUBRIC_TEMPERATURE", "0.1"))?,
            synthesis_temperature: parse_temperature(
                "SYNTHESIS_TEMPERATURE",
                &var("SYNTHESIS_TEMPERATURE", "0.3"),
            )?,
        };

        if config.llm_timeout_secs == 0 {
            bail!("LLM_TIMEOUT_SECS must be greater than zero");
        }

        Ok(config)
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            base_url: self.llm_base_url.clone(),
            model: self.llm_model.clone(),
            api_key: self.llm_api_key.clone(),
            timeout: Duration::from_secs(self.llm_timeout_secs),
            max_retries: self.llm_max_retries,
        }
    }

    pub fn evaluator_settings(&self) -> EvaluatorSettings {
        EvaluatorSettings {
            rubric_temperature: self.rubric_temperature,
            synthesis_temperature: self.synthesis_temperature,
        }
    }
}

fn parse_temperature(key: &str, raw: &str) -> Result<f32> {
    let value = raw
        .parse::<f32>()
        .with_context(|| format!("{key} must be a number"))?;
    if !(0.0..=MAX_TEMPERATURE).contains(&value) {
        bail!("{key} must be between 0.0 and {MAX_TEMPERATURE}, got {value}");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.questions_path, "questions.json");
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert_eq!(config.llm_model, "phi3");
        assert_eq!(config.llm_api_key, None);
        assert_eq!(config.llm_max_retries, 0);
        assert_eq!(config.gateway_settings().max_retries, 0);
        assert_eq!(config.evaluator_settings(), EvaluatorSettings::default());
        assert_eq!(config.gateway_settings().timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9100"),
            ("LLM_MODEL", "llama3"),
            ("LLM_API_KEY", "secret"),
            ("RUBRIC_TEMPERATURE", "0.0"),
            ("SYNTHESIS_TEMPERATURE", "0.5"),
        ])
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.gateway_settings().model, "llama3");
        assert_eq!(config.llm_api_key.as_deref(), Some("secret"));
        assert_eq!(config.rubric_temperature, 0.0);
        assert_eq!(config.synthesis_temperature, 0.5);
    }

    #[test]
    fn test_blank_api_key_is_none() {
        let config = config_from(&[("LLM_API_KEY", "  ")]).unwrap();
        assert_eq!(config.llm_api_key, None);
    }

    #[test]
    fn test_temperature_above_limit_rejected() {
        let err = config_from(&[("SYNTHESIS_TEMPERATURE", "0.7")]).unwrap_err();
        assert!(err.to_string().contains("SYNTHESIS_TEMPERATURE"));
    }

    #[test]
    fn test_negative_temperature_rejected() {
        assert!(config_from(&[("RUBRIC_TEMPERATURE", "-0.1")]).is_err());
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(config_from(&[("PORT", "not-a-port")]).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(config_from(&[("LLM_TIMEOUT_SECS", "0")]).is_err());
    }
}
