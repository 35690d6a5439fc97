//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `RLV_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use crate::constants::{DEFAULT_ASSISTANT_TOKEN, DEFAULT_EOS_TOKEN};
use crate::scoring::code::CodeSettings;
use crate::scoring::{FormatScorer, JudgeSettings, VerifierSettings};

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `RLV_*` overrides on top of defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// HTTP server port. Default: `8000`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Blend the format score into every reward. Default: `true`.
    pub use_format_verifier: bool,

    /// Code sandbox base URL. Empty leaves code verification unconfigured.
    pub sandbox_url: String,

    /// Per-submission timeout in seconds. Default: `30`.
    pub sandbox_timeout_secs: u64,

    /// Attempts per submission. Default: `1`.
    pub sandbox_max_attempts: u32,

    /// Concurrent submissions per scored output. Default: `5`.
    pub sandbox_concurrency: usize,

    /// Judge model id. Empty leaves the judge unconfigured.
    pub judge_model: String,

    /// OpenAI-compatible base URL for the judge.
    pub judge_base_url: Option<String>,

    /// Judge API key; `OPENAI_API_KEY` is used when unset.
    pub judge_api_key: Option<String>,

    /// Default: `100`.
    pub judge_max_tokens: u32,

    /// Default: `0.0`.
    pub judge_temperature: f32,

    /// Token that must terminate a well-formatted output.
    pub eos_token: String,

    /// Token after which the assistant's turn starts in a rendered transcript.
    pub assistant_token: String,
}

impl Default for Config {
    fn default() -> Self {
        let code = CodeSettings::default();
        let judge = JudgeSettings::default();
        Self {
            port: 8000,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            use_format_verifier: true,
            sandbox_url: code.base_url,
            sandbox_timeout_secs: code.timeout.as_secs(),
            sandbox_max_attempts: code.max_attempts,
            sandbox_concurrency: code.concurrency,
            judge_model: judge.model,
            judge_base_url: None,
            judge_api_key: None,
            judge_max_tokens: judge.max_tokens,
            judge_temperature: judge.temperature,
            eos_token: DEFAULT_EOS_TOKEN.to_string(),
            assistant_token: DEFAULT_ASSISTANT_TOKEN.to_string(),
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "RLV_PORT";
    const ENV_BIND_ADDR: &'static str = "RLV_BIND_ADDR";
    const ENV_USE_FORMAT_VERIFIER: &'static str = "RLV_USE_FORMAT_VERIFIER";
    const ENV_SANDBOX_URL: &'static str = "RLV_SANDBOX_URL";
    const ENV_SANDBOX_TIMEOUT_SECS: &'static str = "RLV_SANDBOX_TIMEOUT_SECS";
    const ENV_SANDBOX_MAX_ATTEMPTS: &'static str = "RLV_SANDBOX_MAX_ATTEMPTS";
    const ENV_SANDBOX_CONCURRENCY: &'static str = "RLV_SANDBOX_CONCURRENCY";
    const ENV_JUDGE_MODEL: &'static str = "RLV_JUDGE_MODEL";
    const ENV_JUDGE_BASE_URL: &'static str = "RLV_JUDGE_BASE_URL";
    const ENV_JUDGE_API_KEY: &'static str = "RLV_JUDGE_API_KEY";
    const ENV_JUDGE_MAX_TOKENS: &'static str = "RLV_JUDGE_MAX_TOKENS";
    const ENV_JUDGE_TEMPERATURE: &'static str = "RLV_JUDGE_TEMPERATURE";
    const ENV_EOS_TOKEN: &'static str = "RLV_EOS_TOKEN";
    const ENV_ASSISTANT_TOKEN: &'static str = "RLV_ASSISTANT_TOKEN";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let use_format_verifier =
            Self::parse_bool_from_env(Self::ENV_USE_FORMAT_VERIFIER, defaults.use_format_verifier)?;

        let sandbox_url = Self::parse_string_from_env(Self::ENV_SANDBOX_URL, defaults.sandbox_url);
        let sandbox_timeout_secs =
            Self::parse_u64_from_env(Self::ENV_SANDBOX_TIMEOUT_SECS, defaults.sandbox_timeout_secs);
        let sandbox_max_attempts = Self::parse_u64_from_env(
            Self::ENV_SANDBOX_MAX_ATTEMPTS,
            u64::from(defaults.sandbox_max_attempts),
        ) as u32;
        let sandbox_concurrency = Self::parse_u64_from_env(
            Self::ENV_SANDBOX_CONCURRENCY,
            defaults.sandbox_concurrency as u64,
        ) as usize;

        let judge_model = Self::parse_string_from_env(Self::ENV_JUDGE_MODEL, defaults.judge_model);
        let judge_base_url = Self::parse_optional_string_from_env(Self::ENV_JUDGE_BASE_URL);
        let judge_api_key = Self::parse_optional_string_from_env(Self::ENV_JUDGE_API_KEY);
        let judge_max_tokens = Self::parse_u64_from_env(
            Self::ENV_JUDGE_MAX_TOKENS,
            u64::from(defaults.judge_max_tokens),
        ) as u32;
        let judge_temperature = env::var(Self::ENV_JUDGE_TEMPERATURE)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.judge_temperature);

        let eos_token = Self::parse_string_from_env(Self::ENV_EOS_TOKEN, defaults.eos_token);
        let assistant_token =
            Self::parse_string_from_env(Self::ENV_ASSISTANT_TOKEN, defaults.assistant_token);

        Ok(Self {
            port,
            bind_addr,
            use_format_verifier,
            sandbox_url,
            sandbox_timeout_secs,
            sandbox_max_attempts,
            sandbox_concurrency,
            judge_model,
            judge_base_url,
            judge_api_key,
            judge_max_tokens,
            judge_temperature,
            eos_token,
            assistant_token,
        })
    }

    /// Validates basic invariants. Remote collaborators are not contacted here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sandbox_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: Self::ENV_SANDBOX_TIMEOUT_SECS,
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.sandbox_max_attempts == 0 {
            return Err(ConfigError::InvalidSetting {
                name: Self::ENV_SANDBOX_MAX_ATTEMPTS,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sandbox_concurrency == 0 {
            return Err(ConfigError::InvalidSetting {
                name: Self::ENV_SANDBOX_CONCURRENCY,
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.judge_temperature) {
            return Err(ConfigError::InvalidSetting {
                name: Self::ENV_JUDGE_TEMPERATURE,
                reason: format!("{} is outside 0.0..=2.0", self.judge_temperature),
            });
        }
        if self.use_format_verifier && self.eos_token.is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: Self::ENV_EOS_TOKEN,
                reason: "must not be empty while format verification is enabled".to_string(),
            });
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Settings handed to the verifier registry.
    pub fn verifier_settings(&self) -> VerifierSettings {
        VerifierSettings {
            code: CodeSettings {
                base_url: self.sandbox_url.clone(),
                timeout: Duration::from_secs(self.sandbox_timeout_secs),
                max_attempts: self.sandbox_max_attempts,
                concurrency: self.sandbox_concurrency,
            },
            judge: JudgeSettings {
                model: self.judge_model.clone(),
                base_url: self.judge_base_url.clone(),
                api_key: self.judge_api_key.clone(),
                max_tokens: self.judge_max_tokens,
                temperature: self.judge_temperature,
                ..JudgeSettings::default()
            },
        }
    }

    /// The shared format scorer, or `None` when format blending is disabled.
    pub fn format_scorer(&self) -> Option<FormatScorer> {
        self.use_format_verifier
            .then(|| FormatScorer::new(self.eos_token.as_str()))
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_bool_from_env(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match env::var(var_name) {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidBool {
                    name: var_name,
                    value,
                }),
            },
            Err(_) => Ok(default),
        }
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}
