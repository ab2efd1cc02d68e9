use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::workflows::relief::GrantPolicyConfig;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 30;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Which evaluator produces eligibility decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionMode {
    /// In-process policy rules only.
    Rules,
    /// External classifier, re-validated by the decision gate.
    Model,
}

impl DecisionMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rules" | "rule" | "rule_based" => Ok(Self::Rules),
            "model" | "classifier" | "model_assisted" => Ok(Self::Model),
            _ => Err(ConfigError::InvalidDecisionMode {
                value: value.to_string(),
            }),
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub policy: GrantPolicyConfig,
    pub decision_mode: DecisionMode,
    pub classifier: ClassifierConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let mut policy = GrantPolicyConfig::default();
        if let Some(ceiling) = amount_var("RELIEF_PROGRAM_CEILING")? {
            policy.program_ceiling = ceiling;
        }
        if let Some(allowance) = amount_var("RELIEF_TWELVE_MONTH_ALLOWANCE")? {
            policy.twelve_month_allowance = allowance;
        }
        if let Some(allowance) = amount_var("RELIEF_LIFETIME_ALLOWANCE")? {
            policy.lifetime_allowance = allowance;
        }

        let decision_mode = match env::var("RELIEF_DECISION_MODE") {
            Ok(value) => DecisionMode::parse(&value)?,
            Err(_) => DecisionMode::Rules,
        };

        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        if decision_mode == DecisionMode::Model && api_key.is_none() {
            return Err(ConfigError::MissingClassifierKey);
        }

        let timeout_seconds = match env::var("GEMINI_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidTimeout)?,
            Err(_) => DEFAULT_GEMINI_TIMEOUT_SECS,
        };

        let classifier = ClassifierConfig {
            api_key,
            model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            endpoint: env::var("GEMINI_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_GEMINI_ENDPOINT.to_string()),
            timeout_seconds,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            policy,
            decision_mode,
            classifier,
        })
    }
}

fn amount_var(name: &'static str) -> Result<Option<Decimal>, ConfigError> {
    match env::var(name) {
        Ok(raw) => Decimal::from_str(raw.trim())
            .ok()
            .filter(|amount| amount.is_sign_positive() && !amount.is_zero())
            .map(Some)
            .ok_or(ConfigError::InvalidAmount { var: name }),
        Err(_) => Ok(None),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Connection settings for the generative classifier.
#[derive(Clone)]
pub struct ClassifierConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidAmount { var: &'static str },
    InvalidDecisionMode { value: String },
    InvalidTimeout,
    MissingClassifierKey,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidAmount { var } => {
                write!(f, "{var} must be a positive decimal amount")
            }
            ConfigError::InvalidDecisionMode { value } => write!(
                f,
                "RELIEF_DECISION_MODE must be 'rules' or 'model' (found '{value}')"
            ),
            ConfigError::InvalidTimeout => {
                write!(f, "GEMINI_TIMEOUT_SECS must be a positive number of seconds")
            }
            ConfigError::MissingClassifierKey => write!(
                f,
                "RELIEF_DECISION_MODE=model requires GEMINI_API_KEY or API_KEY"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
