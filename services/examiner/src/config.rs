use examiner_core::report::{
    DEFAULT_REPORT_FILENAME, DEFAULT_REPORTS_DIR, DEFAULT_SAMPLE_FILENAME, ReportConfig,
};
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for the examiner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    OpenAI,
    Gemini,
    /// Offline scripted examiner with a fixed evaluation.
    Simulated,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub backend: Backend,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub reports_dir: PathBuf,
    pub report_filename: String,
    pub sample_report_filename: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Like [`Config::from_env`], but ignores `EXAMINER_BACKEND` in favour of `backend`.
    pub fn from_env_with_backend(backend: Backend) -> Result<Self, ConfigError> {
        Self::load(Some(backend))
    }

    fn load(backend_override: Option<Backend>) -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let backend = match backend_override {
            Some(backend) => backend,
            None => {
                let backend_str =
                    std::env::var("EXAMINER_BACKEND").unwrap_or_else(|_| "openai".to_string());
                match backend_str.to_lowercase().as_str() {
                    "openai" => Backend::OpenAI,
                    "gemini" => Backend::Gemini,
                    "simulated" => Backend::Simulated,
                    other => {
                        return Err(ConfigError::InvalidValue(
                            "EXAMINER_BACKEND".to_string(),
                            format!("'{}' is not one of openai, gemini, simulated", other),
                        ));
                    }
                }
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let reports_dir = std::env::var("REPORTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPORTS_DIR));
        let report_filename = file_name_var("REPORT_FILENAME", DEFAULT_REPORT_FILENAME)?;
        let sample_report_filename =
            file_name_var("SAMPLE_REPORT_FILENAME", DEFAULT_SAMPLE_FILENAME)?;

        match backend {
            Backend::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' backend".to_string(),
                    ));
                }
            }
            Backend::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' backend".to_string(),
                    ));
                }
            }
            Backend::Simulated => {}
        }

        Ok(Self {
            backend,
            openai_api_key,
            gemini_api_key,
            chat_model,
            log_level,
            prompts_path,
            reports_dir,
            report_filename,
            sample_report_filename,
        })
    }

    /// The report locations handed to the session controller.
    pub fn report_config(&self) -> ReportConfig {
        ReportConfig {
            reports_dir: self.reports_dir.clone(),
            report_filename: self.report_filename.clone(),
            sample_filename: self.sample_report_filename.clone(),
        }
    }
}

/// Reads a bare file name (no directory components) from the environment.
fn file_name_var(var: &str, default: &str) -> Result<String, ConfigError> {
    let value = std::env::var(var).unwrap_or_else(|_| default.to_string());
    if value.is_empty() || value.contains(['/', '\\']) {
        return Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{}' must be a plain file name", value),
        ));
    }
    Ok(value)
}
