use anyhow::Context;
use dotenv::dotenv;
use log::info;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::{fmt, path::PathBuf, time::Duration};
use thiserror::Error;

use crate::common::{
    APP_BUILDER_ENDPOINT, CHAT_COMPLETION_ENDPOINT, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DEPTH,
    DEFAULT_MIN_SIZE_KB, DEFAULT_QUERY, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS,
};
use crate::describe::{AppBuilderService, ChatCompletionService, DescriptionService};
use crate::pipeline::{
    field_path::FieldPath, link::LinkValidator, retry::RetryPolicy, walker::WalkConfig,
};
use crate::utils::redact;

pub const ENV_PREFIX: &str = "IMGDESC_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid link pattern {pattern:?}")]
    LinkPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("{backend} backend requires {field}")]
    MissingCredential {
        backend: &'static str,
        field: &'static str,
    },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    AppBuilder,
    ChatCompletion,
}

impl Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::AppBuilder => "app_builder",
            Backend::ChatCompletion => "chat_completion",
        }
    }
}

/// Everything the processor needs, fixed for its lifetime.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Which understanding service to call
    pub backend: Backend,
    pub app_id: Option<String>,
    pub authorization: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Base URL override for the selected backend
    pub endpoint: Option<String>,
    pub query: String,
    /// Keys leading to the subtree that is scanned; empty scans the whole record
    pub scan_root: Vec<String>,
    pub min_size_kb: u64,
    /// Downloaded images are kept here when set
    pub image_dir: Option<PathBuf>,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub excluded_keys: Vec<String>,
    pub link_pattern: Option<String>,
    pub max_depth: Option<usize>,
    pub valid_response_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            app_id: None,
            authorization: None,
            api_key: None,
            model: None,
            endpoint: None,
            query: DEFAULT_QUERY.to_string(),
            scan_root: Vec::new(),
            min_size_kb: DEFAULT_MIN_SIZE_KB,
            image_dir: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            excluded_keys: Vec::new(),
            link_pattern: None,
            max_depth: Some(DEFAULT_MAX_DEPTH),
            valid_response_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = |s: &Option<String>| s.as_deref().map(redact);
        f.debug_struct("Settings")
            .field("backend", &self.backend)
            .field("app_id", &self.app_id)
            .field("authorization", &secret(&self.authorization))
            .field("api_key", &secret(&self.api_key))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("query", &self.query)
            .field("scan_root", &self.scan_root)
            .field("min_size_kb", &self.min_size_kb)
            .field("image_dir", &self.image_dir)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("excluded_keys", &self.excluded_keys)
            .field("link_pattern", &self.link_pattern)
            .field("max_depth", &self.max_depth)
            .field("valid_response_key", &self.valid_response_key)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Settings {
    /// Read `IMGDESC_*` variables, after loading a `.env` file when present
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        let settings = envy::prefixed(ENV_PREFIX)
            .from_env::<Settings>()
            .context("failed to read settings from environment")?;
        info!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.query.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "query",
                reason: "must not be empty".to_string(),
            });
        }
        self.link_validator()?;
        let required: Vec<(&'static str, &Option<String>)> = match self.backend {
            Backend::AppBuilder => vec![
                ("app_id", &self.app_id),
                ("authorization", &self.authorization),
            ],
            Backend::ChatCompletion => vec![("api_key", &self.api_key), ("model", &self.model)],
        };
        for (field, value) in required {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                return Err(ConfigError::MissingCredential {
                    backend: self.backend.name(),
                    field,
                });
            }
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn walk_config(&self) -> WalkConfig {
        WalkConfig::new(self.excluded_keys.iter().cloned(), self.max_depth)
    }

    pub fn scan_root_path(&self) -> FieldPath {
        FieldPath::from_keys(self.scan_root.iter().cloned())
    }

    pub fn link_validator(&self) -> Result<LinkValidator, ConfigError> {
        LinkValidator::new(self.link_pattern.as_deref())
    }

    pub fn http_client(&self) -> Result<Client, ConfigError> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(ConfigError::HttpClient)
    }

    /// Build the configured understanding service backend. Call [`Settings::validate`]
    /// first; missing credentials are sent as empty strings.
    pub fn description_service(&self, client: Client) -> Box<dyn DescriptionService> {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        let service: Box<dyn DescriptionService> = match self.backend {
            Backend::AppBuilder => Box::new(AppBuilderService::new(
                client,
                self.endpoint.as_deref().unwrap_or(APP_BUILDER_ENDPOINT),
                field(&self.app_id),
                field(&self.authorization),
            )),
            Backend::ChatCompletion => Box::new(ChatCompletionService::new(
                client,
                self.endpoint.as_deref().unwrap_or(CHAT_COMPLETION_ENDPOINT),
                field(&self.api_key),
                field(&self.model),
            )),
        };
        service
    }
}
