//! Describe module - turns a fetched image into description text
//!
//! This module contains the following submodules:
//! - `app_builder`: conversation based understanding API (create, upload, run)
//! - `chat_completion`: OpenAI compatible chat completion API with inline images
//!
//! Backends only move bytes and return the reply text. Parsing the reply and the
//! validity check live in [`ContentDescriber`] so every backend is judged the same way.

pub mod app_builder;
pub mod chat_completion;

use log::{debug, info, warn};
use regex::Regex;
use reqwest::{StatusCode, blocking::Response};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

use crate::common::TRUE_LIKE_VALUES;
use crate::pipeline::{fetch::ImageAsset, retry::Retryable};

pub use app_builder::AppBuilderService;
pub use chat_completion::ChatCompletionService;

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json(.*?)```").unwrap());

/// Key of the structured reply holding the description text
pub const TEXT_KEY: &str = "text";

// ────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service answered with HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unusable service payload: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Payload(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum DescribeError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("description rejected: {0}")]
    InvalidDescription(String),
}

impl Retryable for DescribeError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

// ────────────────────────────────────────────────────────────────
// Backend seam
// ────────────────────────────────────────────────────────────────

/// An external content-understanding service.
pub trait DescriptionService: Send + Sync {
    fn name(&self) -> &str;

    /// Send the image and the query, return the raw reply text
    fn request(&self, image: &ImageAsset, query: &str) -> Result<String, ServiceError>;
}

/// Fail with [`ServiceError::Status`] unless the response is 2xx
pub(crate) fn ensure_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ServiceError::Status {
        status,
        body: body.chars().take(200).collect(),
    })
}

// ────────────────────────────────────────────────────────────────
// Reply parsing
// ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub text: String,
    /// Structured fields found in the reply, empty when it carried none
    pub fields: Map<String, Value>,
}

impl Description {
    /// Structured fields come from the first fenced json block, or from the whole reply
    /// when it is a JSON object. A string `text` field becomes the description.
    pub fn parse(reply: &str) -> Self {
        let fields = FENCED_JSON
            .captures(reply)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .or(Some(reply))
            .and_then(|json| serde_json::from_str::<Map<String, Value>>(json.trim()).ok())
            .unwrap_or_default();

        let text = match fields.get(TEXT_KEY) {
            Some(Value::String(text)) => text.clone(),
            _ => reply.to_string(),
        };

        Self { text, fields }
    }
}

/// `true`, or a string spelling one of [`TRUE_LIKE_VALUES`]; anything else is false
pub fn is_true_like(flag: &Value) -> bool {
    match flag {
        Value::Bool(b) => *b,
        Value::String(s) => TRUE_LIKE_VALUES.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

// ────────────────────────────────────────────────────────────────
// Describer
// ────────────────────────────────────────────────────────────────

pub struct ContentDescriber {
    service: Box<dyn DescriptionService>,
    query: String,
    valid_response_key: Option<String>,
}

impl ContentDescriber {
    pub fn new(
        service: Box<dyn DescriptionService>,
        query: impl Into<String>,
        valid_response_key: Option<String>,
    ) -> Self {
        match &valid_response_key {
            Some(key) => info!("Validity check enabled with key: {}", key),
            None => info!("Validity check disabled"),
        }
        Self {
            service,
            query: query.into(),
            valid_response_key,
        }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub fn describe(&self, image: &ImageAsset) -> Result<Description, DescribeError> {
        let reply = self.service.request(image, &self.query)?;
        let description = Description::parse(&reply);
        debug!(
            "{} replied for {} with {} structured fields",
            self.service.name(),
            image.link,
            description.fields.len()
        );

        if let Some(key) = &self.valid_response_key {
            let flag = description.fields.get(key).ok_or_else(|| {
                warn!("Validity key '{}' not found in reply for {}", key, image.link);
                DescribeError::InvalidDescription(format!("validity key '{key}' missing"))
            })?;
            info!("Found validity flag: {} = {}", key, flag);
            if !is_true_like(flag) {
                return Err(DescribeError::InvalidDescription(format!(
                    "validity key '{key}' is {flag}"
                )));
            }
        }

        if description.text.trim().is_empty() {
            return Err(DescribeError::InvalidDescription(
                "empty description".to_string(),
            ));
        }

        Ok(description)
    }
}
