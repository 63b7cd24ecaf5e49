//! Processor module - drives one record through walk, validate, fetch, describe, replace
//!
//! Failures are local to a candidate: they are logged and recorded in the
//! [`RunReport`], and the original value stays in place.

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde_json::Value;
use std::{collections::HashMap, path::Path, time::Instant};

use super::{
    fetch::{FetchError, ImageAsset, ImageFetcher},
    field_path::FieldPath,
    link::LinkValidator,
    report::{RunReport, SkipReason},
    retry::{self, RetryPolicy},
    walker::{WalkConfig, walk_from},
};
use crate::config::{ConfigError, Settings};
use crate::describe::ContentDescriber;
use crate::record::save_record;

/// Source of image bytes for a validated link.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, link: &str) -> Result<ImageAsset, FetchError>;
}

impl ImageSource for ImageFetcher {
    fn fetch(&self, link: &str) -> Result<ImageAsset, FetchError> {
        ImageFetcher::fetch(self, link)
    }
}

/// Output of one run: the rewritten copy of the record and what happened to it
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub record: Value,
    pub report: RunReport,
}

pub struct ContentProcessor {
    source: Box<dyn ImageSource>,
    describer: ContentDescriber,
    validator: LinkValidator,
    walk: WalkConfig,
    scan_root: FieldPath,
    policy: RetryPolicy,
}

impl ContentProcessor {
    /// A processor without restrictions: every string is a link candidate, no key is
    /// excluded, and the walk has no depth limit.
    pub fn new(source: Box<dyn ImageSource>, describer: ContentDescriber) -> Self {
        Self {
            source,
            describer,
            validator: LinkValidator::unrestricted(),
            walk: WalkConfig::default(),
            scan_root: FieldPath::root(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let client = settings.http_client()?;
        let fetcher = ImageFetcher::new(
            client.clone(),
            settings.min_size_kb,
            settings.image_dir.clone(),
        );
        let describer = ContentDescriber::new(
            settings.description_service(client),
            settings.query.clone(),
            settings.valid_response_key.clone(),
        );
        let validator = settings.link_validator()?;

        if !settings.excluded_keys.is_empty() {
            info!("Excluded keys: {}", settings.excluded_keys.join(", "));
        }
        match validator.pattern() {
            Some(pattern) => info!("Link pattern: {}", pattern),
            None => info!("No link pattern, every string is a link candidate"),
        }
        info!("Minimum image size: {} bytes", fetcher.min_size_bytes());
        if let Some(dir) = fetcher.save_dir() {
            info!("Images will be saved to: {:?}", dir);
        }

        Ok(Self::new(Box::new(fetcher), describer)
            .with_link_validator(validator)
            .with_walk(settings.walk_config())
            .with_scan_root(settings.scan_root_path())
            .with_retry_policy(settings.retry_policy()))
    }

    pub fn with_link_validator(mut self, validator: LinkValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_walk(mut self, walk: WalkConfig) -> Self {
        self.walk = walk;
        self
    }

    pub fn with_scan_root(mut self, scan_root: FieldPath) -> Self {
        self.scan_root = scan_root;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Rewrite a copy of `record`, replacing image links with their descriptions.
    pub fn process(&self, record: &Value) -> Processed {
        let start = Instant::now();
        let mut output = record.clone();
        let mut report = RunReport::default();

        let excluded_root = self
            .walk
            .excluded_keys
            .iter()
            .find(|key| self.scan_root.passes_through(key.as_str()));
        if let Some(key) = excluded_root {
            warn!(
                "Scan root {} passes through excluded key {}, nothing to do",
                self.scan_root, key
            );
            report.elapsed = start.elapsed();
            return Processed {
                record: output,
                report,
            };
        }

        let Some(root) = self.scan_root.get(record) else {
            warn!("No data found at scan root: {}", self.scan_root);
            report.elapsed = start.elapsed();
            return Processed {
                record: output,
                report,
            };
        };
        if !self.scan_root.is_root() {
            info!("Scanning from {}", self.scan_root);
        }

        let mut walk = walk_from(root, self.scan_root.clone(), &self.walk);
        let candidates: Vec<(FieldPath, String)> = walk
            .by_ref()
            .map(|candidate| (candidate.path, candidate.value.to_string()))
            .collect();
        report.abandoned = walk.abandoned();
        report.candidates = candidates.len();

        // one fetch/describe cycle per distinct link
        let mut outcomes: HashMap<String, Result<String, SkipReason>> = HashMap::new();

        for (path, link) in candidates {
            if !self.validator.is_valid(&link) {
                continue;
            }
            report.validated += 1;
            info!("Found image link: {} = {}", path, link);

            let outcome = match outcomes.get(&link) {
                Some(outcome) => outcome.clone(),
                None => {
                    let outcome = self.describe_link(&link);
                    outcomes.insert(link.clone(), outcome.clone());
                    outcome
                }
            };

            match outcome {
                Ok(text) => {
                    if path.replace(&mut output, Value::String(text)) {
                        info!("Replaced {} with content description", path);
                        report.replaced.push(path);
                    }
                }
                Err(reason) => {
                    warn!("Keeping original value at {}: {}", path, reason);
                    report.skipped.push((path, reason));
                }
            }
        }

        if report.validated == 0 {
            warn!("No eligible image links found");
        }
        report.elapsed = start.elapsed();
        report.log();

        Processed {
            record: output,
            report,
        }
    }

    /// Process `record` and write the result as pretty JSON to `dest`
    pub fn process_to(&self, record: &Value, dest: &Path) -> Result<Processed> {
        let processed = self.process(record);
        save_record(dest, &processed.record)
            .with_context(|| format!("failed to save processed record to {:?}", dest))?;
        info!("Content saved to {:?}", dest);
        Ok(processed)
    }

    fn describe_link(&self, link: &str) -> Result<String, SkipReason> {
        let image = retry::invoke(&self.policy, &format!("download {link}"), |_| {
            self.source.fetch(link)
        })
        .map_err(|e| {
            error!("{}", e);
            SkipReason::from_fetch(e)
        })?
        .value;

        let description = retry::invoke(
            &self.policy,
            &format!("{} describe {link}", self.describer.service_name()),
            |_| self.describer.describe(&image),
        )
        .map_err(|e| {
            error!("{}", e);
            SkipReason::from_describe(e)
        })?
        .value;

        Ok(description.text)
    }
}
