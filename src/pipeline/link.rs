use log::debug;
use regex::Regex;

use crate::config::ConfigError;

/// Decides whether a discovered string is an image link worth fetching.
///
/// Without a pattern every non-empty string passes. With a pattern the string must
/// contain a match somewhere (search semantics); anchor the pattern to require a
/// full match.
#[derive(Debug, Clone, Default)]
pub struct LinkValidator {
    pattern: Option<Regex>,
}

impl LinkValidator {
    pub fn new(pattern: Option<&str>) -> Result<Self, ConfigError> {
        let pattern = pattern
            .map(|p| {
                Regex::new(p).map_err(|source| ConfigError::LinkPattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .transpose()?;
        Ok(Self { pattern })
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    pub fn is_valid(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            debug!("Empty link rejected");
            return false;
        }

        match &self.pattern {
            None => true,
            Some(regex) => match regex.find(candidate) {
                Some(m) => {
                    debug!("Link matched pattern: {}", m.as_str());
                    true
                }
                None => {
                    debug!("Link does not match pattern: {}", candidate);
                    false
                }
            },
        }
    }
}
