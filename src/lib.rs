pub mod common;
pub mod config;
pub mod describe;
pub mod pipeline;
pub mod record;
pub mod setup;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::{Backend, ConfigError, Settings};
pub use describe::{ContentDescriber, Description, DescriptionService, ServiceError};
pub use pipeline::{ContentProcessor, ImageSource, Processed, RunReport, SkipReason};
